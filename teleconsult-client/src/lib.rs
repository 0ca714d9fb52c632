mod call;
mod candidate_queue;
mod channel;
mod error;
mod peer;

pub use call::*;
pub use candidate_queue::*;
pub use channel::*;
pub use error::*;
pub use peer::*;
