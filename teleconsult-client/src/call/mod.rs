mod session;
mod state;

pub use session::*;
pub use state::*;
