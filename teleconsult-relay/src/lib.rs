mod registry;
mod relay;
mod signaling;

pub use registry::*;
pub use relay::*;
pub use signaling::*;
