pub use teleconsult_core::{ParticipantId, RoomId};

pub mod model {
    pub use teleconsult_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use teleconsult_relay::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use teleconsult_client::*;
}
