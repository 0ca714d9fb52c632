mod event;
mod participant;
mod room;
mod signaling;

pub use event::{ClientEvent, ServerEvent};
pub use participant::ParticipantId;
pub use room::RoomId;
pub use signaling::{CallOffer, IceCandidate, SdpKind, SessionDescription};
