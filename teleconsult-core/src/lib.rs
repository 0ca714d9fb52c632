pub mod model;

pub use model::{
    CallOffer, ClientEvent, IceCandidate, ParticipantId, RoomId, SdpKind, ServerEvent,
    SessionDescription,
};
