use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use crate::model::signaling::{CallOffer, IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};

/// Everything a client may send to the relay. Closed set; the relay matches
/// exhaustively and carries no defensive untyped path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join the room's broadcast group. Replays any pending offer to the
    /// joining connection.
    JoinRoom(RoomId),
    /// Initiate a call: the offer is stored for replay and broadcast to the
    /// other room member(s).
    CallUser(CallOffer),
    /// Answer the pending call. Settles the registry entry.
    MakeAnswer {
        room: RoomId,
        #[serde(rename = "signalData")]
        signal_data: SessionDescription,
    },
    /// Decline the pending call. Settles the registry entry.
    RejectCall { room: RoomId },
    /// Hang up, whether still ringing or mid-call. Settles the registry
    /// entry if one remains.
    EndCall { room: RoomId },
    /// Trickle one ICE candidate to the other member(s). Pure forward.
    IceCandidate { room: RoomId, candidate: IceCandidate },
}

/// Everything the relay may send to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    CallMade(CallOffer),
    AnswerMade {
        room: RoomId,
        #[serde(rename = "signalData")]
        signal_data: SessionDescription,
    },
    CallDeclined { from: ParticipantId },
    CallEnded { from: ParticipantId },
    IceCandidate { room: RoomId, candidate: IceCandidate },
}
