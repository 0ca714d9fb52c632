use teleconsult_core::{
    CallOffer, ClientEvent, IceCandidate, ParticipantId, RoomId, SessionDescription,
};

/// Commands entering the relay event loop from the WebSocket handlers.
#[derive(Debug)]
pub enum RelayCommand {
    /// The participant wants to join a room's broadcast group.
    JoinRoom { participant: ParticipantId, room: RoomId },

    /// The participant initiates a call in a room.
    CallUser { participant: ParticipantId, offer: CallOffer },

    /// The participant answers the pending call.
    MakeAnswer {
        participant: ParticipantId,
        room: RoomId,
        signal_data: SessionDescription,
    },

    /// The participant declines the pending call.
    RejectCall { participant: ParticipantId, room: RoomId },

    /// The participant hangs up.
    EndCall { participant: ParticipantId, room: RoomId },

    /// One ICE candidate to forward to the other member(s).
    IceCandidate {
        participant: ParticipantId,
        room: RoomId,
        candidate: IceCandidate,
    },

    /// The participant's channel connection dropped.
    Disconnect { participant: ParticipantId },
}

impl RelayCommand {
    /// Map a decoded wire event onto a command. Exhaustive on purpose: a new
    /// event variant must pick a command here before it compiles.
    pub fn from_event(participant: ParticipantId, event: ClientEvent) -> Self {
        match event {
            ClientEvent::JoinRoom(room) => Self::JoinRoom { participant, room },
            ClientEvent::CallUser(offer) => Self::CallUser { participant, offer },
            ClientEvent::MakeAnswer { room, signal_data } => Self::MakeAnswer {
                participant,
                room,
                signal_data,
            },
            ClientEvent::RejectCall { room } => Self::RejectCall { participant, room },
            ClientEvent::EndCall { room } => Self::EndCall { participant, room },
            ClientEvent::IceCandidate { room, candidate } => Self::IceCandidate {
                participant,
                room,
                candidate,
            },
        }
    }
}
