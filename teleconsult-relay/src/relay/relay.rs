use crate::registry::SessionRegistry;
use crate::relay::RelayCommand;
use crate::signaling::SignalingOutput;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use teleconsult_core::{
    CallOffer, IceCandidate, ParticipantId, RoomId, ServerEvent, SessionDescription,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The signaling relay event loop.
///
/// Commands are handled one at a time to completion, so the registry and the
/// membership maps need no locking. All state is volatile: a restart loses
/// every pending offer, which is accepted (clients detect the transport drop
/// themselves).
pub struct Relay {
    registry: SessionRegistry,
    rooms: HashMap<RoomId, HashSet<ParticipantId>>,
    memberships: HashMap<ParticipantId, HashSet<RoomId>>,
    command_rx: mpsc::Receiver<RelayCommand>,
    output: Arc<dyn SignalingOutput>,
}

impl Relay {
    pub fn new(
        registry: SessionRegistry,
        command_rx: mpsc::Receiver<RelayCommand>,
        output: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            registry,
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            command_rx,
            output,
        }
    }

    pub async fn run(mut self) {
        info!("Relay event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Relay event loop finished");
    }

    async fn handle_command(&mut self, cmd: RelayCommand) {
        match cmd {
            RelayCommand::JoinRoom { participant, room } => {
                self.join_room(participant, room).await;
            }
            RelayCommand::CallUser { participant, offer } => {
                self.call_user(participant, offer).await;
            }
            RelayCommand::MakeAnswer {
                participant,
                room,
                signal_data,
            } => {
                self.make_answer(participant, room, signal_data).await;
            }
            RelayCommand::RejectCall { participant, room } => {
                self.reject_call(participant, room).await;
            }
            RelayCommand::EndCall { participant, room } => {
                self.end_call(participant, room).await;
            }
            RelayCommand::IceCandidate {
                participant,
                room,
                candidate,
            } => {
                self.forward_candidate(participant, room, candidate).await;
            }
            RelayCommand::Disconnect { participant } => {
                self.disconnect(participant);
            }
        }
    }

    async fn join_room(&mut self, participant: ParticipantId, room: RoomId) {
        info!(%participant, %room, "joining room");

        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(participant.clone());
        self.memberships
            .entry(participant.clone())
            .or_default()
            .insert(room.clone());

        // A callee who joins (or reconnects) after the call started must
        // still see the ringing offer. Replayed to this connection only.
        if let Some(offer) = self.registry.pending(&room) {
            debug!(%participant, %room, "replaying pending offer to joiner");
            self.output
                .send_event(participant, ServerEvent::CallMade(offer.clone()))
                .await;
        }
    }

    async fn call_user(&mut self, participant: ParticipantId, offer: CallOffer) {
        let room = offer.room.clone();
        info!(%participant, %room, from = %offer.from, "call initiated");

        if let Some(replaced) = self.registry.insert(offer.clone()) {
            // The earlier caller is now orphaned from the relay's point of
            // view; its own ring timeout is what recovers it.
            warn!(%room, orphaned = %replaced.from, "pending offer replaced");
        }

        self.broadcast_to_others(&room, &participant, ServerEvent::CallMade(offer))
            .await;
    }

    async fn make_answer(
        &mut self,
        participant: ParticipantId,
        room: RoomId,
        signal_data: SessionDescription,
    ) {
        info!(%participant, %room, "call answered");

        // Answered means no longer pending. The call itself stays up without
        // any registry entry.
        self.registry.settle(&room);

        self.broadcast_to_others(
            &room,
            &participant,
            ServerEvent::AnswerMade {
                room: room.clone(),
                signal_data,
            },
        )
        .await;
    }

    async fn reject_call(&mut self, participant: ParticipantId, room: RoomId) {
        info!(%participant, %room, "call declined");

        self.registry.settle(&room);

        self.broadcast_to_others(
            &room,
            &participant,
            ServerEvent::CallDeclined {
                from: participant.clone(),
            },
        )
        .await;
    }

    async fn end_call(&mut self, participant: ParticipantId, room: RoomId) {
        info!(%participant, %room, "call ended");

        self.registry.settle(&room);

        self.broadcast_to_others(
            &room,
            &participant,
            ServerEvent::CallEnded {
                from: participant.clone(),
            },
        )
        .await;
    }

    async fn forward_candidate(
        &mut self,
        participant: ParticipantId,
        room: RoomId,
        candidate: IceCandidate,
    ) {
        debug!(%participant, %room, "forwarding ICE candidate");

        self.broadcast_to_others(
            &room,
            &participant,
            ServerEvent::IceCandidate {
                room: room.clone(),
                candidate,
            },
        )
        .await;
    }

    fn disconnect(&mut self, participant: ParticipantId) {
        info!(%participant, "participant disconnected");

        // Membership cleanup only. Pending offers stay until settled or
        // replaced, and no event goes out: peers notice the transport drop
        // on their own.
        let Some(rooms) = self.memberships.remove(&participant) else {
            return;
        };
        for room in rooms {
            if let Some(members) = self.rooms.get_mut(&room) {
                members.remove(&participant);
                if members.is_empty() {
                    self.rooms.remove(&room);
                }
            }
        }
    }

    async fn broadcast_to_others(
        &self,
        room: &RoomId,
        sender: &ParticipantId,
        event: ServerEvent,
    ) {
        let Some(members) = self.rooms.get(room) else {
            debug!(%room, "broadcast into room with no members");
            return;
        };

        for member in members {
            if member == sender {
                continue;
            }
            self.output.send_event(member.clone(), event.clone()).await;
        }
    }
}
