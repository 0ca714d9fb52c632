use crate::call::state::{CallEvent, CallState, Effect, transition};
use crate::candidate_queue::CandidateQueue;
use crate::channel::SignalChannel;
use crate::error::ClientError;
use crate::peer::{
    LocalMedia, MediaSource, PeerConnection, PeerConnectionFactory, PeerEvent, RemoteTrack,
};
use std::sync::Arc;
use std::time::Duration;
use teleconsult_core::{
    CallOffer, ClientEvent, IceCandidate, ParticipantId, RoomId, ServerEvent,
};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_RING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CallConfig {
    /// How long an outgoing call may ring before the session hangs up on
    /// its own. `None` rings forever (the relay never times out either).
    pub ring_timeout: Option<Duration>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Some(DEFAULT_RING_TIMEOUT),
        }
    }
}

/// What the user can do from the call view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    StartCall,
    AcceptCall,
    DeclineCall,
    HangUp,
}

/// What the session reports back for the UI to render.
#[derive(Debug)]
pub enum CallNotification {
    /// A call is ringing; the UI decides whether to accept or decline.
    IncomingCall(CallOffer),
    /// Remote media arrived; bind it to the remote view.
    RemoteTrack(RemoteTrack),
    Declined { by: ParticipantId },
    Ended {
        by: Option<ParticipantId>,
        duration: Option<Duration>,
    },
    /// Local setup failed; the call view stays usable.
    SetupFailed { reason: String },
}

/// Everything the UI (or a test) holds onto while the session runs.
pub struct CallHandle {
    pub actions: mpsc::Sender<UserAction>,
    /// Inbound half of the event channel: the transport adapter pumps
    /// decoded relay events in here.
    pub server_events: mpsc::Sender<ServerEvent>,
    pub notifications: mpsc::UnboundedReceiver<CallNotification>,
    pub state: watch::Receiver<CallState>,
}

/// Drives one call attempt for one participant.
///
/// Runs as an event loop over user actions, relay events, peer-connection
/// events, and the async outcome of media acquisition; every input funnels
/// through the pure [`transition`] function before any side effect runs.
/// One instance per call view mount; terminal states stick until the
/// instance is dropped.
pub struct CallSession {
    room: RoomId,
    identity: ParticipantId,
    channel: Arc<dyn SignalChannel>,
    pc_factory: Arc<dyn PeerConnectionFactory>,
    media: Arc<dyn MediaSource>,
    config: CallConfig,

    state: CallState,
    pc: Option<Box<dyn PeerConnection>>,
    local_media: Option<Box<dyn LocalMedia>>,
    candidates: CandidateQueue,
    pending_offer: Option<CallOffer>,
    connected_at: Option<Instant>,
    last_duration: Option<Duration>,
    ring_deadline: Option<Instant>,

    action_rx: mpsc::Receiver<UserAction>,
    server_rx: mpsc::Receiver<ServerEvent>,
    peer_tx: mpsc::Sender<PeerEvent>,
    peer_rx: mpsc::Receiver<PeerEvent>,
    media_tx: mpsc::Sender<Result<Box<dyn LocalMedia>, ClientError>>,
    media_rx: mpsc::Receiver<Result<Box<dyn LocalMedia>, ClientError>>,
    notify_tx: mpsc::UnboundedSender<CallNotification>,
    state_tx: watch::Sender<CallState>,
}

impl CallSession {
    pub fn new(
        room: RoomId,
        identity: ParticipantId,
        channel: Arc<dyn SignalChannel>,
        pc_factory: Arc<dyn PeerConnectionFactory>,
        media: Arc<dyn MediaSource>,
        config: CallConfig,
    ) -> (Self, CallHandle) {
        let (action_tx, action_rx) = mpsc::channel(16);
        let (server_tx, server_rx) = mpsc::channel(64);
        let (peer_tx, peer_rx) = mpsc::channel(64);
        let (media_tx, media_rx) = mpsc::channel(4);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(CallState::Idle);

        let session = Self {
            room,
            identity,
            channel,
            pc_factory,
            media,
            config,
            state: CallState::Idle,
            pc: None,
            local_media: None,
            candidates: CandidateQueue::new(),
            pending_offer: None,
            connected_at: None,
            last_duration: None,
            ring_deadline: None,
            action_rx,
            server_rx,
            peer_tx,
            peer_rx,
            media_tx,
            media_rx,
            notify_tx,
            state_tx,
        };

        let handle = CallHandle {
            actions: action_tx,
            server_events: server_tx,
            notifications: notify_rx,
            state: state_rx,
        };

        (session, handle)
    }

    pub async fn run(mut self) {
        info!(room = %self.room, identity = %self.identity, "call session started");

        self.emit(ClientEvent::JoinRoom(self.room.clone())).await;

        loop {
            let ring_deadline = self.ring_deadline;

            tokio::select! {
                maybe_action = self.action_rx.recv() => match maybe_action {
                    Some(action) => self.handle_action(action).await,
                    None => {
                        debug!("call view gone; stopping session");
                        break;
                    }
                },

                maybe_event = self.server_rx.recv() => match maybe_event {
                    Some(event) => self.handle_server_event(event).await,
                    None => {
                        warn!("signal channel dropped");
                        self.apply(CallEvent::TransportLost).await;
                        break;
                    }
                },

                Some(peer_event) = self.peer_rx.recv() => {
                    self.handle_peer_event(peer_event).await;
                }

                Some(media_result) = self.media_rx.recv() => {
                    self.handle_media_result(media_result).await;
                }

                _ = ring_wait(ring_deadline) => {
                    warn!(room = %self.room, "outgoing call rang too long");
                    self.ring_deadline = None;
                    self.apply(CallEvent::RingTimeout).await;
                }
            }
        }

        info!(room = %self.room, "call session finished");
    }

    /// Feed one event through the transition function and execute whatever
    /// it demands.
    async fn apply(&mut self, event: CallEvent) {
        let t = transition(self.state, event.clone());

        if t.next == self.state && t.effects.is_empty() {
            debug!(state = ?self.state, event = ?event, "event ignored");
            return;
        }

        if t.next != self.state {
            info!(from = ?self.state, to = ?t.next, "call state changed");
            self.state = t.next;
            let _ = self.state_tx.send(self.state);
        }

        for effect in t.effects {
            self.run_effect(effect).await;
        }
    }

    async fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartOutgoingCall => {
                if let Some(timeout) = self.config.ring_timeout {
                    self.ring_deadline = Some(Instant::now() + timeout);
                }
                self.spawn_media_acquisition();
            }

            Effect::AnswerIncomingCall => {
                self.spawn_media_acquisition();
            }

            Effect::ApplyAnswer(answer) => {
                let Some(pc) = self.pc.as_deref() else {
                    warn!("answer arrived before the peer connection exists");
                    return;
                };
                if let Err(e) = pc.set_remote_description(answer).await {
                    warn!("failed to apply remote answer: {}", e);
                    return;
                }
                self.candidates.flush(pc).await;
            }

            Effect::OfferAvailable(offer) => {
                self.pending_offer = Some(offer.clone());
                self.notify(CallNotification::IncomingCall(offer));
            }

            Effect::SendReject => {
                self.pending_offer = None;
                self.emit(ClientEvent::RejectCall {
                    room: self.room.clone(),
                })
                .await;
            }

            Effect::SendEndCall => {
                self.emit(ClientEvent::EndCall {
                    room: self.room.clone(),
                })
                .await;
            }

            Effect::StartTimer => {
                self.connected_at = Some(Instant::now());
                self.ring_deadline = None;
            }

            Effect::Teardown => {
                if let Some(pc) = self.pc.take() {
                    pc.close().await;
                }
                if let Some(media) = self.local_media.take() {
                    media.stop();
                }
                self.candidates.clear();
                self.last_duration = self.connected_at.take().map(|t| t.elapsed());
                self.ring_deadline = None;
                if let Some(duration) = self.last_duration {
                    info!(?duration, "call torn down");
                }
            }

            Effect::NotifyDeclined(by) => {
                self.notify(CallNotification::Declined { by });
            }

            Effect::NotifyEnded(by) => {
                let duration = self.last_duration.take();
                self.notify(CallNotification::Ended { by, duration });
            }
        }
    }

    async fn handle_action(&mut self, action: UserAction) {
        match action {
            UserAction::StartCall => self.apply(CallEvent::StartCall).await,
            UserAction::AcceptCall => {
                if self.pending_offer.is_none() {
                    warn!("accept requested but no call is ringing");
                    return;
                }
                self.apply(CallEvent::AcceptCall).await;
            }
            UserAction::DeclineCall => {
                if self.pending_offer.is_none() {
                    warn!("decline requested but no call is ringing");
                    return;
                }
                self.apply(CallEvent::DeclineCall).await;
            }
            UserAction::HangUp => self.apply(CallEvent::HangUp).await,
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::CallMade(offer) => self.apply(CallEvent::OfferReceived(offer)).await,
            ServerEvent::AnswerMade { signal_data, .. } => {
                self.apply(CallEvent::AnswerReceived(signal_data)).await;
            }
            ServerEvent::CallDeclined { from } => {
                self.apply(CallEvent::DeclineReceived(from)).await;
            }
            ServerEvent::CallEnded { from } => self.apply(CallEvent::EndReceived(from)).await,
            ServerEvent::IceCandidate { candidate, .. } => {
                self.handle_remote_candidate(candidate).await;
            }
        }
    }

    async fn handle_remote_candidate(&mut self, candidate: IceCandidate) {
        // Late candidates from a settled call are expected (no cross-sender
        // ordering on the channel) and must be harmless.
        if self.state.is_terminal() {
            debug!("discarding ICE candidate after terminal state");
            return;
        }
        self.candidates
            .enqueue_or_apply(self.pc.as_deref(), candidate)
            .await;
    }

    async fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::CandidateGenerated(candidate) => {
                if self.state.is_terminal() {
                    return;
                }
                self.emit(ClientEvent::IceCandidate {
                    room: self.room.clone(),
                    candidate,
                })
                .await;
            }
            PeerEvent::RemoteTrack(track) => {
                if self.state == CallState::InCall {
                    self.notify(CallNotification::RemoteTrack(track));
                } else {
                    debug!("remote track outside in-call; ignoring");
                }
            }
        }
    }

    /// Media grants resolve at the user's leisure; by the time one arrives
    /// the call may have been cancelled, declined, or ended. Only a session
    /// still in its setup window may use the devices.
    async fn handle_media_result(&mut self, result: Result<Box<dyn LocalMedia>, ClientError>) {
        let media = match result {
            Ok(media) => media,
            Err(e) => {
                if matches!(self.state, CallState::Calling | CallState::InCall) {
                    self.fail_setup(e).await;
                } else {
                    debug!("media denial after call left setup: {}", e);
                }
                return;
            }
        };

        match self.state {
            CallState::Calling => {
                self.local_media = Some(media);
                if let Err(e) = self.setup_outgoing().await {
                    self.fail_setup(e).await;
                }
            }
            CallState::InCall if self.pending_offer.is_some() => {
                self.local_media = Some(media);
                if let Err(e) = self.setup_incoming().await {
                    self.fail_setup(e).await;
                }
            }
            _ => {
                debug!(state = ?self.state, "media granted after call left setup; releasing");
                media.stop();
            }
        }
    }

    async fn setup_outgoing(&mut self) -> Result<(), ClientError> {
        let pc = self.pc_factory.create(self.peer_tx.clone()).await?;
        if let Some(media) = self.local_media.as_deref() {
            pc.attach_local_media(media).await?;
        }
        let offer = pc.create_offer().await?;
        self.pc = Some(pc);

        self.emit(ClientEvent::CallUser(CallOffer {
            room: self.room.clone(),
            signal_data: offer,
            from: self.identity.clone(),
        }))
        .await;
        Ok(())
    }

    async fn setup_incoming(&mut self) -> Result<(), ClientError> {
        let offer = self
            .pending_offer
            .clone()
            .ok_or_else(|| ClientError::Peer("no pending offer to answer".into()))?;

        let pc = self.pc_factory.create(self.peer_tx.clone()).await?;
        if let Some(media) = self.local_media.as_deref() {
            pc.attach_local_media(media).await?;
        }
        pc.set_remote_description(offer.signal_data).await?;
        self.candidates.flush(&*pc).await;
        let answer = pc.create_answer().await?;
        self.pc = Some(pc);
        self.pending_offer = None;

        self.emit(ClientEvent::MakeAnswer {
            room: self.room.clone(),
            signal_data: answer,
        })
        .await;
        Ok(())
    }

    async fn fail_setup(&mut self, error: ClientError) {
        warn!("call setup failed: {}", error);
        self.notify(CallNotification::SetupFailed {
            reason: error.to_string(),
        });
        self.apply(CallEvent::SetupFailed).await;
    }

    fn spawn_media_acquisition(&self) {
        let media = self.media.clone();
        let tx = self.media_tx.clone();
        tokio::spawn(async move {
            let result = media.acquire().await;
            let _ = tx.send(result).await;
        });
    }

    async fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.channel.emit(event).await {
            warn!("failed to emit signal: {}", e);
        }
    }

    fn notify(&self, notification: CallNotification) {
        let _ = self.notify_tx.send(notification);
    }
}

async fn ring_wait(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
