use teleconsult_core::{CallOffer, ParticipantId, SessionDescription};

/// One participant's view of one call's lifecycle. `Idle` is initial;
/// `Declined` and `Ended` are terminal. A new call needs a fresh machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Calling,
    InCall,
    Declined,
    Ended,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Declined | CallState::Ended)
    }
}

/// Everything that can drive the machine: local user intent, remote
/// signaling, and asynchronous local outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// Local user starts an outgoing call.
    StartCall,
    /// Local user accepts the ringing offer.
    AcceptCall,
    /// Local user declines the ringing offer.
    DeclineCall,
    /// Local user hangs up (or cancels while still ringing).
    HangUp,
    /// `call-made` arrived. The UI is offered the call; no auto-answer.
    OfferReceived(CallOffer),
    /// `answer-made` arrived.
    AnswerReceived(SessionDescription),
    /// `call-declined` arrived.
    DeclineReceived(ParticipantId),
    /// `call-ended` arrived. Authoritative from any state.
    EndReceived(ParticipantId),
    /// Local call setup failed (media permission denied, no device, or the
    /// peer connection could not be built).
    SetupFailed,
    /// The channel to the relay dropped.
    TransportLost,
    /// Outgoing call rang too long without an answer.
    RingTimeout,
}

/// Side effects the session executes after a transition commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Acquire media; once granted, build the peer connection and send the
    /// offer via `call-user`.
    StartOutgoingCall,
    /// Acquire media; once granted, build the peer connection, apply the
    /// stored remote offer, and send `make-answer`.
    AnswerIncomingCall,
    /// Apply the remote answer and flush the candidate queue.
    ApplyAnswer(SessionDescription),
    /// Hold the offer for the UI to accept or decline. State stays `Idle`.
    OfferAvailable(CallOffer),
    /// Emit `reject-call` for the held offer.
    SendReject,
    /// Emit `end-call`.
    SendEndCall,
    /// Start the call duration counter and disarm the ring timer.
    StartTimer,
    /// Close the peer connection, stop local media, clear the candidate
    /// queue, stop the duration counter.
    Teardown,
    NotifyDeclined(ParticipantId),
    NotifyEnded(Option<ParticipantId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: CallState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: CallState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    /// The event does not apply in this state: stay put, do nothing.
    fn ignore(state: CallState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }
}

/// The single transition function. Pure; the session owns execution of the
/// returned effects. Terminal states absorb every event, so late or
/// reordered signaling after decline/end can never regress the machine.
pub fn transition(state: CallState, event: CallEvent) -> Transition {
    use CallEvent::*;
    use CallState::*;

    if state.is_terminal() {
        return Transition::ignore(state);
    }

    match (state, event) {
        (Idle, StartCall) => Transition::to(Calling, vec![Effect::StartOutgoingCall]),
        (Idle, OfferReceived(offer)) => {
            Transition::to(Idle, vec![Effect::OfferAvailable(offer)])
        }
        (Idle, AcceptCall) => Transition::to(
            InCall,
            vec![Effect::AnswerIncomingCall, Effect::StartTimer],
        ),
        (Idle, DeclineCall) => Transition::to(Idle, vec![Effect::SendReject]),

        (Calling, AnswerReceived(answer)) => Transition::to(
            InCall,
            vec![Effect::ApplyAnswer(answer), Effect::StartTimer],
        ),
        (Calling, DeclineReceived(from)) => Transition::to(
            Declined,
            vec![Effect::Teardown, Effect::NotifyDeclined(from)],
        ),
        (Calling, HangUp) => Transition::to(
            Ended,
            vec![Effect::SendEndCall, Effect::Teardown, Effect::NotifyEnded(None)],
        ),
        (Calling, RingTimeout) => Transition::to(
            Ended,
            vec![Effect::SendEndCall, Effect::Teardown, Effect::NotifyEnded(None)],
        ),
        // Setup failure is local-only: back to idle, devices released, the
        // peer is never told.
        (Calling | InCall, SetupFailed) => Transition::to(Idle, vec![Effect::Teardown]),

        (InCall, HangUp) => Transition::to(
            Ended,
            vec![Effect::SendEndCall, Effect::Teardown, Effect::NotifyEnded(None)],
        ),

        // Remote end and transport loss are authoritative from any
        // non-terminal state.
        (_, EndReceived(from)) => Transition::to(
            Ended,
            vec![Effect::Teardown, Effect::NotifyEnded(Some(from))],
        ),
        (_, TransportLost) => {
            Transition::to(Ended, vec![Effect::Teardown, Effect::NotifyEnded(None)])
        }

        // Everything else is illegal or stale here (an answer while idle, a
        // late decline mid-call, a second offer while ringing) and is
        // deliberately inert.
        (state, _) => Transition::ignore(state),
    }
}
