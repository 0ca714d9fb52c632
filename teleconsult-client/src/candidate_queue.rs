use crate::peer::PeerConnection;
use teleconsult_core::IceCandidate;
use tracing::{debug, warn};

/// Buffers ICE candidates that arrive before the remote description is set.
///
/// Candidates frequently beat the offer/answer round trip through the relay,
/// and a peer connection rejects candidates applied before it has a remote
/// description. The queue preserves arrival order; after the single flush it
/// becomes a permanent pass-through. One queue belongs to one call attempt
/// and is never reused.
#[derive(Default)]
pub struct CandidateQueue {
    buffered: Vec<IceCandidate>,
    flushed: bool,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the candidate now if the connection can take it, otherwise
    /// buffer it. No peer connection at all (callee still ringing) always
    /// buffers.
    pub async fn enqueue_or_apply(
        &mut self,
        pc: Option<&dyn PeerConnection>,
        candidate: IceCandidate,
    ) {
        match pc {
            Some(pc) if self.flushed || pc.has_remote_description() => {
                apply_one(pc, candidate).await;
            }
            _ => {
                debug!(buffered = self.buffered.len() + 1, "buffering ICE candidate");
                self.buffered.push(candidate);
            }
        }
    }

    /// Apply every buffered candidate in FIFO order. Called exactly once,
    /// immediately after the remote description is set. A candidate that
    /// fails to apply is logged and skipped; the rest still flush.
    pub async fn flush(&mut self, pc: &dyn PeerConnection) {
        if self.flushed {
            warn!("candidate queue flushed twice");
            return;
        }
        self.flushed = true;

        debug!(count = self.buffered.len(), "flushing buffered ICE candidates");
        for candidate in self.buffered.drain(..) {
            apply_one(pc, candidate).await;
        }
    }

    /// Drop everything buffered. Used on call teardown.
    pub fn clear(&mut self) {
        self.buffered.clear();
    }

    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }
}

async fn apply_one(pc: &dyn PeerConnection, candidate: IceCandidate) {
    if let Err(e) = pc.add_ice_candidate(candidate).await {
        warn!("skipping ICE candidate: {}", e);
    }
}
