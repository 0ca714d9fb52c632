use async_trait::async_trait;
use teleconsult_core::{ParticipantId, ServerEvent};

/// Outbound side of the event channel, as the relay loop sees it. The
/// WebSocket layer implements this for real connections; tests implement it
/// with a capturing mock.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Deliver one event to one connected participant. Delivery to a
    /// participant without a live connection is dropped, not an error.
    async fn send_event(&self, to: ParticipantId, event: ServerEvent);
}
