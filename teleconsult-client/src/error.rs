use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Camera/microphone acquisition failed (permission denied, no device).
    /// Local-only: surfaced to the user, never reported to the peer.
    #[error("media acquisition failed: {0}")]
    Media(String),

    #[error("peer connection error: {0}")]
    Peer(String),

    #[error("signal channel error: {0}")]
    Channel(String),
}
