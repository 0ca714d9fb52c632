use crate::error::ClientError;
use async_trait::async_trait;
use teleconsult_core::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// A remote track the peer connection started receiving. Opaque handle for
/// the UI to bind to its remote view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: MediaKind,
}

/// Events the peer connection pushes back at the session.
#[derive(Debug)]
pub enum PeerEvent {
    /// A local ICE candidate was gathered and must be relayed to the peer.
    CandidateGenerated(IceCandidate),
    /// An incoming media track arrived.
    RemoteTrack(RemoteTrack),
}

/// Call-site contract of the host platform's peer-connection object. Codec
/// and transport internals live behind it; the session only negotiates.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), ClientError>;

    /// Whether a remote description has been applied yet. Gates direct
    /// candidate application versus buffering.
    fn has_remote_description(&self) -> bool;

    async fn create_offer(&self) -> Result<SessionDescription, ClientError>;

    async fn create_answer(&self) -> Result<SessionDescription, ClientError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ClientError>;

    async fn attach_local_media(&self, media: &dyn LocalMedia) -> Result<(), ClientError>;

    async fn close(&self);
}

/// Builds one peer connection per call attempt. `events` receives the
/// connection's gathered candidates and incoming tracks.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>, ClientError>;
}

/// Live camera+microphone capture. Stopping releases the devices.
pub trait LocalMedia: Send + Sync {
    fn stop(&self);
}

/// Host capability that prompts for camera+microphone access. May take an
/// unbounded, permission-gated amount of time to resolve.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn LocalMedia>, ClientError>;
}
