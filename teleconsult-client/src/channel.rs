use crate::error::ClientError;
use async_trait::async_trait;
use teleconsult_core::ClientEvent;
use tokio::sync::mpsc;

/// Outbound half of the bidirectional event channel, as the call session
/// sees it. The inbound half is an `mpsc::Sender<ServerEvent>` handed out by
/// [`crate::CallSession::new`]; whatever transport backs the channel pumps
/// decoded relay events into it.
#[async_trait]
pub trait SignalChannel: Send + Sync {
    async fn emit(&self, event: ClientEvent) -> Result<(), ClientError>;
}

/// Adapter over a plain mpsc sender. Bridges the session to any transport
/// task (or directly to an in-process relay in tests).
pub struct MpscSignalChannel {
    tx: mpsc::Sender<ClientEvent>,
}

impl MpscSignalChannel {
    pub fn new(tx: mpsc::Sender<ClientEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SignalChannel for MpscSignalChannel {
    async fn emit(&self, event: ClientEvent) -> Result<(), ClientError> {
        self.tx
            .send(event)
            .await
            .map_err(|e| ClientError::Channel(e.to_string()))
    }
}
