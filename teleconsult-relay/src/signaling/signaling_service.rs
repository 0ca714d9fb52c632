use crate::relay::RelayCommand;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use teleconsult_core::{ParticipantId, ServerEvent};
use tokio::sync::mpsc;
use tracing::{error, warn};

struct SignalingInner {
    connections: DashMap<ParticipantId, mpsc::UnboundedSender<Message>>,
}

/// Connection registry shared between the axum handlers and the relay loop.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
    pub(crate) relay_cmd_tx: mpsc::Sender<RelayCommand>,
}

impl SignalingService {
    pub fn new(relay_cmd_tx: mpsc::Sender<RelayCommand>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                connections: DashMap::new(),
            }),
            relay_cmd_tx,
        }
    }

    /// Register a freshly upgraded connection. A reconnecting participant
    /// replaces its previous sender.
    pub fn add_connection(&self, participant: ParticipantId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.connections.insert(participant, tx);
    }

    pub fn remove_connection(&self, participant: &ParticipantId) {
        self.inner.connections.remove(participant);
    }

    pub fn send(&self, participant: ParticipantId, event: ServerEvent) {
        if let Some(conn) = self.inner.connections.get(&participant) {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if let Err(e) = conn.send(Message::Text(json.into())) {
                        error!(%participant, "failed to send WS message: {:?}", e);
                    }
                }
                Err(e) => error!("failed to serialize server event: {}", e),
            }
        } else {
            warn!(%participant, "attempted to send event to disconnected participant");
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_event(&self, to: ParticipantId, event: ServerEvent) {
        self.send(to, event);
    }
}
