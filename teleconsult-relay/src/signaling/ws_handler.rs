use crate::relay::RelayCommand;
use crate::signaling::SignalingService;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use teleconsult_core::{ClientEvent, ParticipantId};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(participant_id): Path<String>,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    let participant = ParticipantId::from(participant_id);

    ws.on_upgrade(move |socket| handle_socket(socket, participant, service))
}

async fn handle_socket(socket: WebSocket, participant: ParticipantId, service: SignalingService) {
    info!(%participant, "new WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.add_connection(participant.clone(), tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let participant = participant.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            let cmd = RelayCommand::from_event(participant.clone(), event);
                            if let Err(e) = service.relay_cmd_tx.send(cmd).await {
                                error!("relay loop gone: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!(%participant, "invalid client event: {:?}", e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }

            let _ = service
                .relay_cmd_tx
                .send(RelayCommand::Disconnect {
                    participant: participant.clone(),
                })
                .await;
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.remove_connection(&participant);
    info!(%participant, "WebSocket disconnected");
}
