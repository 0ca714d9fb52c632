use anyhow::Result;
use axum::{Router, routing::get};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use teleconsult_relay::{Relay, SessionRegistry, SignalingService, ws_handler};

#[derive(Parser)]
#[command(name = "teleconsult-relay")]
#[command(about = "Signaling relay for doctor/patient video consultations")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let (relay_cmd_tx, relay_cmd_rx) = mpsc::channel(256);
    let signaling = SignalingService::new(relay_cmd_tx);

    let relay = Relay::new(
        SessionRegistry::new(),
        relay_cmd_rx,
        Arc::new(signaling.clone()),
    );
    tokio::spawn(relay.run());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws/{participant_id}", get(ws_handler))
        .layer(cors)
        .with_state(signaling);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!("Signaling relay listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
