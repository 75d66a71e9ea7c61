//! Quizlink Relay Server
//!
//! HTTP server that relays device messages to Telegram channels, tracks
//! per-device firmware versions, and serves OTA update metadata.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use quizlink_core::config::parse_bots;
use quizlink_core::store::JsonStore;
use quizlink_core::tracing_init::init_tracing;

use quizlink_relay::routes::build_router;
use quizlink_relay::state::{AppState, RelaySettings};
use quizlink_relay::telegram::{MessageSender, TelegramClient};

#[derive(Parser, Debug)]
#[command(name = "quizlink-relay")]
#[command(
    version,
    about = "Quizlink relay server - device message fan-out and OTA update metadata"
)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080", env = "LISTEN_ADDR")]
    addr: SocketAddr,

    /// Directory holding the JSON document collections.
    #[arg(long, default_value = "./data", env = "DATA_DIR")]
    data_dir: PathBuf,

    /// Shared secret devices must present on /relay.
    #[arg(long, env = "RELAY_SECRET", default_value = "change_me")]
    relay_secret: String,

    /// Outbound bot spec, `token:chat1,chat2,...` (split at the last ':').
    #[arg(long, env = "BOTS", default_value = "")]
    bots: String,

    /// Also forward quiz answers to the outbound channels.
    #[arg(long, env = "SEND_ANSWERS_TO_TG")]
    forward_answers: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("quizlink_relay=info", args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "Starting quizlink-relay"
    );

    // The HTTP client is built without a baked-in TLS provider; install
    // ring once before the first outbound request.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let bots = parse_bots(&args.bots);
    if bots.is_empty() {
        info!("No outbound bots configured, relay fan-out disabled");
    }

    let store = JsonStore::open(&args.data_dir).await?;
    let sender: Arc<dyn MessageSender> = Arc::new(TelegramClient::new()?);
    let state = AppState::initialize(
        store,
        RelaySettings {
            secret: args.relay_secret,
            bots,
            forward_answers: args.forward_answers,
        },
        sender,
    )
    .await;

    info!(
        questions = state.questions.snapshot().await.len(),
        answers = state.answers.len().await,
        devices = state.registry.devices().await.len(),
        firmware = state.catalog.versions().await.len(),
        destinations = state.destination_count(),
        "Data initialized"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(args.addr).await?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Relay stopped");
    Ok(())
}
