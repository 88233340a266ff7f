mod api;
mod audio;
mod cache;
mod chunked_processor;
mod config;
mod constants;
mod error;
mod fingerprint_service;
mod models;
mod player;
mod repository;
mod security;
mod semaphore;
mod state;
mod stream;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use config::{Cli, Config, EXIT_FATAL_INIT, EXIT_OK, EXIT_PORT_IN_USE};
use repository::in_memory::InMemoryLibrary;
use semaphore::StreamSemaphore;
use state::AppState;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_cli(cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(port = config.port, music_dir = ?config.music_dir, "starting auralis-server");

    for dir in [config.artwork_dir(), config.uploads_dir()] {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::error!(error = %e, dir = ?dir, "failed to create a required directory");
            return ExitCode::from(EXIT_FATAL_INIT as u8);
        }
    }

    let library = Arc::new(InMemoryLibrary::new());
    let state = Arc::new(AppState {
        library: library.clone(),
        cache: Arc::new(cache::ChunkCache::new()),
        semaphore: Arc::new(StreamSemaphore::new(constants::MAX_CONCURRENT_STREAMS)),
        fingerprints: Arc::new(fingerprint_service::FingerprintService::new(
            library.clone(),
            fingerprint_service::worker_count(4),
        )),
        player: Arc::new(player::PlayerActor::new()),
        origin_allowlist: Arc::new(default_origin_allowlist(config.port)),
        config: Arc::new(config.clone()),
    });

    let app = Router::new()
        .route("/health", get(api::health::health_handler))
        .route("/fingerprint", post(api::fingerprint::fingerprint_handler))
        .route("/api/process", post(api::process::process_handler))
        .route("/api/files/upload", post(api::upload::upload_handler))
        .route("/api/artwork/*path", get(api::artwork::artwork_handler))
        .route("/stream/:track_id/chunk/:chunk_index", get(api::chunk::chunk_handler))
        .route("/stream/ws", get(stream::ws::ws_handler))
        .layer(middleware::from_fn(security::security_headers))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            tracing::error!(port = config.port, "port already in use");
            return ExitCode::from(EXIT_PORT_IN_USE as u8);
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to bind listener");
            return ExitCode::from(EXIT_FATAL_INIT as u8);
        }
    };

    tracing::info!(%addr, "server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with an error");
        return ExitCode::from(EXIT_FATAL_INIT as u8);
    }

    ExitCode::from(EXIT_OK as u8)
}

/// The WebSocket origin allowlist for the bundled desktop client, which
/// serves its UI from the same loopback port plus the dev-server port used
/// while developing it.
fn default_origin_allowlist(port: u16) -> Vec<String> {
    vec![
        format!("http://127.0.0.1:{port}"),
        format!("http://localhost:{port}"),
        "http://localhost:5173".to_string(),
    ]
}
