use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use tts_webhook_server::{build_router, config::ServerConfig, gate, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    info!("Starting TTS webhook server...");
    let config = ServerConfig::from_env();
    tokio::fs::create_dir_all(&config.audio_dir).await.map_err(|e| {
        anyhow::anyhow!("Failed to create audio directory {}: {e}", config.audio_dir.display())
    })?;

    let port = config.port;
    let sweep_every = config.rate_limit_sweep();
    let state = AppState::from_config(config);
    gate::spawn_sweeper(state.gate.clone(), sweep_every);

    let app = build_router(state);
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
