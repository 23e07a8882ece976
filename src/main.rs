//! Vehicle sync authority server
//!
//! Runs the authoritative simulation on its own task and serves:
//! - `GET /ws` for binary-framed client traffic
//! - `GET /health` for liveness

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use vehicle_sync::app::AppState;
use vehicle_sync::config::Config;
use vehicle_sync::http::build_router;
use vehicle_sync::util::time::init_server_time;
use vehicle_sync::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level, config.log_json);
    init_server_time();

    let settings = config.game_settings()?;

    info!("Starting vehicle sync server");
    info!("Server address: {}", config.server_addr);
    info!(
        tick_rate = config.tick_rate,
        pickups = settings.pickups.len(),
        correction_threshold = settings.net.correction_threshold,
        "Gameplay settings loaded"
    );

    let (state, authority) = AppState::new(config.clone(), settings, rand::random());
    tokio::spawn(authority.run());

    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
