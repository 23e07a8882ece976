//! Client-predicted, server-authoritative vehicle synchronization
//!
//! - `game`: simulation (movement prediction, reconciliation, rockets, pickups)
//! - `net`: messages, wire codec, routing and a simulated lossy network
//! - `session`: the authority and client state machines
//! - `ws`, `http`, `app`: the authority served over WebSocket

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod net;
pub mod session;
pub mod util;
pub mod ws;

use tracing::info;

/// Initialize tracing/logging; `RUST_LOG` overrides `log_level`
pub fn init_tracing(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .init();
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
