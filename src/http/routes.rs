//! HTTP route definitions

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connected_peers: usize,
    tick: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = *state.stats.read();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        connected_peers: stats.connected_peers,
        tick: stats.tick,
    })
}
