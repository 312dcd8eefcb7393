//! Health and status endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::api::server::AppState;
use crate::relay::StatsSnapshot;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "tron-relay"
        })),
    )
}

/// Relay status
#[derive(Debug, Serialize)]
pub struct RelayStatus {
    pub uptime_secs: u64,
    pub clients: usize,
    pub usernames: Vec<String>,
    pub broadcast_queue_free: usize,
    pub stats: StatsSnapshot,
}

/// Current registry and broadcast counters
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let usernames = state.registry.usernames();
    Json(RelayStatus {
        uptime_secs: state.started_at.elapsed().as_secs(),
        clients: usernames.len(),
        usernames,
        broadcast_queue_free: state.events.capacity(),
        stats: state.stats.snapshot(),
    })
}
