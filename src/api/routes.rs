//! Route definitions

use axum::routing::get;
use axum::Router;

use super::handlers;
use super::server::AppState;
use super::websocket;

/// Create the router with all routes
pub fn create_router(state: AppState, ws_path: &str) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/status", get(handlers::health::status))
        // WebSocket upgrade endpoint
        .route(ws_path, get(websocket::relay::relay_ws))
        .with_state(state)
}
