//! HTTP surface
//!
//! Serves the WebSocket upgrade endpoint plus health and status routes.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{AppState, RelayServer};
