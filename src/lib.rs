//! Tron Relay - real-time presence and location relay
//!
//! Clients connect over a WebSocket, announce themselves with a join event,
//! stream position updates, and receive every other client's events.
//!
//! ## Features
//!
//! - Per-event validation of the `{ type, payload }` wire envelope
//! - Lock-guarded connection registry shared by sessions and the broadcaster
//! - Single broadcast channel with one consumer, FIFO fan-out to all clients
//! - Slow or broken clients are dropped without affecting anyone else
//! - Health and status endpoints alongside the WebSocket endpoint

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod relay;

pub use api::RelayServer;
pub use config::Config;
pub use error::{RelayError, Result};
