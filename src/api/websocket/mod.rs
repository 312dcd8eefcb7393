//! WebSocket handlers
//!
//! Each connection gets a writer task draining a bounded per-client buffer,
//! so a slow peer is dropped instead of stalling the broadcaster.

pub mod relay;
