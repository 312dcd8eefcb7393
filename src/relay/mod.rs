//! Relay core
//!
//! Sessions validate inbound events and push them onto one broadcast
//! channel; a single broadcaster drains that channel and fans every event
//! out to the connections currently in the registry.

pub mod broadcaster;
pub mod client;
pub mod registry;
pub mod session;
mod trail;

pub use broadcaster::{Broadcaster, FanOutReport, RelayStats, StatsSnapshot};
pub use client::{ClientChannels, ClientHandle, ConnectionId};
pub use registry::{ConnectionRegistry, RegisterOutcome};
pub use session::{ConnectionSession, EventSource, SessionState};
pub use trail::LocationTrail;
