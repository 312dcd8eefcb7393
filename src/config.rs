use crate::error::{Result, RelayError};
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay server configuration
    pub relay: RelayServerConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    /// Port for the relay server (default: 42069)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Path of the WebSocket upgrade endpoint (default: /ws)
    pub ws_path: String,
    /// Capacity of the shared broadcast channel
    pub broadcast_capacity: usize,
    /// Outbound frames buffered per connection before it is dropped
    pub client_buffer: usize,
    /// Coordinates remembered per session (0 disables)
    pub location_trail: usize,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for RelayServerConfig {
    fn default() -> Self {
        Self {
            port: 42069,
            host: "0.0.0.0".to_string(),
            ws_path: "/ws".to_string(),
            broadcast_capacity: 1024,
            client_buffer: 256,
            location_trail: 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let ws_path = get_env_or("RELAY_WS_PATH", "/ws");
        if !ws_path.starts_with('/') {
            return Err(RelayError::InvalidConfig(
                "RELAY_WS_PATH must start with '/'".into(),
            ));
        }

        Ok(Config {
            relay: RelayServerConfig {
                port: get_env_or("RELAY_PORT", "42069").parse().map_err(|_| {
                    RelayError::InvalidConfig("RELAY_PORT must be a valid port number".into())
                })?,
                host: get_env_or("RELAY_HOST", "0.0.0.0"),
                ws_path,
                broadcast_capacity: parse_positive("RELAY_BROADCAST_CAPACITY", "1024")?,
                client_buffer: parse_positive("RELAY_CLIENT_BUFFER", "256")?,
                location_trail: get_env_or("RELAY_LOCATION_TRAIL", "1024")
                    .parse()
                    .map_err(|_| {
                        RelayError::InvalidConfig(
                            "RELAY_LOCATION_TRAIL must be a non-negative number".into(),
                        )
                    })?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the relay server address
    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.relay.host, self.relay.port)
    }
}

/// Parse a channel capacity, which must be non-zero
fn parse_positive(key: &str, default: &str) -> Result<usize> {
    match get_env_or(key, default).parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RelayError::InvalidConfig(format!(
            "{} must be a positive number",
            key
        ))),
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
