use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::relay::ConnectionId;

/// Unified error type for the relay
#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Client transport errors
    #[error("Outbound buffer full for connection {id}")]
    ClientBufferFull { id: ConnectionId },

    #[error("Connection {id} is disconnected")]
    ClientDisconnected { id: ConnectionId },

    #[error("Transport error: {0}")]
    Transport(String),

    // Broadcast errors
    #[error("Broadcast channel closed")]
    BroadcastClosed,

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RelayError::InvalidConfig(_) => StatusCode::BAD_REQUEST,

            // 503 Service Unavailable
            RelayError::BroadcastClosed => StatusCode::SERVICE_UNAVAILABLE,

            // 502 Bad Gateway
            RelayError::ClientBufferFull { .. }
            | RelayError::ClientDisconnected { .. }
            | RelayError::Transport(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            RelayError::Serialization(_) | RelayError::Io(_) | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<axum::Error> for RelayError {
    fn from(err: axum::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}
