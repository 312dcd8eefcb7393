use serde::{Deserialize, Serialize};
use serde_json::json;

/// Sent to a connection whose join was refused
pub const USERNAME_TAKEN: &str = "Username already exists";

/// Response type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Error,
}

/// Direct reply to a single connection, never broadcast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub payload: serde_json::Value,
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            payload: json!({ "error": message.into() }),
        }
    }

    /// Serialize into a text frame
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_wire_shape() {
        let frame = Response::error(USERNAME_TAKEN).to_frame().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({ "type": "error", "payload": { "error": "Username already exists" } })
        );
    }
}
