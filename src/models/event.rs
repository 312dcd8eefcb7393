//! Wire event model
//!
//! Every inbound message is an envelope `{ "type": <int>, "payload": <object> }`.
//! The payload is kept as raw JSON so that accepted events are forwarded
//! to other clients byte-for-byte as they arrived.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

/// Event type discriminator, carried on the wire as an integer.
///
/// A missing or `null` type decodes as `Unknown` and is rejected by
/// validation rather than by the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "i64")]
pub enum EventType {
    #[default]
    Unknown,
    JoinedLobby,
    LocationUpdate,
    /// A code this relay has no payload variant for
    Unsupported(i64),
}

impl From<i64> for EventType {
    fn from(code: i64) -> Self {
        match code {
            0 => EventType::Unknown,
            1 => EventType::JoinedLobby,
            2 => EventType::LocationUpdate,
            other => EventType::Unsupported(other),
        }
    }
}

impl From<Option<i64>> for EventType {
    fn from(code: Option<i64>) -> Self {
        code.map(EventType::from).unwrap_or_default()
    }
}

impl From<EventType> for i64 {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Unknown => 0,
            EventType::JoinedLobby => 1,
            EventType::LocationUpdate => 2,
            EventType::Unsupported(code) => code,
        }
    }
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Unknown => "unknown",
            EventType::JoinedLobby => "joined_lobby",
            EventType::LocationUpdate => "location_update",
            EventType::Unsupported(_) => "unsupported",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an event was rejected
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unknown event type")]
    UnknownType,

    #[error("event payload is empty")]
    EmptyPayload,

    #[error("unsupported event type: {0}")]
    UnsupportedType(i64),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("payload validation failed: {0}")]
    PayloadValidationFailed(#[from] PayloadError),
}

/// Field-level payload check failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("username is required")]
    EmptyUsername,

    #[error("color is required")]
    EmptyColor,

    /// (0, 0) is treated as "no position"
    #[error("coordinates must not be the origin")]
    OriginCoordinates,
}

/// Inbound and broadcast message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

/// A client's identity claim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinedLobbyPayload {
    pub username: String,
    pub color: String,
}

impl JoinedLobbyPayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.username.is_empty() {
            return Err(PayloadError::EmptyUsername);
        }
        if self.color.is_empty() {
            return Err(PayloadError::EmptyColor);
        }
        Ok(())
    }
}

/// A client's position report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationUpdatePayload {
    pub username: String,
    pub x: f64,
    pub y: f64,
}

impl LocationUpdatePayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.username.is_empty() {
            return Err(PayloadError::EmptyUsername);
        }
        if self.x == 0.0 && self.y == 0.0 {
            return Err(PayloadError::OriginCoordinates);
        }
        Ok(())
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            x: self.x,
            y: self.y,
        }
    }
}

/// A point on the shared canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// Decoded, validated payload of an accepted event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    JoinedLobby(JoinedLobbyPayload),
    LocationUpdate(LocationUpdatePayload),
}

impl Event {
    /// Build an event from a type and an already-serializable payload.
    pub fn new<T: Serialize>(event_type: EventType, payload: &T) -> serde_json::Result<Self> {
        let raw = serde_json::value::to_raw_value(payload)?;
        Ok(Self {
            event_type,
            payload: Some(raw),
        })
    }

    /// Check that the event is acceptable for relaying.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.parse().map(|_| ())
    }

    /// Validate the event and return its decoded payload.
    ///
    /// Never panics: any byte sequence that made it into the envelope is
    /// either accepted or rejected with a [`ValidationError`].
    pub fn parse(&self) -> Result<EventPayload, ValidationError> {
        if self.event_type == EventType::Unknown {
            return Err(ValidationError::UnknownType);
        }

        let raw = match &self.payload {
            Some(raw) if !raw.get().trim().is_empty() => raw,
            _ => return Err(ValidationError::EmptyPayload),
        };

        let payload = match self.event_type {
            EventType::JoinedLobby => {
                let payload: JoinedLobbyPayload = decode(raw)?;
                payload.validate()?;
                EventPayload::JoinedLobby(payload)
            }
            EventType::LocationUpdate => {
                let payload: LocationUpdatePayload = decode(raw)?;
                payload.validate()?;
                EventPayload::LocationUpdate(payload)
            }
            EventType::Unknown => return Err(ValidationError::UnknownType),
            EventType::Unsupported(code) => return Err(ValidationError::UnsupportedType(code)),
        };

        Ok(payload)
    }
}

fn decode<T: DeserializeOwned>(raw: &RawValue) -> Result<T, ValidationError> {
    serde_json::from_str(raw.get()).map_err(ValidationError::MalformedPayload)
}
