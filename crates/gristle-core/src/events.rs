//! Repository activity events as relayed to clients.
//!
//! The payload is kept verbatim; only `created_at` is interpreted, for the
//! scan window. Each event goes out as one line of compact JSON followed by
//! CRLF.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Line terminator used on the client-facing stream.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Why a raw API document could not be turned into a [`RepoEvent`].
#[derive(Debug, Error)]
pub enum EventError {
    /// The document has no string `created_at` field.
    #[error("event has no created_at field")]
    MissingTimestamp,
    /// `created_at` is present but not RFC 3339.
    #[error("invalid created_at {value:?}: {source}")]
    InvalidTimestamp {
        /// The offending value.
        value: String,
        /// Parser error.
        #[source]
        source: chrono::ParseError,
    },
}

/// One unit of repository activity.
#[derive(Clone, Debug, PartialEq)]
pub struct RepoEvent {
    /// Raw JSON document as returned by the API.
    pub payload: Value,
    /// When the activity happened, per the API.
    pub created_at: DateTime<Utc>,
}

impl RepoEvent {
    /// Create an event from its parts.
    pub fn new(payload: Value, created_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            created_at,
        }
    }

    /// Build an event from an API document, reading its `created_at`.
    pub fn from_payload(payload: Value) -> Result<Self, EventError> {
        let raw = payload
            .get("created_at")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingTimestamp)?;
        let created_at = DateTime::parse_from_rfc3339(raw)
            .map_err(|source| EventError::InvalidTimestamp {
                value: raw.to_string(),
                source,
            })?
            .with_timezone(&Utc);
        Ok(Self::new(payload, created_at))
    }

    /// API-assigned event ID, if present.
    pub fn id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }

    /// Event type such as `PushEvent`, if present.
    pub fn kind(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    /// Serialize the payload as a single CRLF-terminated line.
    pub fn to_line(&self) -> String {
        // Compact serialization never emits raw newlines; string contents are escaped.
        let mut line = self.payload.to_string();
        line.push_str(LINE_TERMINATOR);
        line
    }
}
