//! Hosting API error types.

use thiserror::Error;

/// Errors from resolving repositories or fetching their events.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}) for {url}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
        /// `message` field of the error body, or the raw body.
        message: String,
    },

    /// A success response whose body was not the expected JSON shape.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// What was wrong.
        message: String,
    },

    /// The client could not be constructed.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Build a status error, pulling `message` out of a JSON error body.
    pub fn from_status(status: u16, url: impl Into<String>, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.to_string()
                }
            });
        Self::Status {
            status,
            url: url.into(),
            message,
        }
    }

    /// Credentials were rejected; retrying will not help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }

    /// The requested owner or repository does not exist (or is hidden).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// HTTP status code, if the API answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for hosting API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
