//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating the configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The config file does not exist or is not a regular file.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The merged sources could not be deserialized.
    #[error("failed to parse config: {0}")]
    Parse(Box<figment::Error>),
    /// A value was present but out of range or malformed.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        Self::Parse(Box::new(err))
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
