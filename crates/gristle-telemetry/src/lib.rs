//! # gristle-telemetry
//!
//! `tracing` subscriber setup for the relay.
//!
//! Operator logs always go to stderr. When a log file is configured, the
//! same events are appended to it without ANSI colours. `RUST_LOG`
//! overrides the configured level.

#![deny(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured log file could not be opened for append.
    #[error("failed to open log file {}: {source}", path.display())]
    OpenLogFile {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by `RUST_LOG`.
    pub log_level: Level,
    /// Optional file that receives a copy of every log line.
    pub log_file: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            log_file: None,
        }
    }
}

impl TelemetryConfig {
    /// Default config with a log file.
    pub fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            log_file,
            ..Self::default()
        }
    }
}

/// Build the level filter: `RUST_LOG` if set and valid, else `level`.
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()))
}

/// Open `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> Result<File, TelemetryError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::OpenLogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Build the subscriber described by `config` without installing it.
pub fn subscriber(
    config: &TelemetryConfig,
) -> Result<impl tracing::Subscriber + Send + Sync + 'static, TelemetryError> {
    let file_layer = match &config.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    Ok(tracing_subscriber::registry()
        .with(env_filter(config.log_level))
        .with(stderr_layer)
        .with(file_layer))
}

/// Install the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    subscriber(config)?.try_init()?;
    Ok(())
}
