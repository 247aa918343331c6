//! Server error types.
//!
//! [`ServerError`] is fatal and ends startup. [`ConnectionError`] and
//! [`SessionWriteError`] are scoped to one client and never escape the task
//! that owns it.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while starting the relay.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The bound socket could not start listening.
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        /// Bound address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The authorized-keys file could not be read.
    #[error("failed to read authorized keys {}: {source}", path.display())]
    AuthorizedKeys {
        /// Configured path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The number of API clients does not match the configured accounts.
    #[error("{accounts} accounts configured but {clients} API clients supplied")]
    ApiClients {
        /// Configured accounts.
        accounts: usize,
        /// Clients handed to the server.
        clients: usize,
    },

    /// The host key could not be read or parsed.
    #[error("failed to load host key {}: {message}", path.display())]
    HostKey {
        /// Configured path.
        path: PathBuf,
        /// Parser or I/O error description.
        message: String,
    },
}

/// Errors that abort a single client connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The SSH handshake or authentication failed.
    #[error("SSH negotiation failed: {0}")]
    Negotiation(#[from] russh::Error),

    /// The SSH handshake did not complete within the accept timeout.
    #[error("SSH negotiation did not finish within {0:?}")]
    NegotiationTimeout(std::time::Duration),

    /// No session channel was opened within the accept timeout.
    #[error("no session channel opened within {0:?}")]
    ChannelTimeout(std::time::Duration),

    /// The connection ended before a session channel was opened.
    #[error("connection closed before a session channel was opened")]
    ChannelClosed,

    /// Writing to the open channel failed.
    #[error("failed to write to channel: {0}")]
    Send(String),
}

/// Why a line could not be queued for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SessionWriteError {
    /// The session's outbound queue is at capacity.
    #[error("outbound queue full")]
    Full,
    /// The session's writer has gone away.
    #[error("session closed")]
    Closed,
}

/// Result type for fatal server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
