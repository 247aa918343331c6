//! # gristle-server
//!
//! The relay engine: an SSH front end that turns authenticated clients into
//! sessions, per-repository scanners that poll the hosting API, and the
//! broadcaster that writes every new event to every session.
//!
//! ## Architecture
//!
//! ```text
//!  RepoScanner ──┐                     ┌── Session (writer task) ── client
//!  RepoScanner ──┼── Broadcaster ──────┼── Session (writer task) ── client
//!  RepoScanner ──┘   (SessionRegistry) └── ...
//!                          ▲
//!  ConnectionAcceptor ─────┘ register / unregister
//! ```

#![deny(unsafe_code)]

pub mod acceptor;
pub mod auth;
pub mod broadcast;
pub mod errors;
pub mod metrics;
pub mod scanner;
pub mod server;
pub mod session;
pub mod shutdown;

pub use auth::{AuthDecision, AuthGate, AuthorizedKeys, ConnectionPolicy};
pub use broadcast::{Broadcaster, PublishReport};
pub use errors::{ConnectionError, ServerError, SessionWriteError};
pub use scanner::{RepoScanner, ScanExit, ScanState};
pub use server::{GristleServer, RunningServer};
pub use session::{Session, SessionRegistry};
pub use shutdown::{DRAIN_TIMEOUT, ShutdownCoordinator};
