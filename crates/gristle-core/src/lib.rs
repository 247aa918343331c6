//! # gristle-core
//!
//! Domain types shared by every Gristle crate.
//!
//! - [`RepoName`]: a validated `owner/repo` pair
//! - [`RepoEvent`]: one repository activity event with its creation time
//! - Service identity constants used in banners and HTTP headers

#![deny(unsafe_code)]

pub mod events;
pub mod repo;

pub use events::{EventError, RepoEvent};
pub use repo::{RepoName, RepoNameError};

/// Human-readable service name.
pub const SERVICE_NAME: &str = "Gristle";

/// Service version, shared by the whole workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` value sent to the hosting API.
pub fn user_agent() -> String {
    format!("gristle/{VERSION}")
}
