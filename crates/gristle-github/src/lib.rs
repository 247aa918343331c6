//! # gristle-github
//!
//! Access to the GitHub (or GitHub Enterprise) REST API.
//!
//! The relay needs two things from the hosting API: resolving a configured
//! `owner/repo` once, and fetching that repository's recent events on every
//! due scan. [`GitHubApi`] is that seam; [`GitHubClient`] implements it over
//! `reqwest` and [`mock::MockGitHub`] implements it in memory for tests.

#![deny(unsafe_code)]

pub mod api;
pub mod client;
pub mod errors;
pub mod mock;

pub use api::{GitHubApi, OwnerKind, RepoHandle};
pub use client::GitHubClient;
pub use errors::{ApiError, Result};
