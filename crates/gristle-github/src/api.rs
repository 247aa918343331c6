//! The hosting API seam.

use async_trait::async_trait;
use gristle_core::{RepoEvent, RepoName};

use crate::errors::Result;

/// Whether a repository owner is a user or an organization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnerKind {
    /// A personal account.
    User,
    /// An organization account.
    Organization,
}

/// A repository that was successfully resolved and can be polled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoHandle {
    /// Canonical name as reported by the API.
    pub name: RepoName,
    /// Kind of the owning account.
    pub owner_kind: OwnerKind,
    /// Absolute URL of the repository's events listing.
    pub events_url: String,
}

/// Operations the relay needs from the hosting API.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Resolve the owner (user first, then organization) and the repository.
    async fn resolve_repo(&self, name: &RepoName) -> Result<RepoHandle>;

    /// Fetch the repository's most recent events, newest first as the API
    /// returns them. Documents without a usable `created_at` are dropped.
    async fn fetch_events(&self, repo: &RepoHandle) -> Result<Vec<RepoEvent>>;
}
