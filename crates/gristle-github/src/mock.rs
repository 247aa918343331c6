//! In-memory [`GitHubApi`] for deterministic tests without network access.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gristle_core::{RepoEvent, RepoName};
use parking_lot::Mutex;

use crate::api::{GitHubApi, OwnerKind, RepoHandle};
use crate::errors::{ApiError, Result};

/// One pre-programmed answer to [`GitHubApi::fetch_events`].
#[derive(Clone, Debug)]
pub enum MockFetch {
    /// Return these events.
    Events(Vec<RepoEvent>),
    /// Fail with this HTTP status.
    Status(u16),
}

/// Mock API that knows a fixed set of repositories and replays queued
/// fetch answers in order. Once the queue is empty every fetch returns no
/// events.
#[derive(Default)]
pub struct MockGitHub {
    repos: Mutex<HashSet<String>>,
    fetches: Mutex<VecDeque<MockFetch>>,
    resolve_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockGitHub {
    /// Empty mock: every repository is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` resolvable.
    #[must_use]
    pub fn with_repo(self, name: &str) -> Self {
        let _ = self.repos.lock().insert(name.to_string());
        self
    }

    /// Queue a successful fetch.
    pub fn push_events(&self, events: Vec<RepoEvent>) {
        self.fetches.lock().push_back(MockFetch::Events(events));
    }

    /// Queue a failed fetch.
    pub fn push_status(&self, status: u16) {
        self.fetches.lock().push_back(MockFetch::Status(status));
    }

    /// Number of `resolve_repo` calls so far.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::Relaxed)
    }

    /// Number of `fetch_events` calls so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl GitHubApi for MockGitHub {
    async fn resolve_repo(&self, name: &RepoName) -> Result<RepoHandle> {
        let _ = self.resolve_calls.fetch_add(1, Ordering::Relaxed);
        let full = name.to_string();
        if !self.repos.lock().contains(&full) {
            return Err(ApiError::from_status(404, format!("mock://repos/{full}"), ""));
        }
        Ok(RepoHandle {
            name: name.clone(),
            owner_kind: OwnerKind::User,
            events_url: format!("mock://repos/{full}/events"),
        })
    }

    async fn fetch_events(&self, repo: &RepoHandle) -> Result<Vec<RepoEvent>> {
        let _ = self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        match self.fetches.lock().pop_front() {
            Some(MockFetch::Events(events)) => Ok(events),
            Some(MockFetch::Status(status)) => {
                Err(ApiError::from_status(status, repo.events_url.clone(), ""))
            }
            None => Ok(Vec::new()),
        }
    }
}
