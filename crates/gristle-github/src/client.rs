//! `reqwest` implementation of [`GitHubApi`].

use std::time::Duration;

use async_trait::async_trait;
use gristle_core::{RepoEvent, RepoName, user_agent};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::{GitHubApi, OwnerKind, RepoHandle};
use crate::errors::{ApiError, Result};

/// Media type recommended for the v3 REST API.
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Events requested per fetch; the API's maximum page size.
const EVENTS_PER_PAGE: u32 = 100;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct RepoResponse {
    full_name: String,
}

/// Client for one configured account.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: SecretString,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a client for `base_url` authenticating with HTTP basic auth.
    pub fn new(base_url: &str, username: &str, password: SecretString) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Config("base URL must not be empty".into()));
        }

        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_JSON));

        let client = reqwest::Client::builder()
            .user_agent(user_agent())
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            username: username.to_string(),
            password,
        })
    }

    /// API base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), url, &body));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn resolve_owner(&self, owner: &str) -> Result<OwnerKind> {
        let user_url = format!("{}/users/{owner}", self.base_url);
        match self.get_json::<serde_json::Value>(&user_url).await {
            Ok(_) => return Ok(OwnerKind::User),
            Err(e) if e.is_not_found() => {
                debug!(owner, "no such user, trying organization");
            }
            Err(e) => return Err(e),
        }
        let org_url = format!("{}/orgs/{owner}", self.base_url);
        let _: serde_json::Value = self.get_json(&org_url).await?;
        Ok(OwnerKind::Organization)
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn resolve_repo(&self, name: &RepoName) -> Result<RepoHandle> {
        let owner_kind = self.resolve_owner(name.owner()).await?;

        let repo_url = format!("{}/repos/{}/{}", self.base_url, name.owner(), name.repo());
        let repo: RepoResponse = self.get_json(&repo_url).await?;
        let canonical: RepoName = repo.full_name.parse().map_err(|e| ApiError::Decode {
            url: repo_url.clone(),
            message: format!("bad full_name: {e}"),
        })?;

        let events_url = format!(
            "{}/repos/{}/{}/events",
            self.base_url,
            canonical.owner(),
            canonical.repo()
        );
        Ok(RepoHandle {
            name: canonical,
            owner_kind,
            events_url,
        })
    }

    async fn fetch_events(&self, repo: &RepoHandle) -> Result<Vec<RepoEvent>> {
        let url = format!("{}?per_page={EVENTS_PER_PAGE}", repo.events_url);
        let documents: Vec<serde_json::Value> = self.get_json(&url).await?;
        let total = documents.len();

        let events: Vec<RepoEvent> = documents
            .into_iter()
            .filter_map(|doc| match RepoEvent::from_payload(doc) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(repo = %repo.name, error = %e, "skipping event");
                    None
                }
            })
            .collect();

        debug!(repo = %repo.name, total, kept = events.len(), "fetched events");
        Ok(events)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
