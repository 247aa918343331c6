//! Repository full names (`owner/repo`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a repository full name can be rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepoNameError {
    /// No `/` separator, or more than one.
    #[error("repository name must be `owner/repo`, got {0:?}")]
    Malformed(String),
    /// Owner or repository part is empty.
    #[error("repository name has an empty owner or repo: {0:?}")]
    EmptyPart(String),
}

/// A repository identified by owner (user or organization) and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName {
    owner: String,
    repo: String,
}

impl RepoName {
    /// Build a name from its two parts.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self, RepoNameError> {
        let owner = owner.into();
        let repo = repo.into();
        if owner.is_empty() || repo.is_empty() {
            return Err(RepoNameError::EmptyPart(format!("{owner}/{repo}")));
        }
        Ok(Self { owner, repo })
    }

    /// The owning user or organization login.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The repository name within the owner.
    pub fn repo(&self) -> &str {
        &self.repo
    }
}

impl FromStr for RepoName {
    type Err = RepoNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) => {
                Self::new(owner, repo).map_err(|_| RepoNameError::EmptyPart(s.to_string()))
            }
            _ => Err(RepoNameError::Malformed(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepoName {
    type Error = RepoNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoName> for String {
    fn from(name: RepoName) -> Self {
        name.to_string()
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_owner_and_repo() {
        let name: RepoName = "acme/widgets".parse().unwrap();
        assert_eq!(name.owner(), "acme");
        assert_eq!(name.repo(), "widgets");
        assert_eq!(name.to_string(), "acme/widgets");
    }

    #[test]
    fn reject_missing_separator() {
        assert_matches!("widgets".parse::<RepoName>(), Err(RepoNameError::Malformed(_)));
    }

    #[test]
    fn reject_extra_separator() {
        assert_matches!("a/b/c".parse::<RepoName>(), Err(RepoNameError::Malformed(_)));
    }

    #[test]
    fn reject_empty_parts() {
        assert_matches!("/widgets".parse::<RepoName>(), Err(RepoNameError::EmptyPart(_)));
        assert_matches!("acme/".parse::<RepoName>(), Err(RepoNameError::EmptyPart(_)));
    }

    #[test]
    fn serde_as_plain_string() {
        let name: RepoName = serde_json::from_str("\"doesnotexist/repo\"").unwrap();
        assert_eq!(name.owner(), "doesnotexist");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"doesnotexist/repo\"");
        assert!(serde_json::from_str::<RepoName>("\"nope\"").is_err());
    }
}
