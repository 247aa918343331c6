//! Configuration type definitions.
//!
//! Field names match the YAML keys. Optional keys carry their production
//! default through `#[serde(default = ...)]`; unknown keys are rejected.

use std::path::PathBuf;
use std::time::Duration;

use gristle_core::RepoName;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::errors::{Result, SettingsError};

/// Default SSH listen port.
pub const DEFAULT_PORT: u16 = 9595;

/// Default TCP listen backlog.
pub const DEFAULT_LISTEN_QUEUE: u32 = 100;

/// Default seconds to wait for a client to open a channel after negotiation.
pub const DEFAULT_ACCEPT_TIMEOUT_SECS: u64 = 20;

/// Default per-repository polling period in seconds.
pub const DEFAULT_POLLING_SECS: u64 = 5;

/// Longest accepted polling period: one day.
pub const MAX_POLLING_SECS: u64 = 86_400;

/// Longest accepted channel-open timeout: one hour.
pub const MAX_ACCEPT_TIMEOUT_SECS: u64 = 3_600;

/// Root configuration.
///
/// # YAML Format
///
/// ```yaml
/// log_file: /var/log/gristle.log
/// sshd:
///   host_key: /etc/gristle/host_rsa
///   authorized_keys: /etc/gristle/authorized_keys
///   port: 9595
/// accounts:
///   - url: https://api.github.com
///     username: relay-bot
///     password: hunter2
///     repos:
///       - name: acme/widgets
///         polling: 10
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GristleConfig {
    /// Optional file that receives a copy of the operator log.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// SSH server settings.
    pub sshd: SshdConfig,
    /// Hosting API accounts and the repositories watched through each.
    pub accounts: Vec<AccountConfig>,
}

impl GristleConfig {
    /// Check every value that the type system does not already guarantee.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.log_file {
            if path.as_os_str().is_empty() {
                return Err(SettingsError::Invalid("log_file must not be empty".into()));
            }
        }
        self.sshd.validate()?;
        for account in &self.accounts {
            account.validate()?;
        }
        Ok(())
    }

    /// Iterate over every configured repository with its account.
    pub fn repos(&self) -> impl Iterator<Item = (&AccountConfig, &RepoConfig)> {
        self.accounts
            .iter()
            .flat_map(|account| account.repos.iter().map(move |repo| (account, repo)))
    }
}

/// SSH server settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshdConfig {
    /// Path to the server's private host key.
    pub host_key: PathBuf,
    /// Path to the authorized-keys table.
    pub authorized_keys: PathBuf,
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen backlog.
    #[serde(default = "default_listen_queue")]
    pub listen_queue: u32,
    /// Seconds to wait for a session channel after negotiation.
    #[serde(default = "default_accept_timeout")]
    pub accept_timeout: u64,
}

impl SshdConfig {
    /// Channel-open timeout as a [`Duration`].
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_secs(self.accept_timeout)
    }

    fn validate(&self) -> Result<()> {
        if self.host_key.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("sshd.host_key must not be empty".into()));
        }
        if self.authorized_keys.as_os_str().is_empty() {
            return Err(SettingsError::Invalid(
                "sshd.authorized_keys must not be empty".into(),
            ));
        }
        if self.listen_queue == 0 {
            return Err(SettingsError::Invalid("sshd.listen_queue must be positive".into()));
        }
        if self.accept_timeout == 0 {
            return Err(SettingsError::Invalid(
                "sshd.accept_timeout must be positive".into(),
            ));
        }
        if self.accept_timeout > MAX_ACCEPT_TIMEOUT_SECS {
            return Err(SettingsError::Invalid(format!(
                "sshd.accept_timeout must be at most {MAX_ACCEPT_TIMEOUT_SECS}"
            )));
        }
        Ok(())
    }
}

/// One hosting API account.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// API base URL, e.g. `https://api.github.com` or
    /// `https://ghe.example.com/api/v3`.
    pub url: String,
    /// Login used for HTTP basic auth.
    pub username: String,
    /// Password or personal access token for HTTP basic auth.
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// Repositories to watch, in configuration order.
    pub repos: Vec<RepoConfig>,
}

impl AccountConfig {
    fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| SettingsError::Invalid(format!("account url {:?}: {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SettingsError::Invalid(format!(
                "account url {:?} must use http or https",
                self.url
            )));
        }
        if self.username.is_empty() {
            return Err(SettingsError::Invalid("account username must not be empty".into()));
        }
        if secrecy::ExposeSecret::expose_secret(&self.password).is_empty() {
            return Err(SettingsError::Invalid(format!(
                "password for account {:?} must not be empty",
                self.username
            )));
        }
        for repo in &self.repos {
            repo.validate()?;
        }
        Ok(())
    }
}

/// One watched repository.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Full name, `owner/repo`.
    pub name: RepoName,
    /// Seconds between due fetches.
    #[serde(default = "default_polling")]
    pub polling: u64,
}

impl RepoConfig {
    /// Polling period as a [`Duration`].
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.polling)
    }

    fn validate(&self) -> Result<()> {
        if self.polling == 0 {
            return Err(SettingsError::Invalid(format!(
                "polling for {} must be positive",
                self.name
            )));
        }
        if self.polling > MAX_POLLING_SECS {
            return Err(SettingsError::Invalid(format!(
                "polling for {} must be at most {MAX_POLLING_SECS}",
                self.name
            )));
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_listen_queue() -> u32 {
    DEFAULT_LISTEN_QUEUE
}

fn default_accept_timeout() -> u64 {
    DEFAULT_ACCEPT_TIMEOUT_SECS
}

fn default_polling() -> u64 {
    DEFAULT_POLLING_SECS
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use secrecy::ExposeSecret;

    fn account(url: &str, repos: Vec<RepoConfig>) -> AccountConfig {
        AccountConfig {
            url: url.into(),
            username: "relay".into(),
            password: SecretString::from("hunter2"),
            repos,
        }
    }

    fn repo(name: &str, polling: u64) -> RepoConfig {
        RepoConfig {
            name: name.parse().unwrap(),
            polling,
        }
    }

    fn sshd() -> SshdConfig {
        SshdConfig {
            host_key: "/etc/gristle/host_rsa".into(),
            authorized_keys: "/etc/gristle/authorized_keys".into(),
            port: DEFAULT_PORT,
            listen_queue: DEFAULT_LISTEN_QUEUE,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT_SECS,
        }
    }

    #[test]
    fn valid_config_passes() {
        let cfg = GristleConfig {
            log_file: None,
            sshd: sshd(),
            accounts: vec![account(
                "https://api.github.com",
                vec![repo("acme/widgets", 10)],
            )],
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_polling_rejected() {
        let acct = account("https://api.github.com", vec![repo("acme/widgets", 0)]);
        assert_matches!(acct.validate(), Err(SettingsError::Invalid(msg)) if msg.contains("acme/widgets"));
    }

    #[test]
    fn polling_above_one_day_rejected() {
        let acct = account("https://api.github.com", vec![repo("acme/widgets", u64::MAX)]);
        assert_matches!(
            acct.validate(),
            Err(SettingsError::Invalid(msg)) if msg.contains("at most")
        );
        let acct = account(
            "https://api.github.com",
            vec![repo("acme/widgets", MAX_POLLING_SECS + 1)],
        );
        assert_matches!(acct.validate(), Err(SettingsError::Invalid(_)));
        let acct = account("https://api.github.com", vec![repo("acme/widgets", MAX_POLLING_SECS)]);
        acct.validate().unwrap();
    }

    #[test]
    fn non_http_url_rejected() {
        let acct = account("ftp://example.com", vec![]);
        assert_matches!(acct.validate(), Err(SettingsError::Invalid(_)));
        let acct = account("not a url", vec![]);
        assert_matches!(acct.validate(), Err(SettingsError::Invalid(_)));
    }

    #[test]
    fn empty_password_rejected() {
        let mut acct = account("https://api.github.com", vec![]);
        acct.password = SecretString::from("");
        assert_matches!(acct.validate(), Err(SettingsError::Invalid(_)));
    }

    #[test]
    fn zero_accept_timeout_rejected() {
        let mut s = sshd();
        s.accept_timeout = 0;
        assert_matches!(s.validate(), Err(SettingsError::Invalid(_)));
    }

    #[test]
    fn oversized_accept_timeout_rejected() {
        let mut s = sshd();
        s.accept_timeout = MAX_ACCEPT_TIMEOUT_SECS + 1;
        assert_matches!(s.validate(), Err(SettingsError::Invalid(_)));
        s.accept_timeout = u64::MAX;
        assert_matches!(s.validate(), Err(SettingsError::Invalid(_)));
    }

    #[test]
    fn password_redacted_in_debug() {
        let acct = account("https://api.github.com", vec![]);
        let dbg = format!("{acct:?}");
        assert!(!dbg.contains("hunter2"));
        assert_eq!(acct.password.expose_secret(), "hunter2");
    }

    #[test]
    fn repos_flattens_accounts_in_order() {
        let cfg = GristleConfig {
            log_file: None,
            sshd: sshd(),
            accounts: vec![
                account("https://api.github.com", vec![repo("a/one", 5), repo("a/two", 5)]),
                account("https://ghe.example.com/api/v3", vec![repo("b/three", 7)]),
            ],
        };
        let names: Vec<String> = cfg.repos().map(|(_, r)| r.name.to_string()).collect();
        assert_eq!(names, ["a/one", "a/two", "b/three"]);
    }

    #[test]
    fn durations() {
        assert_eq!(repo("a/b", 10).period(), Duration::from_secs(10));
        assert_eq!(sshd().accept_timeout(), Duration::from_secs(20));
    }
}
