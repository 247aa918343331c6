//! Public-key authentication and channel policy.
//!
//! The authorized-keys table is read once at startup. Each line holds
//! `key-type key-material username`; only `ssh-rsa` entries are honored and
//! usernames are matched case-insensitively.

use std::collections::HashMap;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use metrics::counter;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::errors::{Result, ServerError};
use crate::metrics::AUTH_ATTEMPTS_TOTAL;

/// The only key type honored in the authorized-keys table.
pub const RSA_KEY_TYPE: &str = "ssh-rsa";

/// One authorized identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedKey {
    /// Lower-cased username.
    pub username: String,
    /// Key algorithm name, always [`RSA_KEY_TYPE`].
    pub key_type: String,
    /// Decoded SSH wire blob.
    pub key_blob: Vec<u8>,
}

/// Username → key table.
#[derive(Clone, Debug, Default)]
pub struct AuthorizedKeys {
    keys: HashMap<String, AuthorizedKey>,
}

impl AuthorizedKeys {
    /// Parse the contents of an authorized-keys file.
    ///
    /// Malformed lines are skipped with a warning; they never fail the
    /// whole table.
    pub fn parse(contents: &str) -> Self {
        let mut keys = HashMap::new();
        for (idx, raw) in contents.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            let [key_type, material, user] = fields.as_slice() else {
                warn!(
                    line = lineno,
                    fields = fields.len(),
                    "skipping authorized key: expected 3 fields"
                );
                continue;
            };
            if *key_type != RSA_KEY_TYPE {
                debug!(line = lineno, key_type, "skipping authorized key: unsupported type");
                continue;
            }
            let key_blob = match STANDARD.decode(material) {
                Ok(blob) => blob,
                Err(e) => {
                    warn!(line = lineno, error = %e, "skipping authorized key: bad base64");
                    continue;
                }
            };

            let username = user.to_lowercase();
            let entry = AuthorizedKey {
                username: username.clone(),
                key_type: (*key_type).to_string(),
                key_blob,
            };
            if keys.insert(username.clone(), entry).is_some() {
                warn!(line = lineno, username, "duplicate authorized key, later entry wins");
            }
        }
        Self { keys }
    }

    /// Read and parse the file at `path`. An unreadable file is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ServerError::AuthorizedKeys {
                path: path.to_path_buf(),
                source,
            })?;
        let keys = Self::parse(&contents);
        info!(path = %path.display(), count = keys.len(), "loaded authorized keys");
        Ok(keys)
    }

    /// Key for `username`, matched case-insensitively.
    pub fn get(&self, username: &str) -> Option<&AuthorizedKey> {
        self.keys.get(&username.to_lowercase())
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// OpenSSH-style fingerprint of a key blob: `SHA256:<base64, unpadded>`.
pub fn fingerprint(key_blob: &[u8]) -> String {
    format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(key_blob)))
}

/// Outcome of a public-key check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthDecision {
    /// The key matches the stored key for the user.
    Accepted,
    /// Unknown user or mismatched key.
    Rejected,
}

/// Kind of channel a client asked to open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    /// Interactive session channel.
    Session,
    /// Anything else (port forwarding, X11, agent).
    Other,
}

/// What the SSH front end asks before letting a client proceed.
pub trait ConnectionPolicy: Send + Sync {
    /// Check a presented public key (SSH wire blob) for `username`.
    fn authenticate(&self, username: &str, key_blob: &[u8]) -> AuthDecision;

    /// Whether a channel of `kind` may be opened.
    fn approve_channel(&self, kind: ChannelKind) -> bool;

    /// Whether a PTY request may be granted.
    fn approve_pty(&self) -> bool;

    /// Whether a shell request may be granted.
    fn approve_shell(&self) -> bool;
}

/// Identity-by-public-key gate over a static [`AuthorizedKeys`] table.
#[derive(Debug, Default)]
pub struct AuthGate {
    keys: AuthorizedKeys,
}

impl AuthGate {
    /// Gate over `keys`.
    pub fn new(keys: AuthorizedKeys) -> Self {
        Self { keys }
    }

    /// Number of known identities.
    pub fn identities(&self) -> usize {
        self.keys.len()
    }
}

impl ConnectionPolicy for AuthGate {
    fn authenticate(&self, username: &str, key_blob: &[u8]) -> AuthDecision {
        let decision = match self.keys.get(username) {
            Some(stored) if stored.key_blob == key_blob => AuthDecision::Accepted,
            _ => AuthDecision::Rejected,
        };
        let outcome = match decision {
            AuthDecision::Accepted => "accepted",
            AuthDecision::Rejected => "rejected",
        };
        info!(
            username,
            fingerprint = %fingerprint(key_blob),
            outcome,
            "public key auth attempt"
        );
        counter!(AUTH_ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
        decision
    }

    fn approve_channel(&self, kind: ChannelKind) -> bool {
        kind == ChannelKind::Session
    }

    fn approve_pty(&self) -> bool {
        true
    }

    fn approve_shell(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
