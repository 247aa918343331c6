//! Client sessions and the registry of live sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use metrics::gauge;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::SessionWriteError;
use crate::metrics::SESSIONS_ACTIVE;

/// Lines a session may have queued before further lines are refused.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// Process-unique session identifier.
pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One authenticated client's outbound sink.
///
/// Lines are queued here and written to the SSH channel by the session's
/// writer task.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    identity: String,
    peer: Option<SocketAddr>,
    tx: mpsc::Sender<Arc<str>>,
    connected_at: DateTime<Utc>,
    dropped_lines: AtomicU64,
}

impl Session {
    /// Create a session and the receiving end of its outbound queue.
    pub fn open(
        identity: impl Into<String>,
        peer: Option<SocketAddr>,
    ) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        (Self::with_sender(identity, peer, tx), rx)
    }

    /// Create a session over an existing queue.
    pub fn with_sender(
        identity: impl Into<String>,
        peer: Option<SocketAddr>,
        tx: mpsc::Sender<Arc<str>>,
    ) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            identity: identity.into(),
            peer,
            tx,
            connected_at: Utc::now(),
            dropped_lines: AtomicU64::new(0),
        }
    }

    /// Session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Authenticated username.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Remote address, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// When the session was opened.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue one line without waiting.
    pub fn try_send(&self, line: Arc<str>) -> Result<(), SessionWriteError> {
        self.tx.try_send(line).map_err(|e| {
            let _ = self.dropped_lines.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => SessionWriteError::Full,
                mpsc::error::TrySendError::Closed(_) => SessionWriteError::Closed,
            }
        })
    }

    /// Lines refused so far.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines.load(Ordering::Relaxed)
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_active(count: usize) {
    gauge!(SESSIONS_ACTIVE).set(count as f64);
}

/// Live sessions in registration order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<Vec<Arc<Session>>>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session.
    pub fn register(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write();
        debug!(session_id = session.id(), identity = session.identity(), "register session");
        sessions.push(session);
        record_active(sessions.len());
    }

    /// Remove a session. Returns `false` if it was not registered.
    pub fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write();
        let Some(pos) = sessions.iter().position(|s| s.id() == id) else {
            return false;
        };
        let _ = sessions.remove(pos);
        record_active(sessions.len());
        debug!(session_id = id, "unregister session");
        true
    }

    /// Copy of the current membership.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().clone()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().iter().any(|s| s.id() == id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
