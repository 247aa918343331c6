//! Event fan-out to registered sessions.

use std::sync::Arc;

use gristle_core::RepoEvent;
use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::BROADCAST_FAILURES_TOTAL;
use crate::session::SessionRegistry;

/// Outcome of one [`Broadcaster::publish`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Sessions the line was queued for.
    pub delivered: usize,
    /// Sessions that refused the line and were unregistered.
    pub failed: usize,
}

/// Writes event lines to every live session.
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    /// Broadcaster over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Serialize `event` once and queue it for every session in a snapshot
    /// of the registry taken now.
    ///
    /// A session that cannot take the line is unregistered; the rest still
    /// receive it.
    pub fn publish(&self, event: &RepoEvent) -> PublishReport {
        self.publish_line(Arc::from(event.to_line()))
    }

    /// Queue a preformatted line for every session.
    pub fn publish_line(&self, line: Arc<str>) -> PublishReport {
        let sessions = self.registry.snapshot();
        let mut report = PublishReport::default();

        for session in &sessions {
            match session.try_send(line.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        session_id = session.id(),
                        identity = session.identity(),
                        peer = ?session.peer(),
                        error = %e,
                        "dropping session after failed write"
                    );
                    counter!(BROADCAST_FAILURES_TOTAL).increment(1);
                    let _ = self.registry.unregister(session.id());
                }
            }
        }

        debug!(
            recipients = sessions.len(),
            delivered = report.delivered,
            failed = report.failed,
            "broadcast line"
        );
        report
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
