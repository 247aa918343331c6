//! Graceful shutdown via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long tasks get to finish once shutdown starts.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the token that every scanner, the accept loop and every session
/// writer watch.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// New coordinator; nothing is cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the shared token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` (default [`DRAIN_TIMEOUT`]) for
    /// `handles`. Tasks still running afterwards are aborted.
    ///
    /// Returns `true` if every task finished in time.
    pub async fn graceful_shutdown(
        &self,
        mut handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> bool {
        let timeout = timeout.unwrap_or(DRAIN_TIMEOUT);
        self.shutdown();
        info!(
            tasks = handles.len(),
            timeout_secs = timeout.as_secs_f64(),
            "draining tasks"
        );

        let drain = futures::future::join_all(handles.iter_mut());
        if tokio::time::timeout(timeout, drain).await.is_ok() {
            info!("all tasks drained");
            return true;
        }

        let stragglers = handles.iter().filter(|h| !h.is_finished()).count();
        warn!(stragglers, "drain timed out after {timeout:?}, aborting remaining tasks");
        for handle in &handles {
            handle.abort();
        }
        false
    }
}
