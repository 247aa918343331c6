//! Per-repository polling.
//!
//! A scanner resolves its repository once, then wakes every polling period,
//! fetches the repository's recent events and publishes those created
//! within the last period. The window is anchored at the tick's own scan
//! time, so a fetch that takes a while does not shift it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use gristle_core::{RepoEvent, RepoName};
use gristle_github::{ApiError, GitHubApi, RepoHandle};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::broadcast::Broadcaster;
use crate::metrics::{EVENTS_PUBLISHED_TOTAL, FETCHES_TOTAL, FETCH_ERRORS_TOTAL};

/// Wall-clock source for scan times.
///
/// Anchors a UTC timestamp to a `tokio` instant and advances with the
/// runtime clock, so paused-time tests drive it too.
#[derive(Clone, Copy, Debug)]
pub struct ScanClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl ScanClock {
    /// Clock reading the current wall time.
    pub fn system() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Clock that reads `base` now.
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            origin: tokio::time::Instant::now(),
        }
    }

    /// Current time.
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed =
            TimeDelta::from_std(self.origin.elapsed()).unwrap_or_else(|_| TimeDelta::zero());
        self.base
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Scan bookkeeping for one repository.
#[derive(Clone, Debug)]
pub struct ScanState {
    repo: RepoName,
    last_scan_time: DateTime<Utc>,
    next_scan_time: DateTime<Utc>,
    period: TimeDelta,
}

impl ScanState {
    /// Fresh state: the first scan is due at `now`.
    pub fn new(repo: RepoName, period: Duration, now: DateTime<Utc>) -> Self {
        Self {
            repo,
            last_scan_time: now,
            next_scan_time: now,
            period: TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Repository this state belongs to.
    pub fn repo(&self) -> &RepoName {
        &self.repo
    }

    /// Scan time of the most recent tick (the start time before the first).
    pub fn last_scan_time(&self) -> DateTime<Utc> {
        self.last_scan_time
    }

    /// When the next fetch is due.
    pub fn next_scan_time(&self) -> DateTime<Utc> {
        self.next_scan_time
    }

    /// Whether a fetch is due at `scan_time`.
    pub fn is_due(&self, scan_time: DateTime<Utc>) -> bool {
        scan_time >= self.next_scan_time
    }

    /// Oldest creation time published by a tick at `scan_time`.
    ///
    /// Saturates at the earliest representable time.
    pub fn window_start(&self, scan_time: DateTime<Utc>) -> DateTime<Utc> {
        scan_time
            .checked_sub_signed(self.period)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Time left until the next fetch is due.
    pub fn until_due(&self, now: DateTime<Utc>) -> Duration {
        (self.next_scan_time - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Record a completed tick. `next_scan_time` never moves backwards.
    pub fn advance(&mut self, scan_time: DateTime<Utc>) {
        self.last_scan_time = scan_time;
        let next = scan_time
            .checked_add_signed(self.period)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if next > self.next_scan_time {
            self.next_scan_time = next;
        }
    }
}

/// Events created at or after `since`, oldest first.
///
/// The sort is stable, so events with equal timestamps keep API order.
pub fn select_window(events: Vec<RepoEvent>, since: DateTime<Utc>) -> Vec<RepoEvent> {
    let mut selected: Vec<RepoEvent> = events
        .into_iter()
        .filter(|e| e.created_at >= since)
        .collect();
    selected.sort_by_key(|e| e.created_at);
    selected
}

/// Why a scanner stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanExit {
    /// The owner or repository could not be resolved.
    Unresolved,
    /// The API rejected the account's credentials.
    Fatal,
    /// Shutdown was requested.
    Shutdown,
}

/// Polls one repository and publishes its new events.
pub struct RepoScanner {
    name: RepoName,
    period: Duration,
    api: Arc<dyn GitHubApi>,
    broadcaster: Arc<Broadcaster>,
    clock: Option<ScanClock>,
}

impl RepoScanner {
    /// Scanner for `name`, fetching every `period`.
    pub fn new(
        name: RepoName,
        period: Duration,
        api: Arc<dyn GitHubApi>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            name,
            period,
            api,
            broadcaster,
            clock: None,
        }
    }

    /// Use `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: ScanClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Repository being scanned.
    pub fn name(&self) -> &RepoName {
        &self.name
    }

    /// Resolve, then scan until shutdown or a fatal API error.
    #[instrument(skip_all, fields(repo = %self.name))]
    pub async fn run(self, cancel: CancellationToken) -> ScanExit {
        let resolved = tokio::select! {
            biased;
            () = cancel.cancelled() => return ScanExit::Shutdown,
            r = self.api.resolve_repo(&self.name) => r,
        };
        let handle = match resolved {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "could not resolve repository, not scanning it");
                return ScanExit::Unresolved;
            }
        };
        info!(
            canonical = %handle.name,
            owner_kind = ?handle.owner_kind,
            period_secs = self.period.as_secs(),
            "scanning repository"
        );

        let clock = self.clock.unwrap_or_else(ScanClock::system);
        let mut state = ScanState::new(handle.name.clone(), self.period, clock.now());

        loop {
            let wait = state.until_due(clock.now());
            tokio::select! {
                biased;
                () = cancel.cancelled() => return ScanExit::Shutdown,
                () = tokio::time::sleep(wait) => {}
            }

            let scan_time = clock.now();
            if !state.is_due(scan_time) {
                continue;
            }

            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return ScanExit::Shutdown,
                r = self.fetch(&handle) => r,
            };
            let events = match fetched {
                Ok(events) => events,
                Err(e) if e.is_fatal() => {
                    error!(
                        status = ?e.status(),
                        error = %e,
                        "credentials rejected, stopping scanner"
                    );
                    return ScanExit::Fatal;
                }
                Err(e) => {
                    warn!(
                        status = ?e.status(),
                        error = %e,
                        "fetch failed, treating as no events"
                    );
                    Vec::new()
                }
            };

            let since = state.window_start(scan_time);
            let published = self.publish(select_window(events, since));
            debug!(canonical = %state.repo(), %scan_time, %since, published, "scan tick");
            state.advance(scan_time);
        }
    }

    async fn fetch(&self, handle: &RepoHandle) -> Result<Vec<RepoEvent>, ApiError> {
        let repo = self.name.to_string();
        counter!(FETCHES_TOTAL, "repo" => repo.clone()).increment(1);
        let result = self.api.fetch_events(handle).await;
        if result.is_err() {
            counter!(FETCH_ERRORS_TOTAL, "repo" => repo).increment(1);
        }
        result
    }

    fn publish(&self, events: Vec<RepoEvent>) -> usize {
        let count = events.len();
        for event in &events {
            let report = self.broadcaster.publish(event);
            debug!(
                event_id = event.id().unwrap_or("-"),
                kind = event.kind().unwrap_or("-"),
                delivered = report.delivered,
                failed = report.failed,
                "published event"
            );
        }
        if count > 0 {
            counter!(EVENTS_PUBLISHED_TOTAL, "repo" => self.name.to_string())
                .increment(count as u64);
        }
        count
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
