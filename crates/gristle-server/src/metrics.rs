//! Metric names.
//!
//! No exporter is installed by this crate; recording is a no-op until the
//! embedding process installs a `metrics` recorder.

/// Inbound TCP connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "gristle_connections_total";
/// Connections aborted before or during setup (counter, labels: reason).
pub const CONNECTION_FAILURES_TOTAL: &str = "gristle_connection_failures_total";
/// Public-key authentication attempts (counter, labels: outcome).
pub const AUTH_ATTEMPTS_TOTAL: &str = "gristle_auth_attempts_total";
/// Registered sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "gristle_sessions_active";
/// Events handed to the broadcaster (counter, labels: repo).
pub const EVENTS_PUBLISHED_TOTAL: &str = "gristle_events_published_total";
/// Lines that could not be queued for a session (counter).
pub const BROADCAST_FAILURES_TOTAL: &str = "gristle_broadcast_failures_total";
/// Event fetches attempted (counter, labels: repo).
pub const FETCHES_TOTAL: &str = "gristle_fetches_total";
/// Event fetches that failed (counter, labels: repo).
pub const FETCH_ERRORS_TOTAL: &str = "gristle_fetch_errors_total";
