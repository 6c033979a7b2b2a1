//! Logging configuration for kubebdd
//!
//! Provides simple tracing-based logging to stderr. Poll-by-poll detail is
//! logged at `debug`, verdicts at `info`.
//!
//! # Example
//!
//! ```no_run
//! use kubebdd::telemetry::init_logging;
//!
//! init_logging();
//! // Logs will go to stderr with the configured level
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Crate-specific filter variable, checked before `RUST_LOG`
pub const LOG_ENV: &str = "KUBEBDD_LOG";

/// Initialize logging with tracing-subscriber
///
/// Uses `KUBEBDD_LOG`, then `RUST_LOG`, for filtering (default: info).
/// Call once at the start of your test run; later calls are no-ops.
pub fn init_logging() {
    init_logging_with("info");
}

/// Initialize logging, falling back to `default_filter` when neither
/// environment variable is set or parses
pub fn init_logging_with(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter_from_env(default_filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn filter_from_env(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter))
}
