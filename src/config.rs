//! Configuration types for assertion polling
//!
//! Build them programmatically or pick up overrides from the environment.
//! There are no config files.
//!
//! # Example
//!
//! ```
//! use kubebdd::config::{parse_duration, PollConfig};
//! use std::time::Duration;
//!
//! let config = PollConfig::default()
//!     .timeout(Duration::from_secs(5))
//!     .interval(Duration::from_millis(250));
//!
//! assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
//! ```

use std::time::Duration;

/// Environment variable overriding [`PollConfig::default_timeout`]
pub const TIMEOUT_ENV: &str = "KUBEBDD_DEFAULT_TIMEOUT";

/// Environment variable overriding [`PollConfig::interval`]
pub const INTERVAL_ENV: &str = "KUBEBDD_POLL_INTERVAL";

/// Timeout used when a step does not state one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Delay between polls
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration errors, raised before any polling starts
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("timeout must be greater than zero")]
    NonPositiveTimeout,

    #[error("poll interval must be greater than zero")]
    NonPositiveInterval,
}

/// Poll defaults shared by every assertion in a scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Window used by both disciplines when a step gives no duration
    pub default_timeout: Duration,

    /// Delay between polls
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl PollConfig {
    /// Set the default timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Defaults with `KUBEBDD_DEFAULT_TIMEOUT` / `KUBEBDD_POLL_INTERVAL` applied
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but is not a valid, positive
    /// duration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(text) = lookup(TIMEOUT_ENV) {
            self.default_timeout = parse_duration(&text)?;
        }
        if let Some(text) = lookup(INTERVAL_ENV) {
            self.interval = parse_duration(&text)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject zero durations
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NonPositiveTimeout` or
    /// `ConfigError::NonPositiveInterval`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_window(self.default_timeout, self.interval)
    }
}

pub(crate) fn validate_window(timeout: Duration, interval: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::NonPositiveTimeout);
    }
    if interval.is_zero() {
        return Err(ConfigError::NonPositiveInterval);
    }
    Ok(())
}

/// Parse human duration notation such as `5s`, `250ms` or `1m30s`
///
/// # Errors
///
/// Returns `ConfigError::InvalidDuration` for empty or malformed text.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDuration {
            input: text.to_string(),
            reason: "empty duration".to_string(),
        });
    }
    humantime::parse_duration(trimmed).map_err(|e| ConfigError::InvalidDuration {
        input: text.to_string(),
        reason: e.to_string(),
    })
}
