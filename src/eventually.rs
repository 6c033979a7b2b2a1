//! Polling a live value against a predicate over time
//!
//! Two disciplines:
//! - **Eventually**: poll until the predicate holds once, or fail when the
//!   window closes. Fetch errors count as failed polls and are retried.
//! - **Consistently**: poll for the whole window; fail on the first poll
//!   where the predicate does not hold.
//!
//! Both stop immediately when the cancellation token fires, during a fetch
//! or between polls. A fetch never holds the evaluation past its window.
//!
//! # Example
//!
//! ```ignore
//! use kubebdd::eventually::{evaluate, PollSpec};
//!
//! let predicate = Grammar::new().compile("equal Running")?;
//! let outcome = evaluate(
//!     || async { fetch_phase().await },
//!     &predicate,
//!     &PollSpec::eventually(Duration::from_secs(30)),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! ```

use crate::config::{validate_window, ConfigError, DEFAULT_INTERVAL};
use crate::grammar::Predicate;
use crate::value::TypedValue;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A collaborator failed to produce a value for one poll
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("failed to fetch resource: {0}")]
    Resolve(String),

    #[error("malformed path: {0}")]
    MalformedPath(String),
}

/// Why the most recent poll did not hold
#[derive(Debug, Clone, PartialEq)]
pub enum PollFailure {
    /// The fetch itself failed
    Fetch(FetchError),
    /// The path resolved to nothing
    Missing,
    /// A value was sampled but did not satisfy the predicate
    Mismatch(String),
    /// The window closed while a fetch was still in flight
    Pending,
}

impl fmt::Display for PollFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "{e}"),
            Self::Missing => write!(f, "value not found"),
            Self::Mismatch(message) => write!(f, "{message}"),
            Self::Pending => write!(f, "fetch still pending when the window closed"),
        }
    }
}

/// Polling discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Eventually,
    Consistently,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eventually => write!(f, "eventually"),
            Self::Consistently => write!(f, "consistently"),
        }
    }
}

/// How one assertion is polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    pub timeout: Duration,
    pub interval: Duration,
    pub discipline: Discipline,
    /// Inverts the predicate's polarity for this evaluation
    pub negate: bool,
}

impl PollSpec {
    /// Eventually within `timeout`, default interval
    #[must_use]
    pub fn eventually(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_INTERVAL,
            discipline: Discipline::Eventually,
            negate: false,
        }
    }

    /// Consistently for `window`, default interval
    #[must_use]
    pub fn consistently(window: Duration) -> Self {
        Self {
            timeout: window,
            interval: DEFAULT_INTERVAL,
            discipline: Discipline::Consistently,
            negate: false,
        }
    }

    /// Set the polling interval
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the polarity
    #[must_use]
    pub fn negate(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }
}

/// Terminal record of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionOutcome {
    pub satisfied: bool,
    /// Value sampled by the last successful fetch
    pub last_value: Option<TypedValue>,
    /// Why the last poll did not hold, if it did not
    pub last_error: Option<PollFailure>,
    pub elapsed: Duration,
    pub polls: u32,
}

impl fmt::Display for AssertionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "├─ Polls: {}", self.polls)?;
        writeln!(f, "├─ Elapsed: {:?}", self.elapsed)?;
        match &self.last_value {
            Some(value) => writeln!(f, "├─ Last value: {value}")?,
            None => writeln!(f, "├─ Last value: <none>")?,
        }
        match &self.last_error {
            Some(failure) => write!(f, "└─ Last failure: {failure}"),
            None => write!(f, "└─ Last failure: <none>"),
        }
    }
}

/// Error type for eventually/consistently evaluations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConditionError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("condition not met within {timeout:?}{outcome}")]
    Timeout {
        timeout: Duration,
        outcome: Box<AssertionOutcome>,
    },

    #[error("condition stopped holding after {:?}{outcome}", .outcome.elapsed)]
    ConsistencyViolation { outcome: Box<AssertionOutcome> },

    #[error("evaluation cancelled after {:?}{outcome}", .outcome.elapsed)]
    Cancelled { outcome: Box<AssertionOutcome> },
}

impl ConditionError {
    /// The outcome carried by a runtime failure
    #[must_use]
    pub fn outcome(&self) -> Option<&AssertionOutcome> {
        match self {
            Self::Configuration(_) => None,
            Self::Timeout { outcome, .. }
            | Self::ConsistencyViolation { outcome }
            | Self::Cancelled { outcome } => Some(outcome),
        }
    }
}

/// Running state of one evaluation
struct Tracker {
    start: Instant,
    polls: u32,
    last_value: Option<TypedValue>,
    last_error: Option<PollFailure>,
}

impl Tracker {
    fn outcome(&self, satisfied: bool) -> Box<AssertionOutcome> {
        Box::new(AssertionOutcome {
            satisfied,
            last_value: self.last_value.clone(),
            last_error: if satisfied {
                None
            } else {
                self.last_error.clone()
            },
            elapsed: self.start.elapsed(),
            polls: self.polls,
        })
    }

    /// Record one fetch result; returns whether the poll holds
    fn record(
        &mut self,
        sample: Result<Option<TypedValue>, FetchError>,
        predicate: &Predicate,
        negate: bool,
    ) -> bool {
        self.polls += 1;
        match sample {
            Ok(Some(value)) => {
                let holds = match predicate.matches(&value) {
                    Ok(matched) => {
                        let holds = matched != negate;
                        self.last_error = (!holds).then(|| {
                            let mut shown = predicate.clone();
                            shown.negate = negate;
                            PollFailure::Mismatch(shown.failure_message(&value))
                        });
                        holds
                    }
                    Err(e) => {
                        self.last_error = Some(PollFailure::Mismatch(e.to_string()));
                        false
                    }
                };
                self.last_value = Some(value);
                holds
            }
            Ok(None) => {
                self.last_value = None;
                self.last_error = Some(PollFailure::Missing);
                false
            }
            Err(e) => {
                self.last_error = Some(PollFailure::Fetch(e));
                false
            }
        }
    }
}

/// The window closed before the in-flight fetch returned
///
/// A consistently window that already held on every completed poll passes.
/// With nothing observed, or under eventually, the window has failed.
fn close_during_fetch(
    tracker: &mut Tracker,
    spec: &PollSpec,
) -> Result<AssertionOutcome, ConditionError> {
    warn!(
        discipline = %spec.discipline,
        polls = tracker.polls,
        timeout = ?spec.timeout,
        "Window closed during fetch"
    );
    match spec.discipline {
        Discipline::Consistently if tracker.polls > 0 => Ok(*tracker.outcome(true)),
        Discipline::Consistently => {
            tracker.last_error = Some(PollFailure::Pending);
            Err(ConditionError::ConsistencyViolation {
                outcome: tracker.outcome(false),
            })
        }
        Discipline::Eventually => {
            tracker.last_error = Some(PollFailure::Pending);
            Err(ConditionError::Timeout {
                timeout: spec.timeout,
                outcome: tracker.outcome(false),
            })
        }
    }
}

/// Poll `fetch` and apply `predicate` under `spec`
///
/// `fetch` yields `Ok(Some(value))` for a sampled value, `Ok(None)` when
/// the value is absent, and `Err` when retrieval failed. Absent values and
/// type-mismatched values never hold, whatever the polarity.
///
/// # Errors
///
/// - `ConditionError::Configuration` for a zero timeout or interval, before
///   any poll
/// - `ConditionError::Timeout` when an eventually window closes, even with a
///   fetch still in flight
/// - `ConditionError::ConsistencyViolation` on the first failing poll of a
///   consistently window
/// - `ConditionError::Cancelled` when `cancel` fires
pub async fn evaluate<F, Fut>(
    mut fetch: F,
    predicate: &Predicate,
    spec: &PollSpec,
    cancel: &CancellationToken,
) -> Result<AssertionOutcome, ConditionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<TypedValue>, FetchError>>,
{
    validate_window(spec.timeout, spec.interval)?;

    let negate = predicate.negate != spec.negate;
    let mut tracker = Tracker {
        start: Instant::now(),
        polls: 0,
        last_value: None,
        last_error: None,
    };

    loop {
        if cancel.is_cancelled() {
            return Err(ConditionError::Cancelled {
                outcome: tracker.outcome(false),
            });
        }

        let sample = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(ConditionError::Cancelled { outcome: tracker.outcome(false) });
            }
            sample = fetch() => sample,
            () = sleep(spec.timeout.saturating_sub(tracker.start.elapsed())) => {
                return close_during_fetch(&mut tracker, spec);
            }
        };
        let holds = tracker.record(sample, predicate, negate);
        let elapsed = tracker.start.elapsed();

        debug!(
            discipline = %spec.discipline,
            poll = tracker.polls,
            elapsed = ?elapsed,
            holds = holds,
            "Polled value"
        );

        match spec.discipline {
            Discipline::Eventually => {
                if holds {
                    return Ok(*tracker.outcome(true));
                }
                if elapsed >= spec.timeout {
                    warn!(
                        polls = tracker.polls,
                        timeout = ?spec.timeout,
                        "Eventually window expired"
                    );
                    return Err(ConditionError::Timeout {
                        timeout: spec.timeout,
                        outcome: tracker.outcome(false),
                    });
                }
            }
            Discipline::Consistently => {
                if !holds {
                    warn!(
                        poll = tracker.polls,
                        elapsed = ?elapsed,
                        "Consistently condition violated"
                    );
                    return Err(ConditionError::ConsistencyViolation {
                        outcome: tracker.outcome(false),
                    });
                }
                if elapsed >= spec.timeout {
                    return Ok(*tracker.outcome(true));
                }
            }
        }

        let wait = spec.interval.min(spec.timeout.saturating_sub(elapsed));
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(ConditionError::Cancelled { outcome: tracker.outcome(false) });
            }
            () = sleep(wait) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn predicate(phrase: &str) -> Predicate {
        Grammar::new().compile(phrase).unwrap()
    }

    /// Fetch closure replaying `values`, repeating the last one
    fn replay(
        values: Vec<TypedValue>,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> std::future::Ready<Result<Option<TypedValue>, FetchError>>,
    ) {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let fetch = move || {
            let n = counter_clone.fetch_add(1, Ordering::SeqCst) as usize;
            let value = values[n.min(values.len() - 1)].clone();
            std::future::ready(Ok(Some(value)))
        };
        (counter, fetch)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_succeeds_on_first_poll() {
        let (counter, fetch) = replay(vec![TypedValue::Number(3.0)]);
        let outcome = evaluate(
            fetch,
            &predicate("equal 3"),
            &PollSpec::eventually(Duration::from_secs(1)).interval(ms(10)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.satisfied);
        assert_eq!(outcome.polls, 1);
        assert_eq!(outcome.elapsed, Duration::ZERO);
        assert_eq!(outcome.last_value, Some(TypedValue::Number(3.0)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_succeeds_when_value_arrives() {
        let values = [1.0, 2.0, 6.0].map(TypedValue::Number).to_vec();
        let (_, fetch) = replay(values);
        let outcome = evaluate(
            fetch,
            &predicate(">= 5"),
            &PollSpec::eventually(ms(100)).interval(ms(10)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.polls, 3);
        assert_eq!(outcome.elapsed, ms(20));
        assert_eq!(outcome.last_value, Some(TypedValue::Number(6.0)));
        assert_eq!(outcome.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_times_out() {
        let (_, fetch) = replay(vec![TypedValue::Sequence(vec![
            TypedValue::from("a"),
            TypedValue::from("b"),
            TypedValue::from("c"),
        ])]);
        let err = evaluate(
            fetch,
            &predicate("have length 0"),
            &PollSpec::eventually(ms(100)).interval(ms(10)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        let ConditionError::Timeout { timeout, outcome } = err else {
            panic!("expected Timeout, got {err:?}");
        };
        assert_eq!(timeout, ms(100));
        assert!(!outcome.satisfied);
        assert_eq!(outcome.elapsed, ms(100));
        assert_eq!(outcome.polls, 11);
        assert!(matches!(outcome.last_error, Some(PollFailure::Mismatch(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_deadline_not_multiple_of_interval() {
        let (_, fetch) = replay(vec![TypedValue::Bool(false)]);
        let err = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::eventually(ms(25)).interval(ms(10)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        // Polls at 0, 10, 20 and one final poll at the deadline
        let outcome = err.outcome().unwrap();
        assert_eq!(outcome.polls, 4);
        assert_eq!(outcome.elapsed, ms(25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_retries_fetch_errors() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let fetch = move || {
            let n = counter_clone.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < 3 {
                Err(FetchError::NotFound("pod/foo".to_string()))
            } else {
                Ok(Some(TypedValue::from("Running")))
            })
        };

        let outcome = evaluate(
            fetch,
            &predicate("equal Running"),
            &PollSpec::eventually(Duration::from_secs(1)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.satisfied);
        assert_eq!(outcome.polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_keeps_last_fetch_error() {
        let fetch = || {
            std::future::ready(Err::<Option<TypedValue>, _>(FetchError::Resolve(
                "connection refused".into(),
            )))
        };
        let err = evaluate(
            fetch,
            &predicate("equal Running"),
            &PollSpec::eventually(ms(50)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        let outcome = err.outcome().unwrap();
        assert_eq!(outcome.last_value, None);
        assert_eq!(
            outcome.last_error,
            Some(PollFailure::Fetch(FetchError::Resolve(
                "connection refused".into()
            )))
        );
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_value_never_holds() {
        let spec = PollSpec::eventually(ms(30)).negate(true);
        let err = evaluate(
            || std::future::ready(Ok::<_, FetchError>(None)),
            &predicate("equal Running"),
            &spec,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConditionError::Timeout { .. }));
        assert_eq!(err.outcome().unwrap().last_error, Some(PollFailure::Missing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_mismatch_never_holds() {
        let (_, fetch) = replay(vec![TypedValue::from("five")]);
        let err = evaluate(
            fetch,
            &predicate(">= 5"),
            &PollSpec::eventually(ms(20)).negate(true),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        let outcome = err.outcome().unwrap();
        assert!(matches!(
            &outcome.last_error,
            Some(PollFailure::Mismatch(m)) if m.contains("expects a number")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_negated() {
        let values = ["Pending", "Pending", "Running"]
            .map(TypedValue::from)
            .to_vec();
        let (_, fetch) = replay(values);
        let outcome = evaluate(
            fetch,
            &predicate("equal Pending"),
            &PollSpec::eventually(Duration::from_secs(1)).negate(true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.polls, 3);
        assert_eq!(outcome.last_value, Some(TypedValue::from("Running")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consistently_holds_for_full_window() {
        let (counter, fetch) = replay(vec![TypedValue::Bool(true)]);
        let outcome = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::consistently(ms(50)).interval(ms(10)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.satisfied);
        assert_eq!(outcome.elapsed, ms(50));
        assert_eq!(outcome.polls, 6);
        assert_eq!(counter.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consistently_fails_fast() {
        let values = [true, true, false, true].map(TypedValue::Bool).to_vec();
        let (counter, fetch) = replay(values);
        let err = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::consistently(ms(50)).interval(ms(10)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        let ConditionError::ConsistencyViolation { outcome } = err else {
            panic!("expected ConsistencyViolation, got {err:?}");
        };
        assert_eq!(outcome.polls, 3);
        assert_eq!(outcome.elapsed, ms(20));
        assert_eq!(outcome.last_value, Some(TypedValue::Bool(false)));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consistently_fetch_error_is_violation() {
        let err = evaluate(
            || std::future::ready(Err::<Option<TypedValue>, _>(FetchError::NotFound("cm/foo".into()))),
            &predicate("equal 1"),
            &PollSpec::consistently(ms(50)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConditionError::ConsistencyViolation { .. }));
        assert_eq!(err.outcome().unwrap().polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consistently_negated() {
        let (_, fetch) = replay(vec![TypedValue::from("Running")]);
        let outcome = evaluate(
            fetch,
            &predicate("equal Failed"),
            &PollSpec::consistently(ms(30)).negate(true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(outcome.satisfied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_and_spec_negation_cancel_out() {
        let (_, fetch) = replay(vec![TypedValue::Number(1.0)]);
        let outcome = evaluate(
            fetch,
            &predicate("equal 1").negated(),
            &PollSpec::eventually(ms(30)).negate(true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_fails_fast() {
        let (counter, fetch) = replay(vec![TypedValue::Null]);
        let err = evaluate(
            fetch,
            &predicate("equal null"),
            &PollSpec::eventually(Duration::ZERO),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ConditionError::Configuration(ConfigError::NonPositiveTimeout)
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_fails_fast() {
        let (counter, fetch) = replay(vec![TypedValue::Null]);
        let err = evaluate(
            fetch,
            &predicate("equal null"),
            &PollSpec::consistently(ms(10)).interval(Duration::ZERO),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ConditionError::Configuration(ConfigError::NonPositiveInterval)
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let (counter, fetch) = replay(vec![TypedValue::Bool(true)]);
        let err = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::eventually(ms(100)),
            &token,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConditionError::Cancelled { .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_wait() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(ms(35)).await;
            canceller.cancel();
        });

        let (_, fetch) = replay(vec![TypedValue::Bool(false)]);
        let err = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::eventually(Duration::from_secs(1)).interval(ms(100)),
            &token,
        )
        .await
        .unwrap_err();

        let ConditionError::Cancelled { outcome } = err else {
            panic!("expected Cancelled, got {err:?}");
        };
        // Woken mid-wait, not at the next scheduled poll
        assert_eq!(outcome.polls, 1);
        assert_eq!(outcome.elapsed, ms(35));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_fetch() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(ms(5)).await;
            canceller.cancel();
        });

        let fetch = || async {
            sleep(Duration::from_secs(60)).await;
            Ok::<_, FetchError>(Some(TypedValue::Bool(true)))
        };
        let err = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::consistently(Duration::from_secs(1)),
            &token,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConditionError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_not_reported_as_timeout() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(ms(95)).await;
            canceller.cancel();
        });

        let (_, fetch) = replay(vec![TypedValue::Bool(false)]);
        let err = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::eventually(ms(100)).interval(ms(50)),
            &token,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConditionError::Cancelled { .. }));
    }

    /// Fetch that answers `value` at once on the first call, then hangs
    fn stalls_after_first(
        value: TypedValue,
    ) -> impl FnMut() -> std::pin::Pin<
        Box<dyn Future<Output = Result<Option<TypedValue>, FetchError>> + Send>,
    > {
        let calls = Arc::new(AtomicU32::new(0));
        move || {
            let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
            let value = value.clone();
            Box::pin(async move {
                if !first {
                    sleep(Duration::from_secs(300)).await;
                }
                Ok::<_, FetchError>(Some(value))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_slow_fetch_bounded_by_timeout() {
        let fetch = || async {
            sleep(Duration::from_secs(300)).await;
            Ok::<_, FetchError>(Some(TypedValue::Bool(true)))
        };
        let err = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::eventually(ms(100)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        let ConditionError::Timeout { timeout, outcome } = err else {
            panic!("expected timeout, got {err:?}");
        };
        assert_eq!(timeout, ms(100));
        assert_eq!(outcome.elapsed, ms(100));
        assert_eq!(outcome.polls, 0);
        assert_eq!(outcome.last_error, Some(PollFailure::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_stalled_retry_bounded_by_timeout() {
        let err = evaluate(
            stalls_after_first(TypedValue::from("Pending")),
            &predicate("equal Running"),
            &PollSpec::eventually(ms(100)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        let outcome = err.outcome().unwrap();
        assert_eq!(outcome.elapsed, ms(100));
        assert_eq!(outcome.polls, 1);
        assert_eq!(outcome.last_value, Some(TypedValue::from("Pending")));
        assert!(matches!(err, ConditionError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consistently_slow_fetch_ends_with_window() {
        let outcome = evaluate(
            stalls_after_first(TypedValue::Bool(true)),
            &predicate("be true"),
            &PollSpec::consistently(ms(50)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.satisfied);
        assert_eq!(outcome.elapsed, ms(50));
        assert_eq!(outcome.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consistently_nothing_observed_is_violation() {
        let fetch = || async {
            sleep(Duration::from_secs(300)).await;
            Ok::<_, FetchError>(Some(TypedValue::Bool(true)))
        };
        let err = evaluate(
            fetch,
            &predicate("be true"),
            &PollSpec::consistently(ms(50)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        let ConditionError::ConsistencyViolation { outcome } = err else {
            panic!("expected violation, got {err:?}");
        };
        assert_eq!(outcome.elapsed, ms(50));
        assert_eq!(outcome.last_error, Some(PollFailure::Pending));
    }

    #[test]
    fn test_poll_spec_builders() {
        let spec = PollSpec::eventually(Duration::from_secs(5))
            .interval(ms(250))
            .negate(true);
        assert_eq!(spec.discipline, Discipline::Eventually);
        assert_eq!(spec.interval, ms(250));
        assert!(spec.negate);

        let spec = PollSpec::consistently(Duration::from_secs(2));
        assert_eq!(spec.discipline, Discipline::Consistently);
        assert_eq!(spec.interval, DEFAULT_INTERVAL);
        assert!(!spec.negate);
    }

    #[test]
    fn test_condition_error_display() {
        let outcome = Box::new(AssertionOutcome {
            satisfied: false,
            last_value: Some(TypedValue::from("Pending")),
            last_error: Some(PollFailure::Missing),
            elapsed: ms(100),
            polls: 11,
        });
        let err = ConditionError::Timeout {
            timeout: ms(100),
            outcome,
        };
        let text = err.to_string();
        assert!(text.contains("condition not met within 100ms"));
        assert!(text.contains("Polls: 11"));
        assert!(text.contains("\"Pending\""));
    }
}
