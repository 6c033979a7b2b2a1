//! Evaluating natural-language assertions against live values
//!
//! [`evaluate_assertion`] is the single entry point: it compiles the phrase,
//! validates the poll spec and runs the poll loop. Compile and configuration
//! errors are returned before the first fetch; runtime failures are returned
//! once the loop has reached a verdict.
//!
//! # Example
//!
//! ```ignore
//! use kubebdd::assertions::evaluate_assertion;
//! use kubebdd::eventually::PollSpec;
//!
//! let outcome = evaluate_assertion(
//!     &grammar,
//!     "be >= 3",
//!     || async { read_ready_replicas().await },
//!     &PollSpec::eventually(Duration::from_secs(60)),
//!     &cancel,
//! )
//! .await?;
//! ```

use crate::config::ConfigError;
use crate::eventually::{evaluate, AssertionOutcome, ConditionError, FetchError, PollSpec};
use crate::grammar::{CompileError, Grammar, GrammarError};
use crate::step::StepError;
use crate::value::{CoercionError, TypedValue};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Every way an assertion can fail
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssertionError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("timed out after {timeout:?}{outcome}")]
    Timeout {
        timeout: Duration,
        outcome: Box<AssertionOutcome>,
    },

    #[error("consistency violated after {:?}{outcome}", .outcome.elapsed)]
    ConsistencyViolation { outcome: Box<AssertionOutcome> },

    #[error("cancelled after {:?}{outcome}", .outcome.elapsed)]
    Cancelled { outcome: Box<AssertionOutcome> },

    #[error("no resource called {0} was registered in a previous step")]
    UnknownReference(String),

    #[error("not an assertion step: '{0}'")]
    NotAnAssertion(String),
}

impl AssertionError {
    /// The polling outcome, for failures that happened while polling
    #[must_use]
    pub fn outcome(&self) -> Option<&AssertionOutcome> {
        match self {
            Self::Timeout { outcome, .. }
            | Self::ConsistencyViolation { outcome }
            | Self::Cancelled { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// Whether the error was raised before any poll happened
    #[must_use]
    pub fn is_compile_time(&self) -> bool {
        self.outcome().is_none()
    }
}

impl From<CompileError> for AssertionError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Grammar(e) => Self::Grammar(e),
            CompileError::Coercion(e) => Self::Coercion(e),
        }
    }
}

impl From<ConditionError> for AssertionError {
    fn from(err: ConditionError) -> Self {
        match err {
            ConditionError::Configuration(e) => Self::Configuration(e),
            ConditionError::Timeout { timeout, outcome } => Self::Timeout { timeout, outcome },
            ConditionError::ConsistencyViolation { outcome } => {
                Self::ConsistencyViolation { outcome }
            }
            ConditionError::Cancelled { outcome } => Self::Cancelled { outcome },
        }
    }
}

impl From<StepError> for AssertionError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::NotAnAssertion(text) => Self::NotAnAssertion(text),
            StepError::InvalidDuration(e) => Self::Configuration(e),
        }
    }
}

/// Compile `phrase` and evaluate it against values produced by `fetch`
///
/// # Errors
///
/// - `Grammar` / `Coercion` when the phrase does not compile (no poll runs)
/// - `Configuration` for a zero timeout or interval (no poll runs)
/// - `Timeout`, `ConsistencyViolation` or `Cancelled` from the poll loop
pub async fn evaluate_assertion<F, Fut>(
    grammar: &Grammar,
    phrase: &str,
    fetch: F,
    spec: &PollSpec,
    cancel: &CancellationToken,
) -> Result<AssertionOutcome, AssertionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<TypedValue>, FetchError>>,
{
    let predicate = grammar.compile(phrase)?;
    tracing::debug!(
        phrase,
        kind = ?predicate.kind,
        discipline = %spec.discipline,
        negate = spec.negate,
        timeout = ?spec.timeout,
        "Evaluating assertion"
    );
    Ok(evaluate(fetch, &predicate, spec, cancel).await?)
}
