//! Parsing assertion step text
//!
//! Recognised forms:
//!
//! - `foo's '.status.phase' should equal Running`
//! - `within 30s, foo's '.status.phase' should equal Running`
//!   (also `in less than`, `in under`, `in no more than`, `at least`, or a
//!   bare duration)
//! - `for at least 10s, foo's '.status.phase' should not equal Failed`
//!   (also `for no less than`)
//!
//! Everything after `should [not] ` is handed to the grammar unchanged.

use crate::config::{parse_duration, ConfigError};
use crate::eventually::Discipline;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Step text is not an assertion this crate understands
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("not an assertion step: '{0}'")]
    NotAnAssertion(String),

    #[error(transparent)]
    InvalidDuration(#[from] ConfigError),
}

/// A parsed assertion step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionStep {
    pub discipline: Discipline,
    /// `None` when the step does not state a duration
    pub timeout: Option<Duration>,
    /// Logical resource name from the registry: lowercase alphanumerics and
    /// `-`, at least two characters, not starting or ending with `-`
    pub reference: String,
    pub path: String,
    pub negate: bool,
    /// The comparison phrase, e.g. `equal Running`
    pub phrase: String,
}

const REFERENCE: &str = r"([a-z0-9][-a-z0-9]*[a-z0-9])";
const DURATION: &str = r"((?:\d+[a-zµ]{1,3})+)";
const TARGET_AND_PHRASE: &str = r"'s '([^']*)' should (not )?(.+)$";

fn consistently_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let source =
            format!(r"^(?:for at least|for no less than) {DURATION},? {REFERENCE}{TARGET_AND_PHRASE}");
        Regex::new(&source).expect("consistently step pattern must compile")
    })
}

fn eventually_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let source = format!(
            r"^(?:(?:in less than |in under |in no more than |at least |within )?{DURATION},? ?)?{REFERENCE}{TARGET_AND_PHRASE}"
        );
        Regex::new(&source).expect("eventually step pattern must compile")
    })
}

impl AssertionStep {
    /// Parse a step's text
    ///
    /// # Errors
    ///
    /// Returns `StepError::NotAnAssertion` when the text matches no form and
    /// `StepError::InvalidDuration` when the stated duration is malformed.
    pub fn parse(text: &str) -> Result<Self, StepError> {
        let text = text.trim();
        let (discipline, caps) = if let Some(caps) = consistently_pattern().captures(text) {
            (Discipline::Consistently, caps)
        } else if let Some(caps) = eventually_pattern().captures(text) {
            (Discipline::Eventually, caps)
        } else {
            return Err(StepError::NotAnAssertion(text.to_string()));
        };

        let timeout = caps
            .get(1)
            .map(|m| parse_duration(m.as_str()))
            .transpose()?;

        Ok(Self {
            discipline,
            timeout,
            reference: caps[2].to_string(),
            path: caps[3].to_string(),
            negate: caps.get(4).is_some(),
            phrase: caps[5].to_string(),
        })
    }
}
