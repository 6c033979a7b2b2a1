//! Applying compiled predicates to sampled values

use crate::grammar::{ComparatorKind, NumericOp, Predicate};
use crate::value::TypedValue;

/// Absolute tolerance for the `~` operator
pub const APPROX_TOLERANCE: f64 = 1e-8;

static NULL: TypedValue = TypedValue::Null;

/// The candidate cannot be compared by this predicate at all
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("'{comparator}' expects {expected}, got {actual} {value}")]
pub struct MatchError {
    pub comparator: String,
    pub expected: &'static str,
    pub actual: &'static str,
    pub value: String,
}

impl MatchError {
    fn new(predicate: &Predicate, expected: &'static str, candidate: &TypedValue) -> Self {
        Self {
            comparator: predicate.kind.to_string(),
            expected,
            actual: candidate.type_name(),
            value: candidate.to_string(),
        }
    }
}

impl Predicate {
    /// Test the candidate, ignoring `negate`
    ///
    /// # Errors
    ///
    /// Returns `MatchError` when the candidate's type is not supported by
    /// the comparator (e.g. a numeric compare against a string).
    pub fn matches(&self, candidate: &TypedValue) -> Result<bool, MatchError> {
        let operand = self.operands.first().unwrap_or(&NULL);
        match self.kind {
            ComparatorKind::Equal => Ok(candidate == operand),
            ComparatorKind::ElementOf => Ok(self.operands.contains(candidate)),
            ComparatorKind::ConsistOf => match candidate {
                TypedValue::Sequence(items) => Ok(consists_of(items, &self.operands)),
                _ => Err(MatchError::new(self, "a sequence", candidate)),
            },
            ComparatorKind::NumericCompare(op) => match (candidate, operand) {
                (TypedValue::Number(actual), TypedValue::Number(expected)) => {
                    Ok(compare_numbers(op, *actual, *expected))
                }
                _ => Err(MatchError::new(self, "a number", candidate)),
            },
            ComparatorKind::BoolIs => match candidate {
                TypedValue::Bool(actual) => Ok(TypedValue::Bool(*actual) == *operand),
                _ => Err(MatchError::new(self, "a bool", candidate)),
            },
            ComparatorKind::Contains => match candidate {
                TypedValue::String(s) => Ok(match &self.literal {
                    Some(literal) => s.contains(literal.as_str()),
                    None => s.contains(operand.as_text().as_str()),
                }),
                TypedValue::Sequence(items) => Ok(items.contains(operand)),
                _ => Err(MatchError::new(self, "a string or sequence", candidate)),
            },
            ComparatorKind::HasPrefix => match candidate {
                TypedValue::String(s) => Ok(s.starts_with(operand.as_text().as_str())),
                _ => Err(MatchError::new(self, "a string", candidate)),
            },
            ComparatorKind::HasSuffix => match candidate {
                TypedValue::String(s) => Ok(s.ends_with(operand.as_text().as_str())),
                _ => Err(MatchError::new(self, "a string", candidate)),
            },
            ComparatorKind::MatchesRegex => match (candidate, &self.regex) {
                (TypedValue::String(s), Some(regex)) => Ok(regex.is_match(s)),
                _ => Err(MatchError::new(self, "a string", candidate)),
            },
            ComparatorKind::HasLength => match (candidate.len(), operand) {
                #[allow(clippy::cast_precision_loss)]
                (Some(len), TypedValue::Number(expected)) => Ok(len as f64 == *expected),
                _ => Err(MatchError::new(self, "a string, sequence or mapping", candidate)),
            },
        }
    }

    /// Test the candidate, honouring `negate`
    ///
    /// # Errors
    ///
    /// See [`Predicate::matches`]. A type mismatch is an error in both
    /// polarities.
    pub fn holds(&self, candidate: &TypedValue) -> Result<bool, MatchError> {
        Ok(self.matches(candidate)? != self.negate)
    }

    /// Describe why `candidate` did not satisfy the predicate
    #[must_use]
    pub fn failure_message(&self, candidate: &TypedValue) -> String {
        let expected = match self.kind {
            ComparatorKind::ElementOf | ComparatorKind::ConsistOf => {
                TypedValue::Sequence(self.operands.clone())
            }
            _ => self
                .operands
                .first()
                .cloned()
                .unwrap_or(TypedValue::Null),
        };
        let polarity = if self.negate { "not to" } else { "to" };
        format!(
            "Expected\n    <{}>: {}\n{} {}\n    <{}>: {}",
            candidate.type_name(),
            candidate,
            polarity,
            self.kind,
            expected.type_name(),
            expected,
        )
    }
}

fn compare_numbers(op: NumericOp, actual: f64, expected: f64) -> bool {
    match op {
        NumericOp::Eq => actual == expected,
        NumericOp::NotEq => actual != expected,
        NumericOp::Lt => actual < expected,
        NumericOp::Le => actual <= expected,
        NumericOp::Gt => actual > expected,
        NumericOp::Ge => actual >= expected,
        NumericOp::Approx => (actual - expected).abs() <= APPROX_TOLERANCE,
    }
}

/// Order-insensitive multiset comparison
fn consists_of(items: &[TypedValue], expected: &[TypedValue]) -> bool {
    if items.len() != expected.len() {
        return false;
    }
    let mut used = vec![false; expected.len()];
    items.iter().all(|item| {
        let slot = expected
            .iter()
            .enumerate()
            .position(|(i, e)| !used[i] && e == item);
        match slot {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}
