//! Typed values for assertion operands and sampled resource fields
//!
//! Literal text from a step is decoded with YAML scalar rules: unquoted
//! numbers become numbers, `true`/`false` become booleans, `null`/`~` become
//! null and everything else is a string unless written as a flow-style list
//! or map.
//!
//! # Example
//!
//! ```
//! use kubebdd::value::{coerce, TypedValue};
//!
//! assert_eq!(coerce("3").unwrap(), TypedValue::Number(3.0));
//! assert_eq!(coerce("Running").unwrap(), TypedValue::from("Running"));
//! assert_eq!(coerce("[a, 1]").unwrap().len(), Some(2));
//! ```

use std::collections::BTreeMap;
use std::fmt;

/// Error produced when a literal operand is not well-formed
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid literal '{literal}': {reason}")]
pub struct CoercionError {
    /// The literal text that failed to decode
    pub literal: String,
    /// Decoder diagnostic
    pub reason: String,
}

/// A value an assertion compares against
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<TypedValue>),
    Mapping(BTreeMap<String, TypedValue>),
}

impl TypedValue {
    /// Short type label used in failure messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    /// Number of characters, elements or entries; `None` for scalars
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(s.chars().count()),
            Self::Sequence(items) => Some(items.len()),
            Self::Mapping(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Text used for substring-style comparisons
    ///
    /// Strings are returned as-is, anything else in its JSON rendering.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Convert into a JSON value, rendering integral numbers without a fraction
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Mapping(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    // i64 range check keeps the cast lossless
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        #[allow(clippy::cast_possible_truncation)]
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for TypedValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for TypedValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<Vec<TypedValue>> for TypedValue {
    fn from(items: Vec<TypedValue>) -> Self {
        Self::Sequence(items)
    }
}

impl From<serde_json::Value> for TypedValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&serde_json::Value> for TypedValue {
    fn from(value: &serde_json::Value) -> Self {
        Self::from(value.clone())
    }
}

fn from_yaml(value: serde_yaml::Value) -> TypedValue {
    match value {
        serde_yaml::Value::Null => TypedValue::Null,
        serde_yaml::Value::Bool(b) => TypedValue::Bool(b),
        serde_yaml::Value::Number(n) => TypedValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_yaml::Value::String(s) => TypedValue::String(s),
        serde_yaml::Value::Sequence(items) => {
            TypedValue::Sequence(items.into_iter().map(from_yaml).collect())
        }
        serde_yaml::Value::Mapping(entries) => TypedValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (yaml_key(k), from_yaml(v)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => from_yaml(other).to_string(),
    }
}

/// Decode one literal token into a typed value
///
/// # Errors
///
/// Returns `CoercionError` when the literal is not a well-formed YAML
/// scalar or flow collection (e.g. an unterminated quote).
pub fn coerce(literal: &str) -> Result<TypedValue, CoercionError> {
    serde_yaml::from_str::<serde_yaml::Value>(literal)
        .map(from_yaml)
        .map_err(|e| CoercionError {
            literal: literal.to_string(),
            reason: e.to_string(),
        })
}

/// Split on Unicode whitespace and decode each word independently
///
/// Quoted multi-word strings are not kept together: `"a b"` yields two
/// words, and the first of them fails to decode.
///
/// # Errors
///
/// Returns the first `CoercionError` encountered.
pub fn coerce_words(text: &str) -> Result<Vec<TypedValue>, CoercionError> {
    text.split_whitespace().map(coerce).collect()
}
