//! Narrowing a fetched document to the value an assertion targets
//!
//! [`JsonPath`] understands the subset of Kubernetes JSONPath that shows up
//! in step text:
//!
//! - `.status.phase` or `{.status.phase}`, with an optional leading `$`
//! - `.spec.containers[0].image`, negative indices count from the end
//! - `.metadata.labels['app.kubernetes.io/name']` or
//!   `.metadata.annotations.kubernetes\.io/change-cause`
//! - `.spec.containers[*].name` or `.metadata.labels.*`
//!
//! A path containing a wildcard always yields a sequence of everything it
//! reached. A plain path yields one value, or nothing when any segment is
//! missing.

use crate::value::TypedValue;
use serde_json::Value;

/// Path expression could not be parsed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },
}

/// Capability for pulling a sub-value out of a document
pub trait Extractor: Send + Sync {
    /// Extract the value at `path`; `Ok(None)` when it does not exist
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::MalformedPath` when `path` cannot be parsed.
    fn extract(&self, document: &Value, path: &str) -> Result<Option<TypedValue>, ExtractError>;
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
}

/// Kubernetes-style JSONPath extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPath;

impl Extractor for JsonPath {
    fn extract(&self, document: &Value, path: &str) -> Result<Option<TypedValue>, ExtractError> {
        let segments = parse_path(path)?;
        let wildcard = segments.contains(&Segment::Wildcard);

        let mut current: Vec<&Value> = vec![document];
        for segment in &segments {
            current = current
                .into_iter()
                .flat_map(|node| step(node, segment))
                .collect();
        }

        if wildcard {
            return Ok(Some(TypedValue::Sequence(
                current.into_iter().map(TypedValue::from).collect(),
            )));
        }
        Ok(current.first().map(|v| TypedValue::from(*v)))
    }
}

fn step<'a>(node: &'a Value, segment: &Segment) -> Vec<&'a Value> {
    match (segment, node) {
        (Segment::Field(name), Value::Object(map)) => map.get(name).into_iter().collect(),
        (Segment::Index(i), Value::Array(items)) => {
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let idx = if *i < 0 { len + i } else { *i };
            usize::try_from(idx)
                .ok()
                .and_then(|idx| items.get(idx))
                .into_iter()
                .collect()
        }
        (Segment::Wildcard, Value::Array(items)) => items.iter().collect(),
        (Segment::Wildcard, Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    }
}

fn malformed(path: &str, reason: impl Into<String>) -> ExtractError {
    ExtractError::MalformedPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn parse_path(path: &str) -> Result<Vec<Segment>, ExtractError> {
    let mut body = path.trim();
    if let Some(inner) = body.strip_prefix('{') {
        body = inner
            .strip_suffix('}')
            .ok_or_else(|| malformed(path, "unclosed '{'"))?;
    }
    body = body.strip_prefix('$').unwrap_or(body);

    let chars: Vec<char> = body.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                if i < chars.len() && chars[i] == '*' {
                    segments.push(Segment::Wildcard);
                    i += 1;
                    continue;
                }
                let mut name = String::new();
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        i += 1;
                    }
                    name.push(chars[i]);
                    i += 1;
                }
                if name.is_empty() {
                    // A lone "." selects the document itself
                    if segments.is_empty() && i == chars.len() {
                        break;
                    }
                    return Err(malformed(path, "empty field name"));
                }
                segments.push(Segment::Field(name));
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| malformed(path, "unclosed '['"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                segments.push(parse_bracket(path, inner.trim())?);
                i = close + 1;
            }
            c => {
                return Err(malformed(
                    path,
                    format!("unexpected '{c}', segments start with '.' or '['"),
                ))
            }
        }
    }

    Ok(segments)
}

fn parse_bracket(path: &str, inner: &str) -> Result<Segment, ExtractError> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if let Some(rest) = inner.strip_prefix(quote) {
            return rest
                .strip_suffix(quote)
                .map(|key| Segment::Field(key.to_string()))
                .ok_or_else(|| malformed(path, "unterminated quoted key"));
        }
    }
    inner
        .parse::<i64>()
        .map(Segment::Index)
        .map_err(|_| malformed(path, format!("invalid index '{inner}'")))
}
