//! Assertion phrase grammar
//!
//! Compiles the tail of a step such as `should equal Running` into a
//! [`Predicate`]. Patterns are tried in table order and the first match
//! wins. The order is part of the grammar: several phrases share a leading
//! keyword (`be true`, `be an element of`, `be >= 3`).
//!
//! | # | Phrase | Comparator |
//! |---|--------|------------|
//! | 1 | `equal <literal>` | `Equal` |
//! | 2 | `be an element of <word>...` | `ElementOf` |
//! | 3 | `consist of <word>...` | `ConsistOf` |
//! | 4 | `[be ]<op> <number>` with op in `= == != < <= > >= ~` | `NumericCompare` |
//! | 5 | `be true` / `be false` | `BoolIs` |
//! | 6 | `contain <literal>` | `Contains` |
//! | 7 | `have prefix <text>` | `HasPrefix` |
//! | 8 | `have suffix <text>` | `HasSuffix` |
//! | 9 | `match regex <pattern>` | `MatchesRegex` |
//! | 10 | `have length <n>` | `HasLength` |
//!
//! # Example
//!
//! ```
//! use kubebdd::grammar::{ComparatorKind, Grammar, NumericOp};
//!
//! let grammar = Grammar::new();
//! let predicate = grammar.compile(">= 5").unwrap();
//! assert_eq!(predicate.kind, ComparatorKind::NumericCompare(NumericOp::Ge));
//! ```

use crate::value::{coerce, coerce_words, CoercionError, TypedValue};
use regex::{Captures, Regex};
use std::fmt;

/// Phrase could not be compiled into a predicate
#[derive(Debug, Clone, thiserror::Error)]
pub enum GrammarError {
    #[error("unrecognised assertion: '{0}'")]
    Unrecognised(String),

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("invalid operand '{operand}' in '{phrase}'")]
    InvalidOperand { phrase: String, operand: String },
}

/// Everything that can go wrong while compiling a phrase
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

/// Numeric comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Within `APPROX_TOLERANCE`
    Approx,
}

impl NumericOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" | "==" => Some(Self::Eq),
            "!=" => Some(Self::NotEq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "~" => Some(Self::Approx),
            _ => None,
        }
    }

    /// Operator symbol
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Approx => "~",
        }
    }
}

/// Which comparison a predicate performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparatorKind {
    Equal,
    ElementOf,
    ConsistOf,
    NumericCompare(NumericOp),
    BoolIs,
    Contains,
    HasPrefix,
    HasSuffix,
    MatchesRegex,
    HasLength,
}

impl fmt::Display for ComparatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "equal"),
            Self::ElementOf => write!(f, "be an element of"),
            Self::ConsistOf => write!(f, "consist of"),
            Self::NumericCompare(op) => write!(f, "be {}", op.symbol()),
            Self::BoolIs => write!(f, "be"),
            Self::Contains => write!(f, "contain"),
            Self::HasPrefix => write!(f, "have prefix"),
            Self::HasSuffix => write!(f, "have suffix"),
            Self::MatchesRegex => write!(f, "match regex"),
            Self::HasLength => write!(f, "have length"),
        }
    }
}

/// A compiled comparison
///
/// Equality is structural over kind, operands and polarity. The compiled
/// regex of a `MatchesRegex` predicate and the literal text of a `Contains`
/// predicate are derived from the phrase and not compared separately.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub kind: ComparatorKind,
    pub operands: Vec<TypedValue>,
    pub negate: bool,
    pub(crate) regex: Option<Regex>,
    /// Operand as written, for substring tests
    pub(crate) literal: Option<String>,
}

impl Predicate {
    fn new(kind: ComparatorKind, operands: Vec<TypedValue>) -> Self {
        Self {
            kind,
            operands,
            negate: false,
            regex: None,
            literal: None,
        }
    }

    /// Return the same predicate with inverted polarity
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.operands == other.operands && self.negate == other.negate
    }
}

type Builder = fn(&str, &Captures<'_>) -> Result<Predicate, CompileError>;

/// Ordered source table: name, regex, builder
const PATTERNS: &[(&str, &str, Builder)] = &[
    ("equal", r"^equal (.*)$", build_equal),
    ("element-of", r"^be an element of (.+)$", build_element_of),
    ("consist-of", r"^consist of (.+)$", build_consist_of),
    (
        "numeric",
        r"^(?:be )?(==|!=|<=|>=|=|<|>|~) (-?\d+(?:\.\d+)?)$",
        build_numeric,
    ),
    ("bool", r"^be (true|false)$", build_bool),
    ("contain", r"^contain (.+)$", build_contain),
    ("prefix", r"^have prefix (.+)$", build_prefix),
    ("suffix", r"^have suffix (.+)$", build_suffix),
    ("regex", r"^match regex (.+)$", build_regex),
    ("length", r"^have length (\d+)$", build_length),
];

fn capture<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map_or("", |m| m.as_str())
}

fn build_equal(_: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    Ok(Predicate::new(
        ComparatorKind::Equal,
        vec![coerce(capture(caps, 1))?],
    ))
}

fn build_element_of(_: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    Ok(Predicate::new(
        ComparatorKind::ElementOf,
        coerce_words(capture(caps, 1))?,
    ))
}

fn build_consist_of(_: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    Ok(Predicate::new(
        ComparatorKind::ConsistOf,
        coerce_words(capture(caps, 1))?,
    ))
}

fn build_numeric(phrase: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    let op_text = capture(caps, 1);
    let op = NumericOp::parse(op_text).ok_or_else(|| GrammarError::InvalidOperand {
        phrase: phrase.to_string(),
        operand: op_text.to_string(),
    })?;
    let operand = capture(caps, 2);
    let value: f64 = operand.parse().map_err(|_| GrammarError::InvalidOperand {
        phrase: phrase.to_string(),
        operand: operand.to_string(),
    })?;
    Ok(Predicate::new(
        ComparatorKind::NumericCompare(op),
        vec![TypedValue::Number(value)],
    ))
}

fn build_bool(_: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    Ok(Predicate::new(
        ComparatorKind::BoolIs,
        vec![TypedValue::Bool(capture(caps, 1) == "true")],
    ))
}

fn build_contain(_: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    let literal = capture(caps, 1);
    let mut predicate = Predicate::new(ComparatorKind::Contains, vec![coerce(literal)?]);
    predicate.literal = Some(literal.to_string());
    Ok(predicate)
}

fn build_prefix(_: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    Ok(Predicate::new(
        ComparatorKind::HasPrefix,
        vec![TypedValue::from(capture(caps, 1))],
    ))
}

fn build_suffix(_: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    Ok(Predicate::new(
        ComparatorKind::HasSuffix,
        vec![TypedValue::from(capture(caps, 1))],
    ))
}

fn build_regex(_: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    let pattern = capture(caps, 1);
    let regex = Regex::new(pattern).map_err(|e| GrammarError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let mut predicate = Predicate::new(
        ComparatorKind::MatchesRegex,
        vec![TypedValue::from(pattern)],
    );
    predicate.regex = Some(regex);
    Ok(predicate)
}

fn build_length(phrase: &str, caps: &Captures<'_>) -> Result<Predicate, CompileError> {
    let operand = capture(caps, 1);
    let length: u32 = operand.parse().map_err(|_| GrammarError::InvalidOperand {
        phrase: phrase.to_string(),
        operand: operand.to_string(),
    })?;
    Ok(Predicate::new(
        ComparatorKind::HasLength,
        vec![TypedValue::Number(f64::from(length))],
    ))
}

struct Pattern {
    name: &'static str,
    regex: Regex,
    build: Builder,
}

/// Ordered table of assertion phrase patterns
pub struct Grammar {
    patterns: Vec<Pattern>,
}

impl Grammar {
    /// Build the grammar with the standard pattern table
    ///
    /// # Panics
    ///
    /// Never in practice: the built-in patterns are fixed and valid.
    #[must_use]
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .map(|&(name, source, build)| Pattern {
                name,
                regex: Regex::new(source).expect("built-in assertion pattern must compile"),
                build,
            })
            .collect();
        Self { patterns }
    }

    /// Pattern names in precedence order
    pub fn pattern_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.patterns.iter().map(|p| p.name)
    }

    /// Compile a phrase into a predicate
    ///
    /// # Errors
    ///
    /// Returns `CompileError::Grammar` if no pattern matches or an embedded
    /// regex or number is invalid, and `CompileError::Coercion` if a
    /// literal operand is malformed.
    pub fn compile(&self, phrase: &str) -> Result<Predicate, CompileError> {
        for pattern in &self.patterns {
            if let Some(caps) = pattern.regex.captures(phrase) {
                tracing::trace!(pattern = pattern.name, phrase, "Matched assertion pattern");
                return (pattern.build)(phrase, &caps);
            }
        }
        Err(GrammarError::Unrecognised(phrase.to_string()).into())
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("patterns", &self.pattern_names().collect::<Vec<_>>())
            .finish()
    }
}
