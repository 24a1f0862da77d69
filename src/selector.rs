//! Kubernetes label-selector grammar: equality, set membership, and existence.
//!
//! `kube-core::labels::Selector` only ever gets built programmatically from a
//! `LabelSelector` struct; the scanner here needs to parse a free-form
//! selector *string* handed in by a caller, so this adds a [`FromStr`] grammar
//! on top of the same expression model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

type Labels = BTreeMap<String, String>;

/// A single selector requirement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    /// `key in (v1,v2,...)`
    In(String, Vec<String>),
    /// `key notin (v1,v2,...)`
    NotIn(String, Vec<String>),
    /// `key=value` or `key==value`
    Equal(String, String),
    /// `key!=value`
    NotEqual(String, String),
    /// bare `key`
    Exists(String),
    /// `!key`
    DoesNotExist(String),
}

impl Expression {
    fn matches(&self, labels: &Labels) -> bool {
        match self {
            Expression::In(key, values) => labels.get(key).is_some_and(|v| values.contains(v)),
            Expression::NotIn(key, values) => labels.get(key).is_none_or(|v| !values.contains(v)),
            Expression::Exists(key) => labels.contains_key(key),
            Expression::DoesNotExist(key) => !labels.contains_key(key),
            Expression::Equal(key, value) => labels.get(key) == Some(value),
            Expression::NotEqual(key, value) => labels.get(key) != Some(value),
        }
    }
}

/// A parsed conjunction of [`Expression`]s, i.e. a full label selector.
///
/// Every expression must match for the selector to match (AND semantics,
/// same as the Kubernetes API server).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector(Vec<Expression>);

/// Failure to parse a label-selector string. The scanner treats this as
/// non-fatal: an unparseable selector logs a warning and does not filter.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid label selector term: {0}")]
pub struct SelectorParseError(pub String);

impl Selector {
    /// The selector that matches everything (no requirements).
    pub fn all() -> Self {
        Self(Vec::new())
    }

    /// Whether this selector has no requirements and so matches every input.
    pub fn selects_all(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate the selector's conjunction of expressions against a label map.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.0.iter().all(|expr| expr.matches(labels))
    }
}

impl FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for Selector {
    type Err = SelectorParseError;

    /// Parses the standard comma-separated selector grammar:
    /// `key=value`, `key==value`, `key!=value`, `key`, `!key`,
    /// `key in (a,b)`, `key notin (a,b)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Selector::all());
        }
        s.split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()
            .map(Selector)
    }
}

fn parse_term(term: &str) -> Result<Expression, SelectorParseError> {
    if let Some(key) = term.strip_prefix('!') {
        let key = key.trim();
        return validate_key(key, term).map(|_| Expression::DoesNotExist(key.to_string()));
    }
    if let Some((key, rest)) = term.split_once("in") {
        let key = key.trim();
        if !key.is_empty() && rest.trim_start().starts_with('(') {
            return parse_set(key, rest.trim(), false, term);
        }
    }
    if let Some(idx) = term.find("notin") {
        let (key, rest) = term.split_at(idx);
        let key = key.trim();
        let rest = &rest[5..];
        if !key.is_empty() && rest.trim_start().starts_with('(') {
            return parse_set(key, rest.trim(), true, term);
        }
    }
    if let Some((key, value)) = term.split_once("!=") {
        let key = key.trim();
        validate_key(key, term)?;
        return Ok(Expression::NotEqual(key.to_string(), value.trim().to_string()));
    }
    if let Some((key, value)) = term.split_once("==") {
        let key = key.trim();
        validate_key(key, term)?;
        return Ok(Expression::Equal(key.to_string(), value.trim().to_string()));
    }
    if let Some((key, value)) = term.split_once('=') {
        let key = key.trim();
        validate_key(key, term)?;
        return Ok(Expression::Equal(key.to_string(), value.trim().to_string()));
    }
    let key = term.trim();
    validate_key(key, term)?;
    Ok(Expression::Exists(key.to_string()))
}

fn parse_set(key: &str, rest: &str, negate: bool, term: &str) -> Result<Expression, SelectorParseError> {
    validate_key(key, term)?;
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| SelectorParseError(term.to_string()))?;
    let values: Vec<String> = inner
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(SelectorParseError(term.to_string()));
    }
    Ok(if negate {
        Expression::NotIn(key.to_string(), values)
    } else {
        Expression::In(key.to_string(), values)
    })
}

fn validate_key(key: &str, term: &str) -> Result<(), SelectorParseError> {
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(SelectorParseError(term.to_string()));
    }
    Ok(())
}
