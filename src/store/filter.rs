//! Predicate language for document scans.
//!
//! The minimum operator set the repositories need: field equality, `lte`
//! ("due by now"), `gt` ("not yet expired"), and logical AND. Fields are
//! addressed by dotted path (`telegram.connectionCode`).

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A predicate over a JSON document.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Field equals value.
    Eq(String, Value),
    /// Field is less than or equal to value.
    Lte(String, Value),
    /// Field is strictly greater than value.
    Gt(String, Value),
    /// All sub-filters match.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(path.into(), value.into())
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(path.into(), value.into())
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(path.into(), value.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    /// Evaluate this filter against a document.
    ///
    /// A missing or null field never matches an ordered comparison, and
    /// matches `Eq` only when the queried value is itself null.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::Eq(path, expected) => {
                let actual = lookup(doc, path).unwrap_or(&Value::Null);
                actual == expected
            }
            Self::Lte(path, bound) => match lookup(doc, path) {
                Some(actual) => matches!(
                    compare(actual, bound),
                    Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
                ),
                None => false,
            },
            Self::Gt(path, bound) => match lookup(doc, path) {
                Some(actual) => matches!(compare(actual, bound), Some(std::cmp::Ordering::Greater)),
                None => false,
            },
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

/// Resolve a dotted path inside a document. Null leaves resolve to `None` so
/// ordered comparisons against unset fields never match.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}

/// Ordered comparison over the value kinds the store holds.
///
/// Timestamps are stored as RFC3339 strings; parse both sides when possible
/// so sub-second precision differences compare chronologically rather than
/// lexicographically.
fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (parse_instant(x), parse_instant(y)) {
                (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
