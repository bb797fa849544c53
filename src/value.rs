//! Scalar dimension/data values
//!
//! Dimension values and data-field values share one scalar type:
//! strings, booleans, integers, floats, or instants. Nested collections are
//! never valid here; callers serialize complex data themselves before
//! storing it under the `_data.` namespace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar value stored against a dimension key or a `_data.` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Instant(DateTime<Utc>),
}

impl Value {
    /// Whether this value is the "zero value" for its variant; the
    /// create/update marshalling asymmetry hinges on this.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::Bool(b) => !*b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Instant(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render as the canonical string form used in SimpleID-adjacent
    /// comparisons and error messages.
    pub fn display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Instant(t) => t.to_rfc3339(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Instant(t)
    }
}

/// Partial ordering used by `<`/`<=`/`>`/`>=` filters and ordering clauses.
/// Values of different variants are incomparable (returns `None`). Mixed
/// int/float comparisons coerce the int side to `f64` rather than rejecting
/// the pair outright.
pub fn partial_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    use Value::*;
    match (a, b) {
        (String(a), String(b)) => a.partial_cmp(b),
        (Bool(a), Bool(b)) => a.partial_cmp(b),
        (Int(a), Int(b)) => a.partial_cmp(b),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
        (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
        (Instant(a), Instant(b)) => a.partial_cmp(b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values() {
        assert!(Value::String(String::new()).is_zero());
        assert!(!Value::String("x".into()).is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(!Value::Instant(Utc::now()).is_zero());
    }

    #[test]
    fn cross_numeric_comparison() {
        assert_eq!(
            partial_cmp(&Value::Int(4), &Value::Float(4.0)),
            Some(std::cmp::Ordering::Equal)
        );
        assert_eq!(partial_cmp(&Value::String("a".into()), &Value::Int(1)), None);
    }
}
