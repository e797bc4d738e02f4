//! Typed values, rows and bind variables

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::SqlType;

/// A single typed SQL value
///
/// Serialized untagged so that plan and topology files can spell values as
/// plain JSON scalars. Binary values are arrays of bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Text(String),
    Binary(Vec<u8>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int64(_) | Value::Uint64(_) | Value::Float64(_))
    }

    /// Returns the natural SQL type of this value
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Null => SqlType::Null,
            Value::Int64(_) => SqlType::Int64,
            Value::Uint64(_) => SqlType::Uint64,
            Value::Float64(_) => SqlType::Float64,
            Value::Text(_) => SqlType::VarChar,
            Value::Binary(_) => SqlType::VarBinary,
        }
    }

    /// Returns the value as a signed integer if it is integral and in range
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Uint64(v) => i64::try_from(*v).ok(),
            Value::Float64(v) if v.fract() == 0.0 && v.is_finite() => {
                if *v >= i64::MIN as f64 && *v < i64::MAX as f64 {
                    Some(*v as i64)
                } else {
                    None
                }
            }
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer if it is integral and non-negative
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int64(v) => u64::try_from(*v).ok(),
            Value::Uint64(v) => Some(*v),
            Value::Float64(v) if v.fract() == 0.0 && *v >= 0.0 && *v < u64::MAX as f64 => {
                Some(*v as u64)
            }
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the raw bytes of a text or binary value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(s) => Some(s.as_bytes()),
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Returns true if the value counts as true in a predicate
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int64(v) => *v != 0,
            Value::Uint64(v) => *v != 0,
            Value::Float64(v) => *v != 0.0,
            Value::Text(s) => s.trim().parse::<f64>().map(|v| v != 0.0).unwrap_or(false),
            Value::Binary(b) => !b.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Uint64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Binary(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// A positional row, one value per field
pub type Row = Vec<Value>;

/// A bind variable: a single value or a tuple of values (for `IN` lists)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindVariable {
    Tuple(Vec<Value>),
    Single(Value),
}

impl BindVariable {
    pub fn single(value: impl Into<Value>) -> Self {
        BindVariable::Single(value.into())
    }

    pub fn tuple(values: Vec<Value>) -> Self {
        BindVariable::Tuple(values)
    }
}

impl From<Value> for BindVariable {
    fn from(v: Value) -> Self {
        BindVariable::Single(v)
    }
}

/// Bind variables keyed by name.
///
/// Ordered so that logs and recorded queries are deterministic. Parents
/// extend a clone before passing it down; a child's map is never mutated.
pub type BindVars = BTreeMap<String, BindVariable>;

/// Returns a copy of `base` extended with `extra`
pub fn extend_bind_vars<I>(base: &BindVars, extra: I) -> BindVars
where
    I: IntoIterator<Item = (String, BindVariable)>,
{
    let mut combined = base.clone();
    combined.extend(extra);
    combined
}
