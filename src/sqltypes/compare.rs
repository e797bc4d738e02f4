//! Null-safe comparison, hashing and arithmetic
//!
//! These functions define one total order over values so that sorting,
//! de-duplication and grouping agree with each other:
//!
//! - NULL equals NULL and sorts before every non-NULL value
//! - numbers compare numerically across integer and float representations
//! - text compares under a collation, binary compares bytewise
//! - numbers never compare against text or binary
//!
//! Values that compare equal hash equal.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value::Value;

/// Collation used for text comparison and hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collation {
    /// Bytewise
    #[default]
    Binary,
    /// ASCII case-insensitive
    #[serde(rename = "utf8mb4_general_ci")]
    Utf8mb4GeneralCi,
    /// No usable collation; text cannot be compared or hashed
    Unknown,
}

impl Collation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collation::Binary => "binary",
            Collation::Utf8mb4GeneralCi => "utf8mb4_general_ci",
            Collation::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by value comparison and arithmetic
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("types are not comparable: {left} vs {right}")]
    Incomparable { left: String, right: String },

    #[error("text cannot be compared or hashed with collation '{0}'")]
    UnsupportedCollation(Collation),

    #[error("value is not numeric: {0}")]
    NotNumeric(String),

    #[error("{0} value is out of range")]
    OutOfRange(&'static str),
}

/// Compares two values with NULL treated as the smallest value
pub fn nullsafe_compare(a: &Value, b: &Value, collation: Collation) -> Result<Ordering, ValueError> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        (Value::Null, _) => Ok(Ordering::Less),
        (_, Value::Null) => Ok(Ordering::Greater),
        (Value::Text(x), Value::Text(y)) => compare_text(x, y, collation),
        (Value::Text(_) | Value::Binary(_), Value::Text(_) | Value::Binary(_)) => {
            let (x, y) = (a.as_bytes().unwrap_or(&[]), b.as_bytes().unwrap_or(&[]));
            Ok(x.cmp(y))
        }
        (x, y) if x.is_numeric() && y.is_numeric() => Ok(compare_numeric(x, y)),
        _ => Err(ValueError::Incomparable {
            left: a.sql_type().to_string(),
            right: b.sql_type().to_string(),
        }),
    }
}

/// Returns true if both values are equal under null-safe comparison
pub fn nullsafe_equal(a: &Value, b: &Value, collation: Collation) -> Result<bool, ValueError> {
    Ok(nullsafe_compare(a, b, collation)? == Ordering::Equal)
}

fn compare_text(x: &str, y: &str, collation: Collation) -> Result<Ordering, ValueError> {
    match collation {
        Collation::Binary => Ok(x.as_bytes().cmp(y.as_bytes())),
        Collation::Utf8mb4GeneralCi => {
            let lx = x.bytes().map(|c| c.to_ascii_lowercase());
            let ly = y.bytes().map(|c| c.to_ascii_lowercase());
            Ok(lx.cmp(ly))
        }
        Collation::Unknown => Err(ValueError::UnsupportedCollation(collation)),
    }
}

/// Exact numeric order.
///
/// Integers and floats compare by mathematical value, `-0.0` equals zero and
/// NaN sorts after every other number.
fn compare_numeric(a: &Value, b: &Value) -> Ordering {
    match (exact_int(a), exact_int(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(x), None) => compare_int_float(x, as_f64(b)),
        (None, Some(y)) => compare_int_float(y, as_f64(a)).reverse(),
        (None, None) => compare_floats(as_f64(a), as_f64(b)),
    }
}

/// 2^63 and 2^64, the bounds of the combined i64/u64 range
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

fn exact_int(v: &Value) -> Option<i128> {
    match v {
        Value::Int64(x) => Some(i128::from(*x)),
        Value::Uint64(x) => Some(i128::from(*x)),
        _ => None,
    }
}

fn compare_int_float(i: i128, f: f64) -> Ordering {
    if f.is_nan() || f >= TWO_POW_64 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    // |f| < 2^64 here, so its integral part converts exactly
    let whole = f.trunc();
    match i.cmp(&(whole as i128)) {
        Ordering::Equal => {
            let frac = f - whole;
            if frac > 0.0 {
                Ordering::Less
            } else if frac < 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        ord => ord,
    }
}

fn compare_floats(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        // Neither is NaN, and partial_cmp treats -0.0 as 0.0
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int64(x) => *x as f64,
        Value::Uint64(x) => *x as f64,
        Value::Float64(x) => *x,
        _ => 0.0,
    }
}

/// Computes a 64-bit hash consistent with [`nullsafe_compare`]
pub fn nullsafe_hash(v: &Value, collation: Collation) -> Result<u64, ValueError> {
    let mut hasher = DefaultHasher::new();
    match v {
        Value::Null => 0u8.hash(&mut hasher),
        Value::Int64(_) | Value::Uint64(_) | Value::Float64(_) => match integral_value(v) {
            Some(i) => {
                1u8.hash(&mut hasher);
                i.hash(&mut hasher);
            }
            None => {
                let f = as_f64(v);
                let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
                3u8.hash(&mut hasher);
                bits.hash(&mut hasher);
            }
        },
        Value::Text(_) | Value::Binary(_) => {
            if matches!(v, Value::Text(_)) && collation == Collation::Unknown {
                return Err(ValueError::UnsupportedCollation(collation));
            }
            4u8.hash(&mut hasher);
            let bytes = v.as_bytes().unwrap_or(&[]);
            match collation {
                Collation::Utf8mb4GeneralCi => {
                    for b in bytes {
                        b.to_ascii_lowercase().hash(&mut hasher);
                    }
                }
                _ => {
                    for b in bytes {
                        b.hash(&mut hasher);
                    }
                }
            }
        }
    }
    Ok(hasher.finish())
}

/// The exact integer a number equals, if it equals one in the i64/u64 range.
///
/// `-0.0` maps to 0. Floats outside the range never equal an integer.
fn integral_value(v: &Value) -> Option<i128> {
    match v {
        Value::Float64(f) => {
            if f.fract() == 0.0 && *f >= -TWO_POW_63 && *f < TWO_POW_64 {
                Some(*f as i128)
            } else {
                None
            }
        }
        other => exact_int(other),
    }
}

/// Adds two values, treating NULL as absent.
///
/// NULL + NULL is NULL. Integer overflow is an error.
pub fn nullsafe_add(a: &Value, b: &Value) -> Result<Value, ValueError> {
    let (x, y) = match (a, b) {
        (Value::Null, Value::Null) => return Ok(Value::Null),
        (Value::Null, v) | (v, Value::Null) => return to_number(v),
        (x, y) => (to_number(x)?, to_number(y)?),
    };
    match (&x, &y) {
        (Value::Int64(p), Value::Int64(q)) => p
            .checked_add(*q)
            .map(Value::Int64)
            .ok_or(ValueError::OutOfRange("BIGINT")),
        (Value::Uint64(p), Value::Uint64(q)) => p
            .checked_add(*q)
            .map(Value::Uint64)
            .ok_or(ValueError::OutOfRange("BIGINT UNSIGNED")),
        (Value::Int64(i), Value::Uint64(u)) | (Value::Uint64(u), Value::Int64(i)) => {
            let sum = *i as i128 + *u as i128;
            if let Ok(v) = u64::try_from(sum) {
                Ok(Value::Uint64(v))
            } else if let Ok(v) = i64::try_from(sum) {
                Ok(Value::Int64(v))
            } else {
                Err(ValueError::OutOfRange("BIGINT"))
            }
        }
        _ => Ok(Value::Float64(as_f64(&x) + as_f64(&y))),
    }
}

fn to_number(v: &Value) -> Result<Value, ValueError> {
    match v {
        Value::Int64(_) | Value::Uint64(_) | Value::Float64(_) => Ok(v.clone()),
        Value::Text(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Ok(Value::Int64(i))
            } else if let Ok(f) = s.parse::<f64>() {
                Ok(Value::Float64(f))
            } else {
                Err(ValueError::NotNumeric(s.to_string()))
            }
        }
        other => Err(ValueError::NotNumeric(other.to_string())),
    }
}

/// Returns the smaller value, ignoring NULL unless both are NULL
pub fn min(a: &Value, b: &Value, collation: Collation) -> Result<Value, ValueError> {
    extremum(a, b, collation, Ordering::Less)
}

/// Returns the larger value, ignoring NULL unless both are NULL
pub fn max(a: &Value, b: &Value, collation: Collation) -> Result<Value, ValueError> {
    extremum(a, b, collation, Ordering::Greater)
}

fn extremum(a: &Value, b: &Value, collation: Collation, keep: Ordering) -> Result<Value, ValueError> {
    match (a, b) {
        (Value::Null, v) | (v, Value::Null) => Ok(v.clone()),
        _ => {
            if nullsafe_compare(b, a, collation)? == keep {
                Ok(b.clone())
            } else {
                Ok(a.clone())
            }
        }
    }
}
