//! Multi-key row ordering

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{EngineError, EngineResult};
use crate::sqltypes::{nullsafe_compare, Collation, Row, Value};

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByParam {
    pub column: usize,
    /// Precomputed weight string compared instead of `column` when set
    #[serde(default)]
    pub weight_string_column: Option<usize>,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub collation: Collation,
}

impl OrderByParam {
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            weight_string_column: None,
            descending: false,
            collation: Collation::Binary,
        }
    }

    pub fn desc(column: usize) -> Self {
        Self {
            descending: true,
            ..Self::asc(column)
        }
    }

    pub fn with_weight_string(mut self, column: usize) -> Self {
        self.weight_string_column = Some(column);
        self
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    /// Column actually compared
    fn compare_column(&self) -> usize {
        self.weight_string_column.unwrap_or(self.column)
    }
}

impl fmt::Display for OrderByParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.weight_string_column {
            Some(ws) => write!(f, "({}|{})", self.column, ws)?,
            None => write!(f, "{}", self.column)?,
        }
        write!(f, " {}", if self.descending { "DESC" } else { "ASC" })?;
        if self.collation != Collation::Binary {
            write!(f, " COLLATE {}", self.collation)?;
        }
        Ok(())
    }
}

/// Lexicographic row comparator built from ORDER BY keys
#[derive(Debug, Clone)]
pub struct RowComparator<'a> {
    order_by: &'a [OrderByParam],
}

impl<'a> RowComparator<'a> {
    pub fn new(order_by: &'a [OrderByParam]) -> Self {
        Self { order_by }
    }

    /// Compares two rows, stopping at the first differing key
    pub fn compare(&self, a: &[Value], b: &[Value]) -> EngineResult<Ordering> {
        for param in self.order_by {
            let col = param.compare_column();
            let (x, y) = match (a.get(col), b.get(col)) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    return Err(EngineError::internal(format!(
                        "order by column {} out of bounds",
                        col
                    )))
                }
            };
            let mut ord = nullsafe_compare(x, y, param.collation)
                .map_err(|e| EngineError::from(e).wrap(format!("ordering by column {}", col)))?;
            if param.descending {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }

    /// Stable in-place sort.
    ///
    /// The first comparison error is latched: every later comparison reports
    /// equal so the sort finishes, and the error is returned.
    pub fn sort(&self, rows: &mut [Row]) -> EngineResult<()> {
        let latched: RefCell<Option<EngineError>> = RefCell::new(None);
        rows.sort_by(|a, b| {
            if latched.borrow().is_some() {
                return Ordering::Equal;
            }
            match self.compare(a, b) {
                Ok(ord) => ord,
                Err(err) => {
                    *latched.borrow_mut() = Some(err);
                    Ordering::Equal
                }
            }
        });
        match latched.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Renders ORDER BY keys for EXPLAIN
pub fn describe_order_by(order_by: &[OrderByParam]) -> String {
    order_by
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
