//! Materialized result sets

use serde::{Deserialize, Serialize};

use super::types::Field;
use super::value::Row;

/// Fields plus rows produced by a primitive.
///
/// Empty `rows` with populated `fields` means "schema known, no data".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub rows_affected: u64,
}

impl ResultSet {
    pub fn new(fields: Vec<Field>, rows: Vec<Row>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            fields,
            rows,
            rows_affected,
        }
    }

    /// Creates a schema-only result
    pub fn fields_only(fields: Vec<Field>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
            rows_affected: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Drops trailing columns beyond `count` from fields and rows.
    ///
    /// A `count` of zero leaves the result untouched.
    pub fn truncate(mut self, count: usize) -> Self {
        if count == 0 {
            return self;
        }
        if self.fields.len() > count {
            self.fields.truncate(count);
        }
        for row in &mut self.rows {
            if row.len() > count {
                row.truncate(count);
            }
        }
        self
    }

    /// Appends another result's rows, summing rows affected
    pub fn append(&mut self, other: ResultSet) {
        if self.fields.is_empty() {
            self.fields = other.fields;
        }
        self.rows.extend(other.rows);
        self.rows_affected += other.rows_affected;
    }
}
