//! Hash de-duplication

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::{EngineError, EngineResult};
use super::primitive::{Primitive, PrimitiveDescription};
use crate::sqltypes::{nullsafe_compare, nullsafe_hash, BindVars, Collation, ResultSet, Row, Value};

/// A column taking part in duplicate detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckColumn {
    pub column: usize,
    /// Used when `column` cannot be hashed or compared under `collation`
    #[serde(default)]
    pub weight_string_column: Option<usize>,
    #[serde(default)]
    pub collation: Collation,
}

impl CheckColumn {
    pub fn new(column: usize) -> Self {
        Self {
            column,
            weight_string_column: None,
            collation: Collation::Binary,
        }
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    pub fn with_weight_string(mut self, column: usize) -> Self {
        self.weight_string_column = Some(column);
        self
    }

    fn value<'r>(&self, row: &'r [Value], col: usize) -> EngineResult<&'r Value> {
        row.get(col).ok_or_else(|| {
            EngineError::internal(format!("distinct column {} out of bounds", col))
        })
    }

    fn hash(&self, row: &[Value]) -> EngineResult<u64> {
        match nullsafe_hash(self.value(row, self.column)?, self.collation) {
            Ok(h) => Ok(h),
            Err(err) => match self.weight_string_column {
                Some(ws) => Ok(nullsafe_hash(self.value(row, ws)?, Collation::Binary)?),
                None => Err(EngineError::from(err)
                    .wrap(format!("hashing distinct column {}", self.column))),
            },
        }
    }

    fn equal(&self, a: &[Value], b: &[Value]) -> EngineResult<bool> {
        let (x, y) = (self.value(a, self.column)?, self.value(b, self.column)?);
        match nullsafe_compare(x, y, self.collation) {
            Ok(ord) => Ok(ord.is_eq()),
            Err(err) => match self.weight_string_column {
                Some(ws) => {
                    let (x, y) = (self.value(a, ws)?, self.value(b, ws)?);
                    Ok(nullsafe_compare(x, y, Collation::Binary)?.is_eq())
                }
                None => Err(EngineError::from(err)),
            },
        }
    }
}

/// Rows seen so far, bucketed by the hash of their check columns.
///
/// Buckets hold every distinct row sharing a hash, so collisions are
/// resolved by full comparison.
#[derive(Debug)]
pub struct ProbeTable<'a> {
    check_cols: &'a [CheckColumn],
    seen: HashMap<u64, Vec<Row>>,
}

impl<'a> ProbeTable<'a> {
    pub fn new(check_cols: &'a [CheckColumn]) -> Self {
        Self {
            check_cols,
            seen: HashMap::new(),
        }
    }

    /// Returns true if an equal row was seen before; otherwise remembers it
    pub fn exists(&mut self, row: &Row) -> EngineResult<bool> {
        let code = self.hash_row(row)?;
        let bucket = self.seen.entry(code).or_default();
        for seen in bucket.iter() {
            if equal_rows(self.check_cols, seen, row)? {
                return Ok(true);
            }
        }
        bucket.push(row.clone());
        Ok(false)
    }

    fn hash_row(&self, row: &[Value]) -> EngineResult<u64> {
        let mut code: u64 = 17;
        for col in self.check_cols {
            code = code.wrapping_mul(31).wrapping_add(col.hash(row)?);
        }
        Ok(code)
    }
}

fn equal_rows(check_cols: &[CheckColumn], a: &[Value], b: &[Value]) -> EngineResult<bool> {
    for col in check_cols {
        if !col.equal(a, b)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Keeps the first occurrence of every row, by check columns, in input order
#[derive(Debug)]
pub struct Distinct {
    pub input: Box<dyn Primitive>,
    pub check_cols: Vec<CheckColumn>,
    pub truncate_column_count: usize,
}

impl Distinct {
    pub fn new(input: Box<dyn Primitive>, check_cols: Vec<CheckColumn>) -> Self {
        Self {
            input,
            check_cols,
            truncate_column_count: 0,
        }
    }

    pub fn with_truncate(mut self, count: usize) -> Self {
        self.truncate_column_count = count;
        self
    }
}

impl Primitive for Distinct {
    fn operator_type(&self) -> &'static str {
        "Distinct"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        let input = self.input.execute(ctx, cursor, bind_vars, want_fields)?;

        let mut probe = ProbeTable::new(&self.check_cols);
        let mut rows = Vec::with_capacity(input.rows.len());
        for row in input.rows {
            if !probe.exists(&row)? {
                rows.push(row);
            }
        }

        Ok(ResultSet::new(input.fields, rows).truncate(self.truncate_column_count))
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        Ok(self
            .input
            .get_fields(ctx, cursor, bind_vars)?
            .truncate(self.truncate_column_count))
    }

    fn needs_transaction(&self) -> bool {
        self.input.needs_transaction()
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        vec![self.input.as_ref()]
    }

    fn description(&self) -> PrimitiveDescription {
        let cols: Vec<String> = self
            .check_cols
            .iter()
            .map(|c| match c.weight_string_column {
                Some(ws) => format!("({}:{}): {}", c.column, ws, c.collation),
                None => format!("{}: {}", c.column, c.collation),
            })
            .collect();
        let mut desc = PrimitiveDescription::new(self.operator_type(), "").with("Collations", cols);
        if self.truncate_column_count > 0 {
            desc = desc.with("ResultColumns", self.truncate_column_count);
        }
        desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{make_result, FakeCursor, FakePrimitive};
    use crate::engine::EngineErrorCode;
    use crate::sqltypes::SqlType;

    fn run(distinct: &Distinct) -> EngineResult<ResultSet> {
        let cursor = FakeCursor::new(&["ks"], &["-"]);
        distinct.execute(&ExecContext::new(), &cursor, &BindVars::new(), true)
    }

    fn single_column(values: Vec<Value>, sql_type: SqlType) -> FakePrimitive {
        FakePrimitive::new(vec![make_result(
            &[("c", sql_type)],
            values.into_iter().map(|v| vec![v]).collect(),
        )])
    }

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        let input = single_column(
            vec![
                Value::Int64(0),
                Value::Int64(1),
                Value::Int64(1),
                Value::Null,
                Value::Null,
            ],
            SqlType::Int64,
        );
        let distinct = Distinct::new(input.boxed(), vec![CheckColumn::new(0)]);
        let result = run(&distinct).unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Int64(0)], vec![Value::Int64(1)], vec![Value::Null]]
        );
        assert_eq!(result.rows_affected, 3);
    }

    #[test]
    fn test_distinct_numeric_types_collapse() {
        let input = single_column(
            vec![Value::Int64(1), Value::Uint64(1), Value::Float64(1.0)],
            SqlType::Int64,
        );
        let distinct = Distinct::new(input.boxed(), vec![CheckColumn::new(0)]);
        assert_eq!(run(&distinct).unwrap().rows.len(), 1);
    }

    #[test]
    fn test_distinct_case_insensitive_collation() {
        let input = single_column(
            vec![Value::text("Abc"), Value::text("aBC"), Value::text("abd")],
            SqlType::VarChar,
        );
        let distinct = Distinct::new(
            input.boxed(),
            vec![CheckColumn::new(0).with_collation(Collation::Utf8mb4GeneralCi)],
        );
        let result = run(&distinct).unwrap();
        assert_eq!(result.rows, vec![vec![Value::text("Abc")], vec![Value::text("abd")]]);
    }

    #[test]
    fn test_unknown_collation_fails() {
        let input = single_column(vec![Value::text("a")], SqlType::VarChar);
        let distinct = Distinct::new(
            input.boxed(),
            vec![CheckColumn::new(0).with_collation(Collation::Unknown)],
        );
        assert_eq!(run(&distinct).unwrap_err().code(), EngineErrorCode::TypeMismatch);
    }

    #[test]
    fn test_weight_string_fallback_and_truncate() {
        let input = FakePrimitive::new(vec![make_result(
            &[("c", SqlType::VarChar), ("weight_string(c)", SqlType::VarBinary)],
            vec![
                vec![Value::text("a"), Value::Binary(vec![0x41])],
                vec![Value::text("A"), Value::Binary(vec![0x41])],
                vec![Value::text("b"), Value::Binary(vec![0x42])],
            ],
        )]);
        let distinct = Distinct::new(
            input.boxed(),
            vec![CheckColumn::new(0)
                .with_collation(Collation::Unknown)
                .with_weight_string(1)],
        )
        .with_truncate(1);

        let result = run(&distinct).unwrap();
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.rows, vec![vec![Value::text("a")], vec![Value::text("b")]]);
    }

    #[test]
    fn test_probe_table_multiple_columns() {
        let cols = vec![CheckColumn::new(0), CheckColumn::new(1)];
        let mut probe = ProbeTable::new(&cols);
        assert!(!probe.exists(&vec![Value::Int64(1), Value::text("a")]).unwrap());
        assert!(!probe.exists(&vec![Value::Int64(1), Value::text("b")]).unwrap());
        assert!(probe.exists(&vec![Value::Int64(1), Value::text("a")]).unwrap());
        assert!(!probe.exists(&vec![Value::Null, Value::text("a")]).unwrap());
        assert!(probe.exists(&vec![Value::Null, Value::text("a")]).unwrap());
    }
}
