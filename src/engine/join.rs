//! Nested-loop join across shards

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::{EngineError, EngineResult};
use super::primitive::{Primitive, PrimitiveDescription};
use crate::observability::{log_event_at, Event, Severity};
use crate::sqltypes::{extend_bind_vars, BindVariable, BindVars, Field, ResultSet, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOpcode {
    #[default]
    Normal,
    /// Left rows without a right match are kept with NULL right columns
    LeftJoin,
}

impl JoinOpcode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinOpcode::Normal => "Join",
            JoinOpcode::LeftJoin => "LeftJoin",
        }
    }
}

/// Executes the right side once per left row.
///
/// `vars` names the left columns that are bound into the right side's
/// query. `cols` shapes the output: `-(i+1)` is left column `i` and `j`
/// (one-based) is right column `j-1`.
#[derive(Debug)]
pub struct Join {
    pub opcode: JoinOpcode,
    pub left: Box<dyn Primitive>,
    pub right: Box<dyn Primitive>,
    pub cols: Vec<i32>,
    pub vars: BTreeMap<String, usize>,
}

enum Side {
    Left(usize),
    Right(usize),
}

fn side(col: i32) -> EngineResult<Side> {
    match col {
        c if c < 0 => Ok(Side::Left((-(c as i64) - 1) as usize)),
        c if c > 0 => Ok(Side::Right((c - 1) as usize)),
        _ => Err(EngineError::internal("join column 0 is not valid")),
    }
}

impl Join {
    pub fn new(
        opcode: JoinOpcode,
        left: Box<dyn Primitive>,
        right: Box<dyn Primitive>,
        cols: Vec<i32>,
        vars: BTreeMap<String, usize>,
    ) -> Self {
        Self {
            opcode,
            left,
            right,
            cols,
            vars,
        }
    }

    /// Join variables bound to NULL, for schema-only right calls
    fn null_join_vars(&self, bind_vars: &BindVars) -> BindVars {
        extend_bind_vars(
            bind_vars,
            self.vars
                .keys()
                .map(|name| (name.clone(), BindVariable::Single(Value::Null))),
        )
    }

    fn join_vars(&self, bind_vars: &BindVars, left_row: &[Value]) -> EngineResult<BindVars> {
        let mut extra = Vec::with_capacity(self.vars.len());
        for (name, col) in &self.vars {
            let value = left_row.get(*col).ok_or_else(|| {
                EngineError::internal(format!(
                    "join variable {} refers to missing left column {}",
                    name, col
                ))
            })?;
            extra.push((name.clone(), BindVariable::Single(value.clone())));
        }
        Ok(extend_bind_vars(bind_vars, extra))
    }

    fn join_fields(&self, left: &[Field], right: &[Field]) -> EngineResult<Vec<Field>> {
        self.cols
            .iter()
            .map(|col| {
                let (fields, idx) = match side(*col)? {
                    Side::Left(i) => (left, i),
                    Side::Right(i) => (right, i),
                };
                fields.get(idx).cloned().ok_or_else(|| {
                    EngineError::internal(format!("join column {} has no field", col))
                })
            })
            .collect()
    }

    /// Builds an output row; a missing right row yields NULL right columns
    fn join_rows(&self, left: &[Value], right: Option<&[Value]>) -> EngineResult<Row> {
        self.cols
            .iter()
            .map(|col| match side(*col)? {
                Side::Left(i) => left.get(i).cloned().ok_or_else(|| {
                    EngineError::internal(format!("join column {} out of bounds", col))
                }),
                Side::Right(i) => match right {
                    None => Ok(Value::Null),
                    Some(row) => row.get(i).cloned().ok_or_else(|| {
                        EngineError::internal(format!("join column {} out of bounds", col))
                    }),
                },
            })
            .collect()
    }
}

impl Primitive for Join {
    fn operator_type(&self) -> &'static str {
        "Join"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        let left = self.left.execute(ctx, cursor, bind_vars, want_fields)?;
        let mut result = ResultSet::default();

        if left.rows.is_empty() && want_fields {
            let right = self
                .right
                .get_fields(ctx, cursor, &self.null_join_vars(bind_vars))?;
            result.fields = self.join_fields(&left.fields, &right.fields)?;
            return Ok(result);
        }

        for left_row in &left.rows {
            let vars = self.join_vars(bind_vars, left_row)?;
            let right = self.right.execute(ctx, cursor, &vars, want_fields)?;
            if want_fields && result.fields.is_empty() {
                result.fields = self.join_fields(&left.fields, &right.fields)?;
            }
            for right_row in &right.rows {
                result.rows.push(self.join_rows(left_row, Some(right_row))?);
            }
            if self.opcode == JoinOpcode::LeftJoin && right.rows.is_empty() {
                result.rows.push(self.join_rows(left_row, None)?);
            }
            if cursor.exceeds_max_memory_rows(result.rows.len()) {
                ctx.metrics.increment_memory_limit_rejections();
                let rows = result.rows.len().to_string();
                let limit = cursor.max_memory_rows().to_string();
                let request_id = ctx.request_id_str();
                log_event_at(
                    Severity::Warn,
                    Event::JoinMemoryLimit,
                    &[
                        ("rows", rows.as_str()),
                        ("max_memory_rows", limit.as_str()),
                        ("request_id", request_id.as_str()),
                    ],
                );
                return Err(EngineError::resource_exhausted(format!(
                    "in-memory row count exceeded allowed limit of {}",
                    limit
                )));
            }
        }
        result.rows_affected = result.rows.len() as u64;
        Ok(result)
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        let left = self.left.get_fields(ctx, cursor, bind_vars)?;
        let right = self
            .right
            .get_fields(ctx, cursor, &self.null_join_vars(bind_vars))?;
        Ok(ResultSet::fields_only(self.join_fields(&left.fields, &right.fields)?))
    }

    fn needs_transaction(&self) -> bool {
        self.left.needs_transaction() || self.right.needs_transaction()
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }

    fn description(&self) -> PrimitiveDescription {
        let cols: Vec<String> = self
            .cols
            .iter()
            .map(|c| match side(*c) {
                Ok(Side::Left(i)) => format!("L:{}", i),
                Ok(Side::Right(i)) => format!("R:{}", i),
                Err(_) => "?".to_string(),
            })
            .collect();
        let mut desc = PrimitiveDescription::new(self.operator_type(), self.opcode.as_str())
            .with("JoinColumnIndexes", cols.join(","));
        if !self.vars.is_empty() {
            desc = desc.with("JoinVars", &self.vars);
        }
        desc
    }
}
