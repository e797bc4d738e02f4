//! Offset/count windowing

use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::{EngineError, EngineResult};
use super::primitive::{Primitive, PrimitiveDescription};
use crate::evalengine::{Expr, ExprEnv};
use crate::sqltypes::{extend_bind_vars, BindVariable, BindVars, ResultSet, Value};

/// Bind variable holding `count + offset` for routes below a limit.
///
/// Shards do not know the global offset, so each is asked for enough rows
/// to cover it locally.
pub const UPPER_LIMIT_VAR: &str = "__upper_limit";

#[derive(Debug)]
pub struct Limit {
    pub input: Box<dyn Primitive>,
    /// Absent means zero
    pub count: Option<Expr>,
    /// Absent means zero
    pub offset: Option<Expr>,
}

impl Limit {
    pub fn new(input: Box<dyn Primitive>, count: Option<Expr>, offset: Option<Expr>) -> Self {
        Self {
            input,
            count,
            offset,
        }
    }

    fn fetch(expr: &Option<Expr>, bind_vars: &BindVars, what: &str) -> EngineResult<u64> {
        match expr {
            None => Ok(0),
            Some(expr) => expr.evaluate_count(ExprEnv::new(bind_vars), what),
        }
    }

    fn fetch_count_offset(&self, bind_vars: &BindVars) -> EngineResult<(u64, u64)> {
        let count = Self::fetch(&self.count, bind_vars, "limit")?;
        let offset = Self::fetch(&self.offset, bind_vars, "offset")?;
        Ok((count, offset))
    }

    fn upper_limit_vars(bind_vars: &BindVars, count: u64, offset: u64) -> EngineResult<BindVars> {
        let upper = count
            .checked_add(offset)
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| {
                EngineError::range(format!("limit {} plus offset {} is out of range", count, offset))
            })?;
        Ok(extend_bind_vars(
            bind_vars,
            [(UPPER_LIMIT_VAR.to_string(), BindVariable::single(Value::Int64(upper)))],
        ))
    }
}

impl Primitive for Limit {
    fn operator_type(&self) -> &'static str {
        "Limit"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        let (count, offset) = self.fetch_count_offset(bind_vars)?;
        let child_vars = Self::upper_limit_vars(bind_vars, count, offset)?;

        let mut result = self.input.execute(ctx, cursor, &child_vars, want_fields)?;

        let count = usize::try_from(count).unwrap_or(usize::MAX);
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = count.saturating_add(offset);
        let len = result.rows.len();

        if len >= end {
            result.rows.truncate(end);
            result.rows.drain(..offset);
            result.rows_affected = count as u64;
        } else if len >= offset {
            result.rows = result.rows.split_off(offset);
            result.rows_affected = result.rows.len() as u64;
        } else {
            result.rows.clear();
            result.rows_affected = 0;
        }
        Ok(result)
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        self.input.get_fields(ctx, cursor, bind_vars)
    }

    fn needs_transaction(&self) -> bool {
        self.input.needs_transaction()
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        vec![self.input.as_ref()]
    }

    fn description(&self) -> PrimitiveDescription {
        let mut desc = PrimitiveDescription::new(self.operator_type(), "");
        if let Some(count) = &self.count {
            desc = desc.with("Count", count);
        }
        if let Some(offset) = &self.offset {
            desc = desc.with("Offset", offset);
        }
        desc
    }
}
