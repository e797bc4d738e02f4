//! In-memory sort

use super::comparer::{describe_order_by, OrderByParam, RowComparator};
use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::EngineResult;
use super::primitive::{Primitive, PrimitiveDescription};
use crate::evalengine::{Expr, ExprEnv};
use crate::sqltypes::{BindVars, ResultSet};

/// Materializes the input and sorts it globally.
///
/// Used when the rows cross a non-route operator and can no longer be
/// ordered by the shards.
#[derive(Debug)]
pub struct MemorySort {
    pub input: Box<dyn Primitive>,
    pub order_by: Vec<OrderByParam>,
    /// Pushed-down limit hint evaluated against the bind variables
    pub upper_limit: Option<Expr>,
    pub truncate_column_count: usize,
}

impl MemorySort {
    pub fn new(input: Box<dyn Primitive>, order_by: Vec<OrderByParam>) -> Self {
        Self {
            input,
            order_by,
            upper_limit: None,
            truncate_column_count: 0,
        }
    }

    pub fn with_upper_limit(mut self, limit: Expr) -> Self {
        self.upper_limit = Some(limit);
        self
    }

    pub fn with_truncate(mut self, count: usize) -> Self {
        self.truncate_column_count = count;
        self
    }

    fn fetch_count(&self, bind_vars: &BindVars) -> EngineResult<Option<usize>> {
        match &self.upper_limit {
            None => Ok(None),
            Some(expr) => {
                let count = expr.evaluate_count(ExprEnv::new(bind_vars), "upper limit")?;
                Ok(Some(usize::try_from(count).unwrap_or(usize::MAX)))
            }
        }
    }
}

impl Primitive for MemorySort {
    fn operator_type(&self) -> &'static str {
        "Sort"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        // Evaluate the limit first so a bad value fails before any shard work
        let count = self.fetch_count(bind_vars)?;

        let mut result = self.input.execute(ctx, cursor, bind_vars, want_fields)?;
        RowComparator::new(&self.order_by).sort(&mut result.rows)?;

        if let Some(count) = count {
            if result.rows.len() > count {
                result.rows.truncate(count);
                result.rows_affected = count as u64;
            }
        }
        Ok(result.truncate(self.truncate_column_count))
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        let result = self.input.get_fields(ctx, cursor, bind_vars)?;
        Ok(result.truncate(self.truncate_column_count))
    }

    fn needs_transaction(&self) -> bool {
        self.input.needs_transaction()
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        vec![self.input.as_ref()]
    }

    fn description(&self) -> PrimitiveDescription {
        let mut desc = PrimitiveDescription::new(self.operator_type(), "Memory")
            .with("OrderBy", describe_order_by(&self.order_by));
        if let Some(limit) = &self.upper_limit {
            desc = desc.with("UpperLimit", limit);
        }
        if self.truncate_column_count > 0 {
            desc = desc.with("ResultColumns", self.truncate_column_count);
        }
        desc
    }
}
