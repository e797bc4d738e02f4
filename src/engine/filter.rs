//! Row predicate applied after the input has been materialized

use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::EngineResult;
use super::primitive::{Primitive, PrimitiveDescription};
use crate::evalengine::{Expr, ExprEnv};
use crate::sqltypes::{BindVars, ResultSet};

/// Keeps the input rows for which `predicate` is neither NULL nor zero.
#[derive(Debug)]
pub struct Filter {
    pub input: Box<dyn Primitive>,
    pub predicate: Expr,
    pub truncate_column_count: usize,
}

impl Filter {
    pub fn new(input: Box<dyn Primitive>, predicate: Expr) -> Self {
        Self {
            input,
            predicate,
            truncate_column_count: 0,
        }
    }

    pub fn with_truncate(mut self, count: usize) -> Self {
        self.truncate_column_count = count;
        self
    }
}

impl Primitive for Filter {
    fn operator_type(&self) -> &'static str {
        "Filter"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        let result = self.input.execute(ctx, cursor, bind_vars, want_fields)?;

        let mut kept = Vec::with_capacity(result.rows.len());
        for row in result.rows {
            let value = self
                .predicate
                .evaluate_value(ExprEnv::with_row(bind_vars, &row))?;
            if value.is_truthy() {
                kept.push(row);
            }
        }
        Ok(ResultSet::new(result.fields, kept).truncate(self.truncate_column_count))
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
        let mut desc = PrimitiveDescription::new(self.operator_type(), "").with("Predicate", &self.predicate);
        if self.truncate_column_count > 0 {
            desc = desc.with("ResultColumns", self.truncate_column_count);
        }
        desc
    }
}
