//! Per-row expression evaluation

use serde::{Deserialize, Serialize};

use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::EngineResult;
use super::primitive::{Primitive, PrimitiveDescription};
use crate::evalengine::{Expr, ExprEnv};
use crate::sqltypes::{BindVars, Field, ResultSet, Row};

/// One output column of a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionColumn {
    pub name: String,
    pub expr: Expr,
}

impl ProjectionColumn {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// Replaces every input row with the values of `columns`.
///
/// Output types are inferred from the input fields without looking at rows,
/// so `get_fields` and `execute` agree even on empty inputs.
#[derive(Debug)]
pub struct Projection {
    pub input: Box<dyn Primitive>,
    pub columns: Vec<ProjectionColumn>,
}

impl Projection {
    pub fn new(input: Box<dyn Primitive>, columns: Vec<ProjectionColumn>) -> Self {
        Self { input, columns }
    }

    fn fields(&self, input_fields: &[Field], bind_vars: &BindVars) -> Vec<Field> {
        self.columns
            .iter()
            .map(|c| Field::new(c.name.as_str(), c.expr.result_type(input_fields, bind_vars)))
            .collect()
    }
}

impl Primitive for Projection {
    fn operator_type(&self) -> &'static str {
        "Projection"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        // Input fields are needed for type inference whenever fields are wanted
        let result = self.input.execute(ctx, cursor, bind_vars, want_fields)?;

        let rows = result
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c.expr.evaluate_value(ExprEnv::with_row(bind_vars, row)))
                    .collect::<EngineResult<Row>>()
            })
            .collect::<EngineResult<Vec<Row>>>()?;

        let fields = if want_fields {
            self.fields(&result.fields, bind_vars)
        } else {
            Vec::new()
        };
        Ok(ResultSet::new(fields, rows))
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        let input = self.input.get_fields(ctx, cursor, bind_vars)?;
        Ok(ResultSet::fields_only(self.fields(&input.fields, bind_vars)))
    }

    fn needs_transaction(&self) -> bool {
        self.input.needs_transaction()
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        vec![self.input.as_ref()]
    }

    fn description(&self) -> PrimitiveDescription {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        PrimitiveDescription::new(self.operator_type(), "").with("Columns", names)
    }
}
