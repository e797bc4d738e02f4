//! Aggregation without GROUP BY

use super::aggregations::{AggregateFolder, AggregateParam};
use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::EngineResult;
use super::primitive::{Primitive, PrimitiveDescription};
use crate::sqltypes::{BindVars, ResultSet};

/// Folds all input rows into exactly one output row.
///
/// Over empty input the row holds 0 for the COUNT family and NULL for
/// every other aggregate.
#[derive(Debug)]
pub struct ScalarAggregate {
    pub input: Box<dyn Primitive>,
    pub aggregates: Vec<AggregateParam>,
    pub truncate_column_count: usize,
}

impl ScalarAggregate {
    pub fn new(input: Box<dyn Primitive>, aggregates: Vec<AggregateParam>) -> Self {
        Self {
            input,
            aggregates,
            truncate_column_count: 0,
        }
    }

    pub fn with_truncate(mut self, count: usize) -> Self {
        self.truncate_column_count = count;
        self
    }
}

impl Primitive for ScalarAggregate {
    fn operator_type(&self) -> &'static str {
        "Aggregate"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        let input = self.input.execute(ctx, cursor, bind_vars, want_fields)?;
        let folder = AggregateFolder::new(&self.aggregates);
        let width = input.fields.len();

        let mut rows = input.rows.into_iter();
        let row = match rows.next() {
            None => folder.empty_row(width),
            Some(first) => {
                let mut acc = folder.seed(first)?;
                for row in rows {
                    folder.merge(&mut acc, &row)?;
                }
                acc.into_row()
            }
        };

        let fields = folder.convert_fields(input.fields);
        Ok(ResultSet::new(fields, vec![row]).truncate(self.truncate_column_count))
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        let input = self.input.get_fields(ctx, cursor, bind_vars)?;
        let fields = AggregateFolder::new(&self.aggregates).convert_fields(input.fields);
        Ok(ResultSet::fields_only(fields).truncate(self.truncate_column_count))
    }

    fn needs_transaction(&self) -> bool {
        self.input.needs_transaction()
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        vec![self.input.as_ref()]
    }

    fn description(&self) -> PrimitiveDescription {
        let aggregates: Vec<String> = self.aggregates.iter().map(|a| a.to_string()).collect();
        let mut desc = PrimitiveDescription::new(self.operator_type(), "Scalar")
            .with("Aggregates", aggregates.join(", "));
        if self.truncate_column_count > 0 {
            desc = desc.with("ResultColumns", self.truncate_column_count);
        }
        desc
    }
}
