//! Streaming GROUP BY over input sorted by the grouping keys

use std::fmt;

use serde::{Deserialize, Serialize};

use super::aggregations::{Accumulator, AggregateFolder, AggregateParam};
use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::{EngineError, EngineResult};
use super::primitive::{Primitive, PrimitiveDescription};
use crate::sqltypes::{nullsafe_compare, BindVars, Collation, ResultSet, Value};

/// One grouping column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupByKey {
    pub key_column: usize,
    /// Compared instead when `key_column` is not comparable
    #[serde(default)]
    pub weight_string_column: Option<usize>,
    #[serde(default)]
    pub collation: Collation,
}

impl GroupByKey {
    pub fn new(key_column: usize) -> Self {
        Self {
            key_column,
            weight_string_column: None,
            collation: Collation::Binary,
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

    /// Two NULL keys belong to the same group
    fn same_group(&self, a: &[Value], b: &[Value]) -> EngineResult<bool> {
        let col = self.key_column;
        match nullsafe_compare(column(a, col)?, column(b, col)?, self.collation) {
            Ok(ord) => Ok(ord.is_eq()),
            Err(err) => match self.weight_string_column {
                Some(ws) => {
                    let ord = nullsafe_compare(column(a, ws)?, column(b, ws)?, Collation::Binary)?;
                    Ok(ord.is_eq())
                }
                None => Err(EngineError::from(err).wrap(format!("grouping by column {}", col))),
            },
        }
    }
}

impl fmt::Display for GroupByKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.weight_string_column {
            Some(ws) => write!(f, "({}|{})", self.key_column, ws),
            None => write!(f, "{}", self.key_column),
        }
    }
}

fn column(row: &[Value], col: usize) -> EngineResult<&Value> {
    row.get(col)
        .ok_or_else(|| EngineError::internal(format!("group by column {} out of bounds", col)))
}

/// Aggregates consecutive rows with equal grouping keys.
///
/// The input must arrive ordered by `group_by_keys`; one row is emitted
/// per run of equal keys.
#[derive(Debug)]
pub struct OrderedAggregate {
    pub input: Box<dyn Primitive>,
    pub aggregates: Vec<AggregateParam>,
    pub group_by_keys: Vec<GroupByKey>,
    pub truncate_column_count: usize,
}

impl OrderedAggregate {
    pub fn new(
        input: Box<dyn Primitive>,
        aggregates: Vec<AggregateParam>,
        group_by_keys: Vec<GroupByKey>,
    ) -> Self {
        Self {
            input,
            aggregates,
            group_by_keys,
            truncate_column_count: 0,
        }
    }

    pub fn with_truncate(mut self, count: usize) -> Self {
        self.truncate_column_count = count;
        self
    }

    fn same_group(&self, acc: &Accumulator, row: &[Value]) -> EngineResult<bool> {
        for key in &self.group_by_keys {
            if !key.same_group(&acc.row, row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Primitive for OrderedAggregate {
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

        let mut rows = Vec::new();
        let mut current: Option<Accumulator> = None;
        for row in input.rows {
            current = Some(match current.take() {
                None => folder.seed(row)?,
                Some(mut acc) => {
                    if self.same_group(&acc, &row)? {
                        folder.merge(&mut acc, &row)?;
                        acc
                    } else {
                        rows.push(acc.into_row());
                        folder.seed(row)?
                    }
                }
            });
        }
        if let Some(acc) = current {
            rows.push(acc.into_row());
        }

        let fields = folder.convert_fields(input.fields);
        Ok(ResultSet::new(fields, rows).truncate(self.truncate_column_count))
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
        let keys: Vec<String> = self.group_by_keys.iter().map(|k| k.to_string()).collect();
        let mut desc = PrimitiveDescription::new(self.operator_type(), "Ordered")
            .with("Aggregates", aggregates.join(", "))
            .with("GroupBy", keys.join(", "));
        if self.truncate_column_count > 0 {
            desc = desc.with("ResultColumns", self.truncate_column_count);
        }
        desc
    }
}
