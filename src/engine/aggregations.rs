//! Aggregate opcodes and the fold logic shared by the aggregate primitives
//!
//! Rows are folded in two steps. A raw row is first seeded into an
//! accumulator (COUNT becomes 1 or 0, distinct keys are remembered), then
//! each further raw row of the same group is merged into it. The
//! accumulator keeps the row shape of its input; only aggregate columns
//! change.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{EngineError, EngineResult};
use crate::observability::{log_event_with_fields, Event};
use crate::sqltypes::{
    max, min, nullsafe_add, nullsafe_compare, Collation, Field, Row, SqlType, Value,
};

/// Aggregate functions supported across shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOpcode {
    /// Not set by the planner
    #[default]
    Unassigned,
    Count,
    CountStar,
    CountDistinct,
    Sum,
    SumDistinct,
    Min,
    Max,
    /// Any value of the group; the first one seen is kept
    Random,
    /// Per-shard GTIDs collected as `shard:gtid` pairs
    Gtid,
}

impl AggregateOpcode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOpcode::Unassigned => "unassigned",
            AggregateOpcode::Count => "count",
            AggregateOpcode::CountStar => "count_star",
            AggregateOpcode::CountDistinct => "count_distinct",
            AggregateOpcode::Sum => "sum",
            AggregateOpcode::SumDistinct => "sum_distinct",
            AggregateOpcode::Min => "min",
            AggregateOpcode::Max => "max",
            AggregateOpcode::Random => "random",
            AggregateOpcode::Gtid => "gtid",
        }
    }

    pub fn is_distinct(&self) -> bool {
        matches!(self, AggregateOpcode::CountDistinct | AggregateOpcode::SumDistinct)
    }

    fn is_count(&self) -> bool {
        matches!(
            self,
            AggregateOpcode::Count | AggregateOpcode::CountStar | AggregateOpcode::CountDistinct
        )
    }

    /// Declared output type, or `None` to keep the input column's type
    pub fn output_type(&self) -> Option<SqlType> {
        match self {
            AggregateOpcode::Count | AggregateOpcode::CountStar | AggregateOpcode::CountDistinct => {
                Some(SqlType::Int64)
            }
            AggregateOpcode::Sum | AggregateOpcode::SumDistinct => Some(SqlType::Decimal),
            AggregateOpcode::Gtid => Some(SqlType::VarChar),
            AggregateOpcode::Min
            | AggregateOpcode::Max
            | AggregateOpcode::Random
            | AggregateOpcode::Unassigned => None,
        }
    }
}

impl fmt::Display for AggregateOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One aggregate expression of the select list.
///
/// The aggregate reads `column` of each input row and writes its running
/// value back to the same position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateParam {
    pub opcode: AggregateOpcode,
    pub column: usize,
    #[serde(default)]
    pub alias: String,
    /// Column holding the distinct key; defaults to `column`
    #[serde(default)]
    pub distinct_key_column: Option<usize>,
    /// Compared instead of the distinct key when it is not comparable
    #[serde(default)]
    pub weight_string_column: Option<usize>,
    #[serde(default)]
    pub collation: Collation,
    /// Opcode before the planner rewrote it, e.g. COUNT pushed down as SUM
    #[serde(default)]
    pub original_opcode: AggregateOpcode,
}

impl AggregateParam {
    pub fn new(opcode: AggregateOpcode, column: usize) -> Self {
        Self {
            opcode,
            column,
            alias: String::new(),
            distinct_key_column: None,
            weight_string_column: None,
            collation: Collation::Binary,
            original_opcode: AggregateOpcode::Unassigned,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_original(mut self, opcode: AggregateOpcode) -> Self {
        self.original_opcode = opcode;
        self
    }

    pub fn with_weight_string(mut self, column: usize) -> Self {
        self.weight_string_column = Some(column);
        self
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    fn key_column(&self) -> usize {
        self.distinct_key_column.unwrap_or(self.column)
    }

    /// Opcode that decides the empty-input value
    fn effective_opcode(&self) -> AggregateOpcode {
        if self.original_opcode != AggregateOpcode::Unassigned {
            self.original_opcode
        } else {
            self.opcode
        }
    }
}

impl fmt::Display for AggregateParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.alias.is_empty() {
            self.column.to_string()
        } else {
            self.alias.clone()
        };
        if self.original_opcode != AggregateOpcode::Unassigned
            && self.original_opcode != self.opcode
        {
            write!(f, "{}_{}({})", self.original_opcode, self.opcode, label)
        } else {
            write!(f, "{}({})", self.opcode, label)
        }
    }
}

/// Remembered distinct key of one distinct aggregate
#[derive(Debug, Clone, PartialEq)]
struct DistinctKey {
    key: Value,
    weight: Option<Value>,
}

/// Running state for one group
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Accumulator {
    pub(crate) row: Row,
    distincts: Vec<Option<DistinctKey>>,
}

impl Accumulator {
    pub(crate) fn into_row(self) -> Row {
        self.row
    }
}

/// Fold logic composed into both aggregate primitives
#[derive(Debug, Clone, Copy)]
pub(crate) struct AggregateFolder<'a> {
    aggregates: &'a [AggregateParam],
}

impl<'a> AggregateFolder<'a> {
    pub(crate) fn new(aggregates: &'a [AggregateParam]) -> Self {
        Self { aggregates }
    }

    /// Turns the first raw row of a group into an accumulator
    pub(crate) fn seed(&self, mut row: Row) -> EngineResult<Accumulator> {
        let mut distincts = Vec::with_capacity(self.aggregates.len());
        for aggr in self.aggregates {
            let mut distinct = None;
            match aggr.opcode {
                AggregateOpcode::CountStar => set(&mut row, aggr.column, Value::Int64(1))?,
                AggregateOpcode::Count => {
                    let present = !get(&row, aggr.column)?.is_null();
                    set(&mut row, aggr.column, Value::Int64(present as i64))?;
                }
                AggregateOpcode::CountDistinct => {
                    let key = distinct_key(&row, aggr)?;
                    let present = !key.key.is_null();
                    if present {
                        distinct = Some(key);
                    }
                    set(&mut row, aggr.column, Value::Int64(present as i64))?;
                }
                AggregateOpcode::SumDistinct => {
                    let key = distinct_key(&row, aggr)?;
                    if !key.key.is_null() {
                        distinct = Some(key);
                    }
                }
                AggregateOpcode::Gtid => {
                    let gtid = gtid_entry(&row, aggr.column)?;
                    set(&mut row, aggr.column, gtid)?;
                }
                AggregateOpcode::Sum
                | AggregateOpcode::Min
                | AggregateOpcode::Max
                | AggregateOpcode::Random => {}
                AggregateOpcode::Unassigned => return Err(unassigned(aggr)),
            }
            distincts.push(distinct);
        }
        Ok(Accumulator { row, distincts })
    }

    /// Folds one more raw row of the same group into the accumulator
    pub(crate) fn merge(&self, acc: &mut Accumulator, row: &[Value]) -> EngineResult<()> {
        for (i, aggr) in self.aggregates.iter().enumerate() {
            if aggr.opcode.is_distinct() {
                let key = distinct_key(row, aggr)?;
                if key.key.is_null() {
                    continue;
                }
                if let Some(seen) = &acc.distincts[i] {
                    if same_distinct_key(seen, &key, aggr)? {
                        continue;
                    }
                }
                acc.distincts[i] = Some(key);
            }

            let col = aggr.column;
            let current = get(&acc.row, col)?;
            let incoming = get(row, col)?;
            let merged = match aggr.opcode {
                AggregateOpcode::CountStar | AggregateOpcode::CountDistinct => {
                    nullsafe_add(current, &Value::Int64(1))?
                }
                AggregateOpcode::Count => {
                    if incoming.is_null() {
                        continue;
                    }
                    nullsafe_add(current, &Value::Int64(1))?
                }
                AggregateOpcode::Sum | AggregateOpcode::SumDistinct => {
                    nullsafe_add(current, incoming)?
                }
                AggregateOpcode::Min => min(current, incoming, aggr.collation)?,
                AggregateOpcode::Max => max(current, incoming, aggr.collation)?,
                AggregateOpcode::Random => continue,
                AggregateOpcode::Gtid => {
                    let entry = gtid_entry(row, col)?;
                    Value::text(format!("{},{}", current, entry))
                }
                AggregateOpcode::Unassigned => return Err(unassigned(aggr)),
            };
            set(&mut acc.row, col, merged)?;
        }
        Ok(())
    }

    /// Output fields: aggregate columns get their declared type and alias
    pub(crate) fn convert_fields(&self, mut fields: Vec<Field>) -> Vec<Field> {
        for aggr in self.aggregates {
            if let Some(field) = fields.get_mut(aggr.column) {
                if let Some(sql_type) = aggr.opcode.output_type() {
                    field.sql_type = sql_type;
                }
                if !aggr.alias.is_empty() {
                    field.name = aggr.alias.clone();
                }
            }
        }
        fields
    }

    /// The single row produced by a scalar aggregate over no input
    pub(crate) fn empty_row(&self, width: usize) -> Row {
        let width = self
            .aggregates
            .iter()
            .map(|a| a.column + 1)
            .fold(width, usize::max);
        let mut row = vec![Value::Null; width];
        for aggr in self.aggregates {
            if aggr.effective_opcode().is_count() {
                row[aggr.column] = Value::Int64(0);
            }
        }
        row
    }
}

fn get(row: &[Value], col: usize) -> EngineResult<&Value> {
    row.get(col).ok_or_else(|| {
        EngineError::internal(format!(
            "aggregate column {} out of bounds for row of {} values",
            col,
            row.len()
        ))
    })
}

fn set(row: &mut [Value], col: usize, value: Value) -> EngineResult<()> {
    let len = row.len();
    match row.get_mut(col) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(EngineError::internal(format!(
            "aggregate column {} out of bounds for row of {} values",
            col, len
        ))),
    }
}

fn distinct_key(row: &[Value], aggr: &AggregateParam) -> EngineResult<DistinctKey> {
    let key = get(row, aggr.key_column())?.clone();
    let weight = match aggr.weight_string_column {
        Some(ws) => Some(get(row, ws)?.clone()),
        None => None,
    };
    Ok(DistinctKey { key, weight })
}

fn same_distinct_key(a: &DistinctKey, b: &DistinctKey, aggr: &AggregateParam) -> EngineResult<bool> {
    match nullsafe_compare(&a.key, &b.key, aggr.collation) {
        Ok(ord) => Ok(ord.is_eq()),
        Err(err) => match (&a.weight, &b.weight) {
            (Some(x), Some(y)) => Ok(nullsafe_compare(x, y, Collation::Binary)?.is_eq()),
            _ => Err(EngineError::from(err)),
        },
    }
}

/// `shard:gtid` from the gtid column and the shard name next to it
fn gtid_entry(row: &[Value], col: usize) -> EngineResult<Value> {
    let gtid = get(row, col)?;
    let shard = get(row, col + 1)?;
    Ok(Value::text(format!("{}:{}", shard, gtid)))
}

fn unassigned(aggr: &AggregateParam) -> EngineError {
    let column = aggr.column.to_string();
    log_event_with_fields(
        Event::InvariantViolated,
        &[("reason", "unassigned aggregate opcode"), ("column", column.as_str())],
    );
    EngineError::internal(format!("unassigned aggregate opcode at column {}", aggr.column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineErrorCode;

    fn fold(aggregates: &[AggregateParam], rows: Vec<Row>) -> Row {
        let folder = AggregateFolder::new(aggregates);
        let mut rows = rows.into_iter();
        let mut acc = folder.seed(rows.next().unwrap()).unwrap();
        for row in rows {
            folder.merge(&mut acc, &row).unwrap();
        }
        acc.into_row()
    }

    #[test]
    fn test_count_and_sum() {
        let aggrs = [
            AggregateParam::new(AggregateOpcode::CountStar, 0),
            AggregateParam::new(AggregateOpcode::Count, 1),
            AggregateParam::new(AggregateOpcode::Sum, 2),
        ];
        let row = fold(
            &aggrs,
            vec![
                vec![Value::Null, Value::Int64(5), Value::Int64(10)],
                vec![Value::Null, Value::Null, Value::Null],
                vec![Value::Null, Value::Int64(7), Value::Int64(-3)],
            ],
        );
        assert_eq!(row, vec![Value::Int64(3), Value::Int64(2), Value::Int64(7)]);
    }

    #[test]
    fn test_sum_of_nulls_stays_null() {
        let aggrs = [AggregateParam::new(AggregateOpcode::Sum, 0)];
        let row = fold(&aggrs, vec![vec![Value::Null], vec![Value::Null]]);
        assert_eq!(row, vec![Value::Null]);
    }

    #[test]
    fn test_min_max_ignore_null() {
        let aggrs = [
            AggregateParam::new(AggregateOpcode::Min, 0),
            AggregateParam::new(AggregateOpcode::Max, 1),
        ];
        let row = fold(
            &aggrs,
            vec![
                vec![Value::Null, Value::Int64(2)],
                vec![Value::Int64(4), Value::Null],
                vec![Value::Int64(1), Value::Int64(9)],
            ],
        );
        assert_eq!(row, vec![Value::Int64(1), Value::Int64(9)]);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let aggrs = [
            AggregateParam::new(AggregateOpcode::Sum, 0),
            AggregateParam::new(AggregateOpcode::Count, 1),
            AggregateParam::new(AggregateOpcode::Min, 2),
            AggregateParam::new(AggregateOpcode::Max, 3),
        ];
        let rows: Vec<Row> = vec![
            vec![Value::Int64(3), Value::Int64(1), Value::Int64(8), Value::Int64(8)],
            vec![Value::Null, Value::Null, Value::Null, Value::Null],
            vec![Value::Int64(-2), Value::Int64(4), Value::Int64(2), Value::Int64(2)],
            vec![Value::Int64(10), Value::Int64(0), Value::Int64(5), Value::Int64(5)],
        ];
        let expected = fold(&aggrs, rows.clone());
        assert_eq!(
            expected,
            vec![Value::Int64(11), Value::Int64(3), Value::Int64(2), Value::Int64(8)]
        );

        // Every rotation and the reversal fold to the same accumulator
        for shift in 1..rows.len() {
            let mut permuted = rows.clone();
            permuted.rotate_left(shift);
            assert_eq!(fold(&aggrs, permuted), expected);
        }
        let mut reversed = rows;
        reversed.reverse();
        assert_eq!(fold(&aggrs, reversed), expected);
    }

    #[test]
    fn test_count_distinct_skips_repeats_and_nulls() {
        let aggrs = [AggregateParam::new(AggregateOpcode::CountDistinct, 0)];
        let row = fold(
            &aggrs,
            vec![
                vec![Value::Int64(1)],
                vec![Value::Int64(1)],
                vec![Value::Null],
                vec![Value::Int64(2)],
                vec![Value::Int64(2)],
                vec![Value::Int64(3)],
            ],
        );
        assert_eq!(row, vec![Value::Int64(3)]);
    }

    #[test]
    fn test_count_distinct_starting_with_null() {
        let aggrs = [AggregateParam::new(AggregateOpcode::CountDistinct, 0)];
        let row = fold(&aggrs, vec![vec![Value::Null], vec![Value::Int64(4)]]);
        assert_eq!(row, vec![Value::Int64(1)]);
    }

    #[test]
    fn test_sum_distinct() {
        let aggrs = [AggregateParam::new(AggregateOpcode::SumDistinct, 0)];
        let row = fold(
            &aggrs,
            vec![
                vec![Value::Int64(5)],
                vec![Value::Int64(5)],
                vec![Value::Int64(7)],
            ],
        );
        assert_eq!(row, vec![Value::Int64(12)]);
    }

    #[test]
    fn test_distinct_key_weight_string_fallback() {
        let aggrs = [AggregateParam::new(AggregateOpcode::CountDistinct, 0)
            .with_collation(Collation::Unknown)
            .with_weight_string(1)];
        let row = fold(
            &aggrs,
            vec![
                vec![Value::text("a"), Value::Binary(vec![1])],
                vec![Value::text("A"), Value::Binary(vec![1])],
                vec![Value::text("b"), Value::Binary(vec![2])],
            ],
        );
        assert_eq!(row[0], Value::Int64(2));
    }

    #[test]
    fn test_random_keeps_first() {
        let aggrs = [AggregateParam::new(AggregateOpcode::Random, 0)];
        let row = fold(&aggrs, vec![vec![Value::text("x")], vec![Value::text("y")]]);
        assert_eq!(row, vec![Value::text("x")]);
    }

    #[test]
    fn test_gtid_collects_shards() {
        let aggrs = [AggregateParam::new(AggregateOpcode::Gtid, 0)];
        let row = fold(
            &aggrs,
            vec![
                vec![Value::text("MySQL56/a:1-5"), Value::text("-80")],
                vec![Value::text("MySQL56/b:1-3"), Value::text("80-")],
            ],
        );
        assert_eq!(row[0], Value::text("-80:MySQL56/a:1-5,80-:MySQL56/b:1-3"));
    }

    #[test]
    fn test_unassigned_opcode_is_internal() {
        let aggrs = [AggregateParam::new(AggregateOpcode::Unassigned, 0)];
        let err = AggregateFolder::new(&aggrs)
            .seed(vec![Value::Int64(1)])
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::Internal);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_sum_overflow_is_range_error() {
        let aggrs = [AggregateParam::new(AggregateOpcode::Sum, 0)];
        let folder = AggregateFolder::new(&aggrs);
        let mut acc = folder.seed(vec![Value::Int64(i64::MAX)]).unwrap();
        let err = folder.merge(&mut acc, &[Value::Int64(1)]).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::Range);
    }

    #[test]
    fn test_convert_fields() {
        let aggrs = [
            AggregateParam::new(AggregateOpcode::Count, 0).with_alias("count(*)"),
            AggregateParam::new(AggregateOpcode::Sum, 1),
            AggregateParam::new(AggregateOpcode::Max, 2),
        ];
        let fields = AggregateFolder::new(&aggrs).convert_fields(vec![
            Field::new("a", SqlType::Int32),
            Field::new("b", SqlType::Int32),
            Field::new("c", SqlType::VarChar),
        ]);
        assert_eq!(
            fields,
            vec![
                Field::new("count(*)", SqlType::Int64),
                Field::new("b", SqlType::Decimal),
                Field::new("c", SqlType::VarChar),
            ]
        );
    }

    #[test]
    fn test_empty_row() {
        let aggrs = [
            AggregateParam::new(AggregateOpcode::Sum, 0).with_original(AggregateOpcode::Count),
            AggregateParam::new(AggregateOpcode::Sum, 1),
            AggregateParam::new(AggregateOpcode::CountStar, 3),
        ];
        let row = AggregateFolder::new(&aggrs).empty_row(2);
        assert_eq!(
            row,
            vec![Value::Int64(0), Value::Null, Value::Null, Value::Int64(0)]
        );
    }

    #[test]
    fn test_param_display() {
        let p = AggregateParam::new(AggregateOpcode::Sum, 1).with_original(AggregateOpcode::Count);
        assert_eq!(p.to_string(), "count_sum(1)");
        let p = AggregateParam::new(AggregateOpcode::Max, 0).with_alias("max(x)");
        assert_eq!(p.to_string(), "max(max(x))");
    }
}
