//! Expression tree and evaluation

use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, EngineResult};
use crate::sqltypes::{nullsafe_compare, BindVariable, BindVars, Collation, Field, SqlType, Value};

/// Comparison operators. `NullSafeEq` is `<=>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=>")]
    NullSafeEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
}

/// An expression evaluated against bind variables and, optionally, a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    BindVar(String),
    /// A bind variable that must hold a tuple, e.g. `::vals`
    TupleBindVar(String),
    /// Zero-based column of the current row
    Column(usize),
    Tuple(Vec<Expr>),
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
}

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Value(Value),
    Tuple(Vec<Value>),
}

/// Inputs visible to an expression
#[derive(Debug, Clone, Copy)]
pub struct ExprEnv<'a> {
    pub bind_vars: &'a BindVars,
    pub row: Option<&'a [Value]>,
}

impl<'a> ExprEnv<'a> {
    pub fn new(bind_vars: &'a BindVars) -> Self {
        Self {
            bind_vars,
            row: None,
        }
    }

    pub fn with_row(bind_vars: &'a BindVars, row: &'a [Value]) -> Self {
        Self {
            bind_vars,
            row: Some(row),
        }
    }
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn bind_var(name: impl Into<String>) -> Self {
        Expr::BindVar(name.into())
    }

    pub fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Self {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn evaluate(&self, env: ExprEnv<'_>) -> EngineResult<EvalResult> {
        match self {
            Expr::TupleBindVar(name) => match lookup(env.bind_vars, name)? {
                BindVariable::Tuple(values) => Ok(EvalResult::Tuple(values.clone())),
                BindVariable::Single(_) => Err(EngineError::invalid_argument(format!(
                    "bind variable '{}' is not a tuple",
                    name
                ))),
            },
            Expr::Tuple(items) => items
                .iter()
                .map(|e| e.evaluate_value(env))
                .collect::<EngineResult<Vec<_>>>()
                .map(EvalResult::Tuple),
            _ => self.evaluate_value(env).map(EvalResult::Value),
        }
    }

    /// Evaluates to a single value; tuples are an error
    pub fn evaluate_value(&self, env: ExprEnv<'_>) -> EngineResult<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::BindVar(name) => match lookup(env.bind_vars, name)? {
                BindVariable::Single(v) => Ok(v.clone()),
                BindVariable::Tuple(_) => Err(EngineError::invalid_argument(format!(
                    "bind variable '{}' is a tuple, expected a single value",
                    name
                ))),
            },
            Expr::Column(idx) => {
                let row = env.row.ok_or_else(|| {
                    EngineError::internal(format!("column {} referenced without a row", idx))
                })?;
                row.get(*idx).cloned().ok_or_else(|| {
                    EngineError::internal(format!(
                        "column {} out of bounds for row of {} values",
                        idx,
                        row.len()
                    ))
                })
            }
            Expr::TupleBindVar(_) | Expr::Tuple(_) => Err(EngineError::invalid_argument(
                "tuple used where a single value is expected",
            )),
            Expr::Comparison { op, left, right } => {
                let l = left.evaluate_value(env)?;
                let r = right.evaluate_value(env)?;
                compare(*op, &l, &r)
            }
            Expr::Arithmetic { op, left, right } => {
                let l = left.evaluate_value(env)?;
                let r = right.evaluate_value(env)?;
                arithmetic(*op, &l, &r)
            }
            Expr::And(items) => {
                let mut saw_null = false;
                for item in items {
                    match item.evaluate_value(env)? {
                        Value::Null => saw_null = true,
                        v if !v.is_truthy() => return Ok(Value::Int64(0)),
                        _ => {}
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Int64(1) })
            }
            Expr::Or(items) => {
                let mut saw_null = false;
                for item in items {
                    match item.evaluate_value(env)? {
                        Value::Null => saw_null = true,
                        v if v.is_truthy() => return Ok(Value::Int64(1)),
                        _ => {}
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Int64(0) })
            }
            Expr::Not(inner) => match inner.evaluate_value(env)? {
                Value::Null => Ok(Value::Null),
                v => Ok(bool_value(!v.is_truthy())),
            },
            Expr::IsNull(inner) => Ok(bool_value(inner.evaluate_value(env)?.is_null())),
        }
    }

    /// Evaluates to a non-negative count, used for limits and offsets
    pub fn evaluate_count(&self, env: ExprEnv<'_>, what: &str) -> EngineResult<u64> {
        let value = self.evaluate_value(env)?;
        match value {
            Value::Int64(v) if v < 0 => Err(EngineError::range(format!(
                "requested {} {} is negative",
                what, v
            ))),
            Value::Int64(v) => Ok(v as u64),
            Value::Uint64(v) => i64::try_from(v).map(|v| v as u64).map_err(|_| {
                EngineError::range(format!("requested {} {} is too large", what, v))
            }),
            other => other.as_u64().ok_or_else(|| {
                EngineError::range(format!("requested {} '{}' is not a valid count", what, other))
            }),
        }
    }

    /// Infers the declared type of the expression without evaluating rows
    pub fn result_type(&self, fields: &[Field], bind_vars: &BindVars) -> SqlType {
        match self {
            Expr::Literal(v) => v.sql_type(),
            Expr::BindVar(name) => match bind_vars.get(name) {
                Some(BindVariable::Single(v)) => v.sql_type(),
                _ => SqlType::Null,
            },
            Expr::Column(idx) => fields.get(*idx).map(|f| f.sql_type).unwrap_or(SqlType::Null),
            Expr::TupleBindVar(_) | Expr::Tuple(_) => SqlType::Null,
            Expr::Comparison { .. }
            | Expr::And(_)
            | Expr::Or(_)
            | Expr::Not(_)
            | Expr::IsNull(_) => SqlType::Int64,
            Expr::Arithmetic { left, right, .. } => {
                let l = left.result_type(fields, bind_vars);
                let r = right.result_type(fields, bind_vars);
                if l.is_integral() && r.is_integral() {
                    SqlType::Int64
                } else if l == SqlType::Decimal || r == SqlType::Decimal {
                    SqlType::Decimal
                } else {
                    SqlType::Float64
                }
            }
        }
    }
}

fn lookup<'a>(bind_vars: &'a BindVars, name: &str) -> EngineResult<&'a BindVariable> {
    bind_vars
        .get(name)
        .ok_or_else(|| EngineError::invalid_argument(format!("missing bind variable '{}'", name)))
}

fn bool_value(b: bool) -> Value {
    Value::Int64(b as i64)
}

fn compare(op: ComparisonOp, l: &Value, r: &Value) -> EngineResult<Value> {
    if op == ComparisonOp::NullSafeEq {
        let ord = nullsafe_compare(l, r, Collation::Binary)?;
        return Ok(bool_value(ord.is_eq()));
    }
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let ord = nullsafe_compare(l, r, Collation::Binary)?;
    let result = match op {
        ComparisonOp::Eq => ord.is_eq(),
        ComparisonOp::NotEq => ord.is_ne(),
        ComparisonOp::Lt => ord.is_lt(),
        ComparisonOp::Le => ord.is_le(),
        ComparisonOp::Gt => ord.is_gt(),
        ComparisonOp::Ge => ord.is_ge(),
        ComparisonOp::NullSafeEq => ord.is_eq(),
    };
    Ok(bool_value(result))
}

fn arithmetic(op: ArithmeticOp, l: &Value, r: &Value) -> EngineResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let integral = |v: &Value| match v {
        Value::Int64(x) => Some(*x as i128),
        Value::Uint64(x) => Some(*x as i128),
        _ => None,
    };
    if let (Some(a), Some(b)) = (integral(l), integral(r)) {
        let result = match op {
            ArithmeticOp::Add => a.checked_add(b),
            ArithmeticOp::Sub => a.checked_sub(b),
            ArithmeticOp::Mul => a.checked_mul(b),
        };
        let unsigned = matches!(l, Value::Uint64(_)) || matches!(r, Value::Uint64(_));
        return match result {
            Some(v) if unsigned && v >= 0 && v <= u64::MAX as i128 => Ok(Value::Uint64(v as u64)),
            Some(v) if v >= i64::MIN as i128 && v <= i64::MAX as i128 => Ok(Value::Int64(v as i64)),
            _ => Err(EngineError::range("BIGINT value is out of range")),
        };
    }
    let float = |v: &Value| -> EngineResult<f64> {
        match v {
            Value::Int64(x) => Ok(*x as f64),
            Value::Uint64(x) => Ok(*x as f64),
            Value::Float64(x) => Ok(*x),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| EngineError::type_mismatch(format!("'{}' is not numeric", s))),
            Value::Binary(_) | Value::Null => Err(EngineError::type_mismatch(format!(
                "{} value is not numeric",
                v.sql_type()
            ))),
        }
    };
    let (a, b) = (float(l)?, float(r)?);
    Ok(Value::Float64(match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Sub => a - b,
        ArithmeticOp::Mul => a * b,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineErrorCode;
    use serde_json::json;

    fn bv(pairs: &[(&str, BindVariable)]) -> BindVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_bind_var_and_tuple() {
        let vars = bv(&[
            ("id", BindVariable::single(5i64)),
            ("vals", BindVariable::tuple(vec![Value::Int64(1), Value::Int64(2)])),
        ]);
        let env = ExprEnv::new(&vars);

        assert_eq!(Expr::bind_var("id").evaluate_value(env).unwrap(), Value::Int64(5));
        assert_eq!(
            Expr::TupleBindVar("vals".into()).evaluate(env).unwrap(),
            EvalResult::Tuple(vec![Value::Int64(1), Value::Int64(2)])
        );
        let err = Expr::bind_var("vals").evaluate_value(env).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidArgument);
    }

    #[test]
    fn test_missing_bind_var() {
        let vars = BindVars::new();
        let err = Expr::bind_var("nope").evaluate_value(ExprEnv::new(&vars)).unwrap_err();
        assert!(err.message().contains("nope"));
    }

    #[test]
    fn test_comparison_three_valued() {
        let vars = BindVars::new();
        let row = vec![Value::Int64(3), Value::Null];
        let env = ExprEnv::with_row(&vars, &row);

        let gt = Expr::compare(ComparisonOp::Gt, Expr::Column(0), Expr::literal(2i64));
        assert_eq!(gt.evaluate_value(env).unwrap(), Value::Int64(1));

        let eq_null = Expr::compare(ComparisonOp::Eq, Expr::Column(1), Expr::Literal(Value::Null));
        assert_eq!(eq_null.evaluate_value(env).unwrap(), Value::Null);

        let nse = Expr::compare(ComparisonOp::NullSafeEq, Expr::Column(1), Expr::Literal(Value::Null));
        assert_eq!(nse.evaluate_value(env).unwrap(), Value::Int64(1));

        let and = Expr::And(vec![gt.clone(), eq_null.clone()]);
        assert_eq!(and.evaluate_value(env).unwrap(), Value::Null);
        let or = Expr::Or(vec![gt, eq_null]);
        assert_eq!(or.evaluate_value(env).unwrap(), Value::Int64(1));
    }

    #[test]
    fn test_arithmetic() {
        let vars = BindVars::new();
        let env = ExprEnv::new(&vars);
        let add = Expr::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(Expr::literal(2i64)),
            right: Box::new(Expr::literal(3i64)),
        };
        assert_eq!(add.evaluate_value(env).unwrap(), Value::Int64(5));

        let overflow = Expr::Arithmetic {
            op: ArithmeticOp::Mul,
            left: Box::new(Expr::literal(i64::MAX)),
            right: Box::new(Expr::literal(2i64)),
        };
        assert_eq!(
            overflow.evaluate_value(env).unwrap_err().code(),
            EngineErrorCode::Range
        );
    }

    #[test]
    fn test_evaluate_count_rejects_negative_and_huge() {
        let vars = bv(&[
            ("neg", BindVariable::single(-1i64)),
            ("huge", BindVariable::single(u64::MAX)),
            ("ok", BindVariable::single(10i64)),
        ]);
        let env = ExprEnv::new(&vars);
        assert_eq!(Expr::bind_var("ok").evaluate_count(env, "limit").unwrap(), 10);
        assert_eq!(
            Expr::bind_var("neg").evaluate_count(env, "limit").unwrap_err().code(),
            EngineErrorCode::Range
        );
        assert_eq!(
            Expr::bind_var("huge").evaluate_count(env, "offset").unwrap_err().code(),
            EngineErrorCode::Range
        );
    }

    #[test]
    fn test_expr_from_json() {
        let expr: Expr = serde_json::from_value(json!({
            "comparison": {"op": ">=", "left": {"column": 1}, "right": {"bind_var": "min"}}
        }))
        .unwrap();
        assert_eq!(
            expr,
            Expr::compare(ComparisonOp::Ge, Expr::Column(1), Expr::bind_var("min"))
        );
    }

    #[test]
    fn test_result_type_inference() {
        let fields = vec![Field::new("a", SqlType::Int32), Field::new("b", SqlType::Float64)];
        let vars = BindVars::new();
        let sum = Expr::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(Expr::Column(0)),
            right: Box::new(Expr::Column(1)),
        };
        assert_eq!(sum.result_type(&fields, &vars), SqlType::Float64);
        assert_eq!(Expr::Column(0).result_type(&fields, &vars), SqlType::Int32);
        assert_eq!(Expr::IsNull(Box::new(Expr::Column(0))).result_type(&fields, &vars), SqlType::Int64);
    }
}
