//! Expression evaluation
//!
//! Expressions are evaluated against the current bind variables and, for
//! filters and projections, the current row. Routing values, limits and
//! offsets are all expressions so that they can be re-evaluated on every call.

mod expr;

pub use expr::{ArithmeticOp, ComparisonOp, EvalResult, Expr, ExprEnv};
