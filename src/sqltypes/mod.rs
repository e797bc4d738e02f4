//! Row and result model shared by every primitive
//!
//! A result set is a list of typed fields plus positional rows. Values are
//! compared and hashed through the null-safe helpers in [`compare`] so that
//! sort, de-duplication and grouping agree on equality.

mod compare;
mod result;
mod types;
mod value;

pub use compare::{
    max, min, nullsafe_add, nullsafe_compare, nullsafe_equal, nullsafe_hash, Collation,
    ValueError,
};
pub use result::ResultSet;
pub use types::{Field, SqlType};
pub use value::{extend_bind_vars, BindVariable, BindVars, Row, Value};
