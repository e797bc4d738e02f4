//! Vindexes: functions from column values to keyspace ids
//!
//! A vindex turns the routing value of an equality or IN predicate into a
//! [`Destination`]. Only single-column, functional vindexes are provided;
//! none of them consult the cursor, but the signature allows lookup-style
//! vindexes that do.

mod binary;
mod binary_hash;
mod numeric;

use std::fmt;
use std::sync::Arc;

use crate::engine::{Destination, EngineError, EngineResult, VCursor};
use crate::sqltypes::Value;

pub use binary::BinaryVindex;
pub use binary_hash::BinarySha256Vindex;
pub use numeric::NumericVindex;

/// Maps one column value to where its row lives
pub trait SingleColumnVindex: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// True if every value maps to at most one keyspace id
    fn is_unique(&self) -> bool;

    /// Returns one destination per id, in order
    fn map(&self, cursor: &dyn VCursor, ids: &[Value]) -> EngineResult<Vec<Destination>>;
}

/// Builds a vindex by its kind name
pub fn create(kind: &str) -> EngineResult<Arc<dyn SingleColumnVindex>> {
    match kind {
        "numeric" => Ok(Arc::new(NumericVindex::new())),
        "binary" => Ok(Arc::new(BinaryVindex::new())),
        "binary_sha256" => Ok(Arc::new(BinarySha256Vindex::new())),
        other => Err(EngineError::invalid_argument(format!(
            "unknown vindex type '{}'",
            other
        ))),
    }
}
