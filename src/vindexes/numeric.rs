//! Numeric vindex: the value itself, big-endian, is the keyspace id

use crate::engine::{Destination, EngineResult, VCursor};
use crate::sqltypes::Value;

use super::SingleColumnVindex;

/// Unsigned integers map to their 8-byte big-endian encoding.
///
/// Negative or non-integral values cannot exist in the keyspace and map to
/// no shard.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericVindex;

impl NumericVindex {
    pub fn new() -> Self {
        Self
    }

    pub fn keyspace_id(value: &Value) -> Option<[u8; 8]> {
        value.as_u64().map(u64::to_be_bytes)
    }
}

impl SingleColumnVindex for NumericVindex {
    fn name(&self) -> &str {
        "numeric"
    }

    fn is_unique(&self) -> bool {
        true
    }

    fn map(&self, _cursor: &dyn VCursor, ids: &[Value]) -> EngineResult<Vec<Destination>> {
        Ok(ids
            .iter()
            .map(|id| match Self::keyspace_id(id) {
                Some(ksid) => Destination::KeyspaceId(ksid.to_vec()),
                None => Destination::None,
            })
            .collect())
    }
}
