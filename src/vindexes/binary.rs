//! Binary vindex: the raw bytes are the keyspace id

use crate::engine::{Destination, EngineResult, VCursor};
use crate::sqltypes::Value;

use super::SingleColumnVindex;

#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryVindex;

impl BinaryVindex {
    pub fn new() -> Self {
        Self
    }
}

/// Bytes of a routing value; numbers use their decimal text, NULL has none
pub(super) fn value_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Null => None,
        Value::Text(_) | Value::Binary(_) => value.as_bytes().map(<[u8]>::to_vec),
        Value::Int64(_) | Value::Uint64(_) | Value::Float64(_) => {
            Some(value.to_string().into_bytes())
        }
    }
}

impl SingleColumnVindex for BinaryVindex {
    fn name(&self) -> &str {
        "binary"
    }

    fn is_unique(&self) -> bool {
        true
    }

    fn map(&self, _cursor: &dyn VCursor, ids: &[Value]) -> EngineResult<Vec<Destination>> {
        Ok(ids
            .iter()
            .map(|id| match value_bytes(id) {
                Some(bytes) => Destination::KeyspaceId(bytes),
                None => Destination::None,
            })
            .collect())
    }
}
