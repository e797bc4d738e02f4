//! Hashed binary vindex

use sha2::{Digest, Sha256};

use crate::engine::{Destination, EngineResult, VCursor};
use crate::sqltypes::Value;

use super::binary::value_bytes;
use super::SingleColumnVindex;

/// Keyspace id is the first 8 bytes of the SHA-256 of the value's bytes,
/// which spreads sequential keys evenly over the shards.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinarySha256Vindex;

impl BinarySha256Vindex {
    pub fn new() -> Self {
        Self
    }

    pub fn keyspace_id(bytes: &[u8]) -> [u8; 8] {
        let digest = Sha256::digest(bytes);
        let mut ksid = [0u8; 8];
        ksid.copy_from_slice(&digest[..8]);
        ksid
    }
}

impl SingleColumnVindex for BinarySha256Vindex {
    fn name(&self) -> &str {
        "binary_sha256"
    }

    fn is_unique(&self) -> bool {
        true
    }

    fn map(&self, _cursor: &dyn VCursor, ids: &[Value]) -> EngineResult<Vec<Destination>> {
        Ok(ids
            .iter()
            .map(|id| match value_bytes(id) {
                Some(bytes) => Destination::KeyspaceId(Self::keyspace_id(&bytes).to_vec()),
                None => Destination::None,
            })
            .collect())
    }
}
