//! Declarative shard topology
//!
//! A topology names keyspaces and their shards and, for each shard, the
//! results it returns for specific queries. [`StaticCursor`] serves a
//! topology in-process, which is how plans are run and tested without a
//! live shard fleet.
//!
//! ```json
//! {
//!   "keyspaces": {
//!     "user": {
//!       "sharded": true,
//!       "shards": {
//!         "-80": { "queries": [ { "sql": "select id from t", "result": { "rows": [[1]] } } ] },
//!         "80-": { "queries": [] }
//!       }
//!     }
//!   }
//! }
//! ```

mod cursor;
mod keyrange;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sqltypes::{BindVars, ResultSet};

pub use cursor::{ExecutedQuery, StaticCursor, DEFAULT_MAX_MEMORY_ROWS};
pub use keyrange::KeyRange;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub keyspaces: BTreeMap<String, KeyspaceSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceSpec {
    #[serde(default)]
    pub sharded: bool,
    /// Keyed by key-range shard name
    #[serde(default)]
    pub shards: BTreeMap<String, ShardSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardSpec {
    #[serde(default)]
    pub queries: Vec<CannedQuery>,
}

/// A result returned for a matching query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CannedQuery {
    pub sql: String,
    /// When present, each entry must also appear in the executed query's
    /// bind variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_vars: Option<BindVars>,
    #[serde(default)]
    pub result: ResultSet,
}

impl CannedQuery {
    pub fn matches(&self, sql: &str, bind_vars: &BindVars) -> bool {
        if self.sql != sql {
            return false;
        }
        match &self.bind_vars {
            None => true,
            Some(expected) => expected
                .iter()
                .all(|(name, value)| bind_vars.get(name) == Some(value)),
        }
    }
}
