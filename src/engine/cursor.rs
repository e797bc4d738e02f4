//! The shard resolver / executor collaborator
//!
//! Primitives never talk to shards directly. Route resolves destinations and
//! executes bound queries through a [`VCursor`]; Join asks it for the
//! in-memory row ceiling.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::ExecContext;
use super::errors::EngineResult;
use crate::sqltypes::{BindVars, ResultSet, Value};

/// Where a query should be sent, before resolution to concrete shards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    AllShards,
    AnyShard,
    /// Zero shards
    None,
    Shard(String),
    Shards(Vec<String>),
    KeyspaceId(Vec<u8>),
    KeyspaceIds(Vec<Vec<u8>>),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::AllShards => write!(f, "AllShards()"),
            Destination::AnyShard => write!(f, "AnyShard()"),
            Destination::None => write!(f, "None()"),
            Destination::Shard(s) => write!(f, "Shard({})", s),
            Destination::Shards(s) => write!(f, "Shards({})", s.join(",")),
            Destination::KeyspaceId(id) => write!(f, "KeyspaceId({})", hex(id)),
            Destination::KeyspaceIds(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| hex(id)).collect();
                write!(f, "KeyspaceIds({})", ids.join(","))
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A concrete shard returned by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedShard {
    pub keyspace: String,
    pub shard: String,
}

impl ResolvedShard {
    pub fn new(keyspace: impl Into<String>, shard: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            shard: shard.into(),
        }
    }
}

impl fmt::Display for ResolvedShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.keyspace, self.shard)
    }
}

/// SQL text plus the bind variables to send with it
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub bind_vars: BindVars,
}

impl BoundQuery {
    pub fn new(sql: impl Into<String>, bind_vars: BindVars) -> Self {
        Self {
            sql: sql.into(),
            bind_vars,
        }
    }
}

/// Shard resolution and execution, supplied by the caller of the engine
pub trait VCursor: Send + Sync {
    /// Resolves destinations to shards.
    ///
    /// When `ids` is given it has one entry per destination; the second
    /// return value then holds, per resolved shard, the ids routed to it.
    fn resolve_destinations(
        &self,
        keyspace: &str,
        ids: Option<&[Value]>,
        destinations: &[Destination],
    ) -> EngineResult<(Vec<ResolvedShard>, Vec<Vec<Value>>)>;

    /// Executes one bound query per shard and merges the results.
    ///
    /// `shards` and `queries` are paired by position.
    fn execute_multi_shard(
        &self,
        ctx: &ExecContext,
        shards: &[ResolvedShard],
        queries: &[BoundQuery],
        want_fields: bool,
    ) -> EngineResult<ResultSet>;

    /// Maximum number of rows an operator may hold in memory
    fn max_memory_rows(&self) -> usize;

    fn exceeds_max_memory_rows(&self, rows: usize) -> bool {
        rows > self.max_memory_rows()
    }
}
