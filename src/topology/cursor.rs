//! In-process cursor over a static topology

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::keyrange::KeyRange;
use super::{CannedQuery, Topology};
use crate::engine::{
    BoundQuery, Destination, EngineError, EngineResult, ExecContext, ResolvedShard, VCursor,
};
use crate::sqltypes::{ResultSet, Value};

/// Join row ceiling used when no configuration overrides it
pub const DEFAULT_MAX_MEMORY_ROWS: usize = 300_000;

/// One query as it was sent to one shard
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedQuery {
    pub shard: ResolvedShard,
    pub query: BoundQuery,
}

#[derive(Debug)]
struct Shard {
    name: String,
    range: KeyRange,
    queries: Vec<CannedQuery>,
}

#[derive(Debug)]
struct Keyspace {
    /// Ordered by range start
    shards: Vec<Shard>,
}

impl Keyspace {
    fn shard_index(&self, keyspace: &str, name: &str) -> EngineResult<usize> {
        self.shards
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| {
                EngineError::routing(format!("shard {} not found in keyspace {}", name, keyspace))
            })
    }

    fn shard_for_id(&self, keyspace: &str, id: &[u8]) -> EngineResult<usize> {
        self.shards
            .iter()
            .position(|s| s.range.contains(id))
            .ok_or_else(|| {
                EngineError::routing(format!(
                    "no shard in keyspace {} covers keyspace id {}",
                    keyspace,
                    hex(id)
                ))
            })
    }
}

/// A [`VCursor`] that answers from canned per-shard results.
///
/// Every executed query is recorded, so tests can check exactly which
/// shards received what.
#[derive(Debug)]
pub struct StaticCursor {
    keyspaces: BTreeMap<String, Keyspace>,
    max_memory_rows: usize,
    executed: Mutex<Vec<ExecutedQuery>>,
}

impl StaticCursor {
    /// Builds a cursor, validating every shard name.
    ///
    /// An unsharded keyspace must have exactly one shard.
    pub fn new(topology: Topology) -> EngineResult<Self> {
        let mut keyspaces = BTreeMap::new();
        for (name, spec) in topology.keyspaces {
            if !spec.sharded && spec.shards.len() != 1 {
                return Err(EngineError::invalid_argument(format!(
                    "unsharded keyspace {} must have exactly one shard, found {}",
                    name,
                    spec.shards.len()
                )));
            }
            let mut shards = spec
                .shards
                .into_iter()
                .map(|(shard_name, shard)| -> EngineResult<Shard> {
                    Ok(Shard {
                        range: KeyRange::parse(&shard_name)?,
                        name: shard_name,
                        queries: shard.queries,
                    })
                })
                .collect::<EngineResult<Vec<_>>>()?;
            shards.sort_by(|a, b| a.range.start.cmp(&b.range.start));
            keyspaces.insert(name, Keyspace { shards });
        }
        Ok(Self {
            keyspaces,
            max_memory_rows: DEFAULT_MAX_MEMORY_ROWS,
            executed: Mutex::new(Vec::new()),
        })
    }

    pub fn with_max_memory_rows(mut self, rows: usize) -> Self {
        self.max_memory_rows = rows;
        self
    }

    /// Every query executed so far, in execution order
    pub fn executed(&self) -> Vec<ExecutedQuery> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn keyspace(&self, name: &str) -> EngineResult<&Keyspace> {
        self.keyspaces
            .get(name)
            .ok_or_else(|| EngineError::routing(format!("keyspace {} not found", name)))
    }

    fn targets(&self, keyspace: &str, ks: &Keyspace, dest: &Destination) -> EngineResult<Vec<usize>> {
        match dest {
            Destination::AllShards => Ok((0..ks.shards.len()).collect()),
            Destination::AnyShard => {
                if ks.shards.is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![0])
                }
            }
            Destination::None => Ok(Vec::new()),
            Destination::Shard(name) => Ok(vec![ks.shard_index(keyspace, name)?]),
            Destination::Shards(names) => names
                .iter()
                .map(|n| ks.shard_index(keyspace, n))
                .collect(),
            Destination::KeyspaceId(id) => Ok(vec![ks.shard_for_id(keyspace, id)?]),
            Destination::KeyspaceIds(ids) => ids
                .iter()
                .map(|id| ks.shard_for_id(keyspace, id))
                .collect(),
        }
    }

    fn lookup(&self, shard: &ResolvedShard, query: &BoundQuery) -> EngineResult<ResultSet> {
        let ks = self.keyspace(&shard.keyspace)?;
        let index = ks.shard_index(&shard.keyspace, &shard.shard)?;
        ks.shards[index]
            .queries
            .iter()
            .find(|c| c.matches(&query.sql, &query.bind_vars))
            .map(|c| c.result.clone())
            .ok_or_else(|| {
                EngineError::shard_execution(format!(
                    "no result on {} for query: {}",
                    shard, query.sql
                ))
            })
    }
}

impl VCursor for StaticCursor {
    fn resolve_destinations(
        &self,
        keyspace: &str,
        ids: Option<&[Value]>,
        destinations: &[Destination],
    ) -> EngineResult<(Vec<ResolvedShard>, Vec<Vec<Value>>)> {
        let ks = self.keyspace(keyspace)?;
        let mut order: Vec<usize> = Vec::new();
        let mut values: Vec<Vec<Value>> = Vec::new();
        for (i, dest) in destinations.iter().enumerate() {
            for target in self.targets(keyspace, ks, dest)? {
                let slot = match order.iter().position(|s| *s == target) {
                    Some(slot) => slot,
                    None => {
                        order.push(target);
                        values.push(Vec::new());
                        order.len() - 1
                    }
                };
                if let Some(id) = ids.and_then(|ids| ids.get(i)) {
                    values[slot].push(id.clone());
                }
            }
        }
        let shards = order
            .into_iter()
            .map(|i| ResolvedShard::new(keyspace, ks.shards[i].name.as_str()))
            .collect();
        Ok((shards, values))
    }

    fn execute_multi_shard(
        &self,
        ctx: &ExecContext,
        shards: &[ResolvedShard],
        queries: &[BoundQuery],
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        if shards.len() != queries.len() {
            return Err(EngineError::internal(format!(
                "got {} shards but {} queries",
                shards.len(),
                queries.len()
            )));
        }
        if ctx.deadline_exceeded() {
            return Err(EngineError::shard_execution("query deadline exceeded"));
        }

        let mut fields = Vec::new();
        let mut rows = Vec::new();
        for (shard, query) in shards.iter().zip(queries) {
            let result = self.lookup(shard, query)?;
            self.executed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ExecutedQuery {
                    shard: shard.clone(),
                    query: query.clone(),
                });
            if want_fields && fields.is_empty() {
                fields = result.fields;
            }
            rows.extend(result.rows);
        }
        Ok(ResultSet::new(fields, rows))
    }

    fn max_memory_rows(&self) -> usize {
        self.max_memory_rows
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
