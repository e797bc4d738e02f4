//! Test doubles for primitives and the shard cursor

use std::collections::VecDeque;
use std::sync::{Arc, Barrier, Mutex};

use super::context::ExecContext;
use super::cursor::{BoundQuery, Destination, ResolvedShard, VCursor};
use super::errors::{EngineError, EngineResult};
use super::primitive::{Primitive, PrimitiveDescription};
use crate::sqltypes::{BindVars, Field, ResultSet, Row, SqlType, Value};

/// Builds a result from `name:type` field specs and rows
pub(crate) fn make_result(fields: &[(&str, SqlType)], rows: Vec<Row>) -> ResultSet {
    ResultSet::new(
        fields.iter().map(|(n, t)| Field::new(*n, *t)).collect(),
        rows,
    )
}

pub(crate) fn int_rows(rows: &[&[i64]]) -> Vec<Row> {
    rows.iter()
        .map(|r| r.iter().map(|v| Value::Int64(*v)).collect())
        .collect()
}

/// A recorded call on a fake primitive
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FakeCall {
    Execute { bind_vars: BindVars, want_fields: bool },
    GetFields { bind_vars: BindVars },
}

/// A primitive that replays canned results in order
#[derive(Debug, Default)]
pub(crate) struct FakePrimitive {
    results: Vec<ResultSet>,
    next: Mutex<usize>,
    error: Option<EngineError>,
    needs_transaction: bool,
    calls: Mutex<Vec<FakeCall>>,
    /// Every execute waits here before answering
    barrier: Option<Arc<Barrier>>,
}

impl FakePrimitive {
    pub(crate) fn new(results: Vec<ResultSet>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    pub(crate) fn failing(error: EngineError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub(crate) fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub(crate) fn transactional(mut self) -> Self {
        self.needs_transaction = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn boxed(self) -> Box<dyn Primitive> {
        Box::new(self)
    }
}

impl Primitive for FakePrimitive {
    fn operator_type(&self) -> &'static str {
        "Fake"
    }

    fn execute(
        &self,
        _ctx: &ExecContext,
        _cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        self.calls.lock().unwrap().push(FakeCall::Execute {
            bind_vars: bind_vars.clone(),
            want_fields,
        });
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let mut next = self.next.lock().unwrap();
        let result = self.results.get(*next).cloned().unwrap_or_default();
        *next += 1;
        Ok(result)
    }

    fn get_fields(
        &self,
        _ctx: &ExecContext,
        _cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        self.calls.lock().unwrap().push(FakeCall::GetFields {
            bind_vars: bind_vars.clone(),
        });
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(ResultSet::fields_only(
            self.results.first().map(|r| r.fields.clone()).unwrap_or_default(),
        ))
    }

    fn needs_transaction(&self) -> bool {
        self.needs_transaction
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        Vec::new()
    }

    fn description(&self) -> PrimitiveDescription {
        PrimitiveDescription::new("Fake", "")
    }
}

/// Shared handle, so a test can inspect calls after boxing the fake
impl Primitive for Arc<FakePrimitive> {
    fn operator_type(&self) -> &'static str {
        self.as_ref().operator_type()
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        self.as_ref().execute(ctx, cursor, bind_vars, want_fields)
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        self.as_ref().get_fields(ctx, cursor, bind_vars)
    }

    fn needs_transaction(&self) -> bool {
        self.as_ref().needs_transaction()
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        Vec::new()
    }

    fn description(&self) -> PrimitiveDescription {
        self.as_ref().description()
    }
}

/// A recorded multi-shard execution
#[derive(Debug, Clone)]
pub(crate) struct ExecutedBatch {
    pub shards: Vec<ResolvedShard>,
    pub queries: Vec<BoundQuery>,
    pub want_fields: bool,
}

/// A cursor with evenly split shards, canned results and a call log
#[derive(Debug)]
pub(crate) struct FakeCursor {
    keyspaces: Vec<String>,
    shards: Vec<String>,
    results: Mutex<VecDeque<EngineResult<ResultSet>>>,
    max_rows: usize,
    executed: Mutex<Vec<ExecutedBatch>>,
}

impl FakeCursor {
    pub(crate) fn new(keyspaces: &[&str], shards: &[&str]) -> Self {
        Self {
            keyspaces: keyspaces.iter().map(|s| s.to_string()).collect(),
            shards: shards.iter().map(|s| s.to_string()).collect(),
            results: Mutex::new(VecDeque::new()),
            max_rows: usize::MAX,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_results(self, results: Vec<EngineResult<ResultSet>>) -> Self {
        *self.results.lock().unwrap() = results.into();
        self
    }

    pub(crate) fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub(crate) fn executed(&self) -> Vec<ExecutedBatch> {
        self.executed.lock().unwrap().clone()
    }

    fn shard_for_id(&self, id: &[u8]) -> usize {
        let first = id.first().copied().unwrap_or(0) as usize;
        first * self.shards.len() / 256
    }
}

impl VCursor for FakeCursor {
    fn resolve_destinations(
        &self,
        keyspace: &str,
        ids: Option<&[Value]>,
        destinations: &[Destination],
    ) -> EngineResult<(Vec<ResolvedShard>, Vec<Vec<Value>>)> {
        if !self.keyspaces.iter().any(|k| k == keyspace) {
            return Err(EngineError::routing(format!("keyspace {} not found", keyspace)));
        }
        let mut shards: Vec<usize> = Vec::new();
        let mut values: Vec<Vec<Value>> = Vec::new();
        for (i, dest) in destinations.iter().enumerate() {
            let targets: Vec<usize> = match dest {
                Destination::AllShards => (0..self.shards.len()).collect(),
                Destination::AnyShard => vec![0],
                Destination::None => Vec::new(),
                Destination::Shard(s) => self.shards.iter().position(|x| x == s).into_iter().collect(),
                Destination::Shards(list) => list
                    .iter()
                    .filter_map(|s| self.shards.iter().position(|x| x == s))
                    .collect(),
                Destination::KeyspaceId(id) => vec![self.shard_for_id(id)],
                Destination::KeyspaceIds(ids) => ids.iter().map(|id| self.shard_for_id(id)).collect(),
            };
            for target in targets {
                let slot = match shards.iter().position(|s| *s == target) {
                    Some(slot) => slot,
                    None => {
                        shards.push(target);
                        values.push(Vec::new());
                        shards.len() - 1
                    }
                };
                if let Some(id) = ids.and_then(|ids| ids.get(i)) {
                    values[slot].push(id.clone());
                }
            }
        }
        let resolved = shards
            .into_iter()
            .map(|i| ResolvedShard::new(keyspace, self.shards[i].clone()))
            .collect();
        Ok((resolved, values))
    }

    fn execute_multi_shard(
        &self,
        _ctx: &ExecContext,
        shards: &[ResolvedShard],
        queries: &[BoundQuery],
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        self.executed.lock().unwrap().push(ExecutedBatch {
            shards: shards.to_vec(),
            queries: queries.to_vec(),
            want_fields,
        });
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ResultSet::default()))
    }

    fn max_memory_rows(&self) -> usize {
        self.max_rows
    }
}
