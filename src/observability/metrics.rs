//! Execution counters
//!
//! Counters only, monotonic, relaxed atomics. One registry is shared by every
//! primitive of a query through the execution context.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Bound queries sent to shards
    shard_queries: AtomicU64,
    /// Route executions that targeted more than one shard
    scatter_queries: AtomicU64,
    /// Rows returned by shards to routes
    rows_returned: AtomicU64,
    /// Joins rejected by the in-memory row ceiling
    memory_limit_rejections: AtomicU64,
    /// Top-level queries that completed
    queries_executed: AtomicU64,
    /// Top-level queries that failed
    queries_failed: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one route dispatch to `shards` shards
    pub fn record_route(&self, shards: usize, rows: usize) {
        self.shard_queries.fetch_add(shards as u64, Ordering::Relaxed);
        if shards > 1 {
            self.scatter_queries.fetch_add(1, Ordering::Relaxed);
        }
        self.rows_returned.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn increment_memory_limit_rejections(&self) {
        self.memory_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            shard_queries: self.shard_queries.load(Ordering::Relaxed),
            scatter_queries: self.scatter_queries.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            memory_limit_rejections: self.memory_limit_rejections.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub shard_queries: u64,
    pub scatter_queries: u64,
    pub rows_returned: u64,
    pub memory_limit_rejections: u64,
    pub queries_executed: u64,
    pub queries_failed: u64,
}
