//! Execution context
//!
//! Carried through every primitive call. Only the shard executor consults
//! the deadline; primitives never cancel mid-flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::observability::MetricsRegistry;

#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Request ID for log correlation
    pub request_id: Uuid,
    /// Point in time after which shard calls must fail
    pub deadline: Option<Instant>,
    /// Counters shared by every primitive of the query
    pub metrics: Arc<MetricsRegistry>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline: None,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_metrics(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            metrics,
            ..Self::new()
        }
    }

    /// Returns a child context whose deadline is at most `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            request_id: self.request_id,
            deadline: Some(deadline),
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Request ID rendered for log fields
    pub fn request_id_str(&self) -> String {
        self.request_id.to_string()
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}
