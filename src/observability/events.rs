//! Observable engine events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events emitted by the engine and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file loaded
    ConfigLoaded,
    /// Plan file loaded and built
    PlanLoaded,

    // Routing
    /// A route dispatched its query to resolved shards
    RouteExecute,
    /// A route resolved to zero shards
    RouteNoShards,
    /// A system-schema query fell back to the default keyspace
    SystemQueryFallback,

    // Operators
    /// A join exceeded the in-memory row ceiling
    JoinMemoryLimit,
    /// Concatenate dispatched its sources
    ConcatenateFanout,
    /// A concatenate source failed
    ConcatenateSourceFailed,
    /// An internal invariant was violated
    InvariantViolated,

    // Query lifecycle
    /// Query executed successfully
    QueryComplete,
    /// Query failed
    QueryFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::PlanLoaded => "PLAN_LOADED",
            Event::RouteExecute => "ROUTE_EXECUTE",
            Event::RouteNoShards => "ROUTE_NO_SHARDS",
            Event::SystemQueryFallback => "SYSTEM_QUERY_FALLBACK",
            Event::JoinMemoryLimit => "JOIN_MEMORY_LIMIT",
            Event::ConcatenateFanout => "CONCATENATE_FANOUT",
            Event::ConcatenateSourceFailed => "CONCATENATE_SOURCE_FAILED",
            Event::InvariantViolated => "INVARIANT_VIOLATED",
            Event::QueryComplete => "QUERY_COMPLETE",
            Event::QueryFailed => "QUERY_FAILED",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::InvariantViolated)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
