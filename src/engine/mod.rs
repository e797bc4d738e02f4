//! Primitive execution engine
//!
//! A query arrives as a tree of primitives already built by a planner. Each
//! non-leaf primitive executes its children synchronously, post-processes
//! the materialized result and returns it. [`Route`] is the only leaf that
//! reaches shards, always through a [`VCursor`].
//!
//! # Operators
//!
//! - Route: resolve shards, execute, optionally merge-sort
//! - Join: nested loop with bind-variable correlation
//! - OrderedAggregate / ScalarAggregate: streaming fold
//! - MemorySort: materialize then sort
//! - Distinct: hash de-duplication
//! - Limit: offset/count windowing
//! - Concatenate: parallel union
//! - Filter / Projection: row-wise predicate and expression evaluation
//!
//! # Failure model
//!
//! The first error from a child or an internal check aborts the whole
//! execute call. Nothing is retried and no partial result is returned.

mod aggregations;
mod comparer;
mod concatenate;
mod context;
mod cursor;
mod distinct;
mod errors;
pub mod explain;
mod filter;
mod join;
mod limit;
mod memory_sort;
mod ordered_aggregate;
mod primitive;
mod projection;
mod route;
mod routing;
mod scalar_aggregate;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregations::{AggregateOpcode, AggregateParam};
pub use comparer::{OrderByParam, RowComparator};
pub use concatenate::Concatenate;
pub use context::ExecContext;
pub use cursor::{BoundQuery, Destination, ResolvedShard, VCursor};
pub use distinct::{CheckColumn, Distinct, ProbeTable};
pub use errors::{EngineError, EngineErrorCode, EngineResult, Severity};
pub use filter::Filter;
pub use join::{Join, JoinOpcode};
pub use limit::{Limit, UPPER_LIMIT_VAR};
pub use memory_sort::MemorySort;
pub use ordered_aggregate::{GroupByKey, OrderedAggregate};
pub use primitive::{Primitive, PrimitiveDescription};
pub use projection::{Projection, ProjectionColumn};
pub use route::Route;
pub use routing::{RouteOpcode, RoutingParameters, LIST_VAR, SCHEMA_NAME_VAR, REPLACE_SCHEMA_NAME_VAR};
pub use scalar_aggregate::ScalarAggregate;
