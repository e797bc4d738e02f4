//! shardgate - execution primitives for a sharded SQL proxy
//!
//! A planner hands the engine a tree of [`engine::Primitive`]s. The engine
//! executes the tree against shards reached through an [`engine::VCursor`]
//! and merges, joins, aggregates, sorts and limits the shard results in
//! memory.

pub mod cli;
pub mod engine;
pub mod evalengine;
pub mod observability;
pub mod plan;
pub mod sqltypes;
pub mod topology;
pub mod vindexes;
