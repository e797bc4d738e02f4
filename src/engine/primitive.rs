//! The operator contract shared by every primitive

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::EngineResult;
use crate::sqltypes::{BindVars, ResultSet};

/// A node in the operator tree.
///
/// Every call runs to completion and materializes its result. Errors from a
/// child are returned unchanged and stop execution; nothing is retried.
pub trait Primitive: Send + Sync + fmt::Debug {
    /// Short operator name, e.g. "Route"
    fn operator_type(&self) -> &'static str;

    /// Runs the operator. `want_fields` asks for field metadata even when
    /// no rows are produced.
    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet>;

    /// Returns fields only, without scanning data.
    ///
    /// Equals the fields of `execute(.., want_fields = true)` for the same
    /// inputs.
    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet>;

    /// True if any leaf below requires a transaction
    fn needs_transaction(&self) -> bool;

    /// Direct children; leaves return nothing
    fn inputs(&self) -> Vec<&dyn Primitive>;

    /// Operator-specific EXPLAIN details, without children
    fn description(&self) -> PrimitiveDescription;
}

/// EXPLAIN output for one primitive
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PrimitiveDescription {
    pub operator_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_destination: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PrimitiveDescription>,
}

impl PrimitiveDescription {
    pub fn new(operator_type: &str, variant: impl Into<String>) -> Self {
        Self {
            operator_type: operator_type.to_string(),
            variant: variant.into(),
            ..Self::default()
        }
    }

    /// Adds an operator-specific detail
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.other.insert(key.to_string(), v);
        }
        self
    }
}
