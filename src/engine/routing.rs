//! Shard selection for a route

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cursor::{Destination, ResolvedShard, VCursor};
use super::errors::{EngineError, EngineResult};
use crate::evalengine::{EvalResult, Expr, ExprEnv};
use crate::observability::{log_event_at, Event, Severity};
use crate::sqltypes::{extend_bind_vars, BindVariable, BindVars, Value};
use crate::vindexes::SingleColumnVindex;

/// Per-shard list variable bound by IN routes
pub const LIST_VAR: &str = "__vals";
/// Schema name bound by system-schema routes
pub const SCHEMA_NAME_VAR: &str = "__vtschemaname";
/// Set when the schema name resolved to a keyspace and must be rewritten
pub const REPLACE_SCHEMA_NAME_VAR: &str = "__replacevtschemaname";

const SYSTEM_SCHEMAS: [&str; 4] = ["information_schema", "mysql", "performance_schema", "sys"];

/// How a route picks its shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteOpcode {
    /// The keyspace's single shard
    Unsharded,
    /// One shard, chosen by a unique vindex value
    EqualUnique,
    /// Shards mapped from one vindex value
    Equal,
    /// Shards mapped from a tuple of values; each gets its own subset
    #[serde(rename = "IN")]
    In,
    /// Shards mapped from a tuple of values, sharing all bind variables
    MultiEqual,
    /// Every shard
    Scatter,
    /// Every shard, for sequence queries
    Next,
    /// System-schema query, routed by schema name
    #[serde(rename = "DBA")]
    Dba,
    /// Any one shard of a reference keyspace
    Reference,
    /// No shard at all
    None,
    /// The fixed target destination
    ByDestination,
}

impl RouteOpcode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOpcode::Unsharded => "Unsharded",
            RouteOpcode::EqualUnique => "EqualUnique",
            RouteOpcode::Equal => "Equal",
            RouteOpcode::In => "IN",
            RouteOpcode::MultiEqual => "MultiEqual",
            RouteOpcode::Scatter => "Scatter",
            RouteOpcode::Next => "Next",
            RouteOpcode::Dba => "DBA",
            RouteOpcode::Reference => "Reference",
            RouteOpcode::None => "None",
            RouteOpcode::ByDestination => "ByDestination",
        }
    }

    /// True if the opcode maps values through a vindex
    pub fn uses_vindex(&self) -> bool {
        matches!(
            self,
            RouteOpcode::EqualUnique | RouteOpcode::Equal | RouteOpcode::In | RouteOpcode::MultiEqual
        )
    }
}

impl fmt::Display for RouteOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything needed to find a route's shards.
///
/// Immutable per route; `values` and `system_table_schema` are evaluated
/// against the bind variables of every call.
#[derive(Debug, Clone)]
pub struct RoutingParameters {
    pub opcode: RouteOpcode,
    pub keyspace: String,
    pub vindex: Option<Arc<dyn SingleColumnVindex>>,
    pub values: Vec<Expr>,
    pub target_destination: Option<Destination>,
    /// Schema-name expressions of a system-schema query
    pub system_table_schema: Vec<Expr>,
}

/// Shards plus one bind-variable map per shard
pub type RouteTargets = (Vec<ResolvedShard>, Vec<BindVars>);

impl RoutingParameters {
    pub fn new(opcode: RouteOpcode, keyspace: impl Into<String>) -> Self {
        Self {
            opcode,
            keyspace: keyspace.into(),
            vindex: None,
            values: Vec::new(),
            target_destination: None,
            system_table_schema: Vec::new(),
        }
    }

    pub fn with_vindex(mut self, vindex: Arc<dyn SingleColumnVindex>, values: Vec<Expr>) -> Self {
        self.vindex = Some(vindex);
        self.values = values;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.target_destination = Some(destination);
        self
    }

    pub fn with_system_table_schema(mut self, exprs: Vec<Expr>) -> Self {
        self.system_table_schema = exprs;
        self
    }

    /// Resolves the shards for this call
    pub fn find_route(&self, cursor: &dyn VCursor, bind_vars: &BindVars) -> EngineResult<RouteTargets> {
        match self.opcode {
            RouteOpcode::Dba => self.system_query(cursor, bind_vars),
            RouteOpcode::Unsharded => {
                let targets = self.by_destination(cursor, bind_vars, &Destination::AllShards)?;
                if targets.0.len() != 1 {
                    return Err(EngineError::routing(format!(
                        "keyspace {} does not have exactly one shard: {}",
                        self.keyspace,
                        describe_shards(&targets.0)
                    )));
                }
                Ok(targets)
            }
            RouteOpcode::Scatter | RouteOpcode::Next => {
                self.by_destination(cursor, bind_vars, &Destination::AllShards)
            }
            RouteOpcode::Reference => self.by_destination(cursor, bind_vars, &Destination::AnyShard),
            RouteOpcode::None => Ok((Vec::new(), Vec::new())),
            RouteOpcode::ByDestination => {
                let destination = self.target_destination.as_ref().ok_or_else(|| {
                    EngineError::internal("ByDestination route without a target destination")
                })?;
                self.by_destination(cursor, bind_vars, destination)
            }
            RouteOpcode::EqualUnique | RouteOpcode::Equal => {
                let value = self.value(0)?.evaluate_value(ExprEnv::new(bind_vars))?;
                self.equal(cursor, bind_vars, value)
            }
            RouteOpcode::In => {
                let ids = self.tuple_values(bind_vars)?;
                self.in_list(cursor, bind_vars, ids)
            }
            RouteOpcode::MultiEqual => {
                let ids = self.tuple_values(bind_vars)?;
                self.multi_equal(cursor, bind_vars, ids)
            }
        }
    }

    fn value(&self, idx: usize) -> EngineResult<&Expr> {
        self.values.get(idx).ok_or_else(|| {
            EngineError::internal(format!("{} route without a routing value", self.opcode))
        })
    }

    fn vindex(&self) -> EngineResult<&dyn SingleColumnVindex> {
        self.vindex
            .as_deref()
            .ok_or_else(|| EngineError::internal(format!("{} route without a vindex", self.opcode)))
    }

    fn tuple_values(&self, bind_vars: &BindVars) -> EngineResult<Vec<Value>> {
        match self.value(0)?.evaluate(ExprEnv::new(bind_vars))? {
            EvalResult::Tuple(values) => Ok(values),
            EvalResult::Value(value) => Ok(vec![value]),
        }
    }

    fn by_destination(
        &self,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        destination: &Destination,
    ) -> EngineResult<RouteTargets> {
        self.by_destination_in(&self.keyspace, cursor, bind_vars, destination)
    }

    fn by_destination_in(
        &self,
        keyspace: &str,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        destination: &Destination,
    ) -> EngineResult<RouteTargets> {
        let (shards, _) =
            cursor.resolve_destinations(keyspace, None, std::slice::from_ref(destination))?;
        let vars = vec![bind_vars.clone(); shards.len()];
        Ok((shards, vars))
    }

    fn equal(&self, cursor: &dyn VCursor, bind_vars: &BindVars, value: Value) -> EngineResult<RouteTargets> {
        let ids = [value];
        let destinations = self.vindex()?.map(cursor, &ids)?;
        let (shards, _) = cursor.resolve_destinations(&self.keyspace, Some(&ids), &destinations)?;
        let vars = vec![bind_vars.clone(); shards.len()];
        Ok((shards, vars))
    }

    /// Each shard receives only the values that map to it, as `__vals`
    fn in_list(&self, cursor: &dyn VCursor, bind_vars: &BindVars, ids: Vec<Value>) -> EngineResult<RouteTargets> {
        let destinations = self.vindex()?.map(cursor, &ids)?;
        let (shards, values) = cursor.resolve_destinations(&self.keyspace, Some(&ids), &destinations)?;
        if values.len() != shards.len() {
            return Err(EngineError::internal(format!(
                "resolver returned {} value lists for {} shards",
                values.len(),
                shards.len()
            )));
        }
        let vars = values
            .into_iter()
            .map(|shard_ids| {
                extend_bind_vars(
                    bind_vars,
                    [(LIST_VAR.to_string(), BindVariable::tuple(shard_ids))],
                )
            })
            .collect();
        Ok((shards, vars))
    }

    fn multi_equal(&self, cursor: &dyn VCursor, bind_vars: &BindVars, ids: Vec<Value>) -> EngineResult<RouteTargets> {
        let destinations = self.vindex()?.map(cursor, &ids)?;
        let (shards, _) = cursor.resolve_destinations(&self.keyspace, Some(&ids), &destinations)?;
        let vars = vec![bind_vars.clone(); shards.len()];
        Ok((shards, vars))
    }

    /// Routes a system-schema query by the schema name it filters on.
    ///
    /// System schemas, unknown keyspaces and queries without a schema name
    /// go to any shard of the route's own keyspace.
    fn system_query(&self, cursor: &dyn VCursor, bind_vars: &BindVars) -> EngineResult<RouteTargets> {
        let mut schema: Option<String> = None;
        for expr in &self.system_table_schema {
            let name = expr.evaluate_value(ExprEnv::new(bind_vars))?.to_string();
            match &schema {
                Some(existing) if *existing != name => {
                    return Err(EngineError::routing(format!(
                        "can't use more than one keyspace per system table query - found both '{}' and '{}'",
                        existing, name
                    )));
                }
                _ => schema = Some(name),
            }
        }

        let name = match schema {
            Some(name) => name,
            None => return self.by_destination(cursor, bind_vars, &Destination::AnyShard),
        };
        let mut vars = extend_bind_vars(
            bind_vars,
            [(SCHEMA_NAME_VAR.to_string(), BindVariable::single(name.as_str()))],
        );

        let is_system = SYSTEM_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(&name));
        if !is_system {
            match cursor.resolve_destinations(&name, None, &[Destination::AnyShard]) {
                Ok((shards, _)) if !shards.is_empty() => {
                    vars.insert(REPLACE_SCHEMA_NAME_VAR.to_string(), BindVariable::single(1i64));
                    let all = vec![vars; shards.len()];
                    return Ok((shards, all));
                }
                Ok(_) | Err(_) => {}
            }
        }

        log_event_at(
            Severity::Info,
            Event::SystemQueryFallback,
            &[("schema", name.as_str()), ("keyspace", self.keyspace.as_str())],
        );
        self.by_destination(cursor, &vars, &Destination::AnyShard)
    }

    /// Human-readable routing values for EXPLAIN
    pub fn describe_values(&self) -> Vec<String> {
        self.values.iter().map(describe_expr).collect()
    }
}

fn describe_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(v) => v.to_string(),
        Expr::BindVar(name) => format!(":{}", name),
        Expr::TupleBindVar(name) => format!("::{}", name),
        Expr::Tuple(items) => {
            let items: Vec<String> = items.iter().map(describe_expr).collect();
            format!("({})", items.join(", "))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn describe_shards(shards: &[ResolvedShard]) -> String {
    let names: Vec<String> = shards.iter().map(|s| s.to_string()).collect();
    format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::FakeCursor;
    use crate::engine::EngineErrorCode;
    use crate::vindexes;

    fn cursor() -> FakeCursor {
        FakeCursor::new(&["user", "main"], &["-40", "40-80", "80-c0", "c0-"])
    }

    fn shard_names(targets: &RouteTargets) -> Vec<String> {
        targets.0.iter().map(|s| s.shard.clone()).collect()
    }

    #[test]
    fn test_scatter_and_reference() {
        let scatter = RoutingParameters::new(RouteOpcode::Scatter, "user");
        let targets = scatter.find_route(&cursor(), &BindVars::new()).unwrap();
        assert_eq!(targets.0.len(), 4);
        assert_eq!(targets.1.len(), 4);

        let reference = RoutingParameters::new(RouteOpcode::Reference, "user");
        let targets = reference.find_route(&cursor(), &BindVars::new()).unwrap();
        assert_eq!(targets.0.len(), 1);
    }

    #[test]
    fn test_unsharded_requires_one_shard() {
        let params = RoutingParameters::new(RouteOpcode::Unsharded, "user");
        let err = params.find_route(&cursor(), &BindVars::new()).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::Routing);

        let single = FakeCursor::new(&["main"], &["-"]);
        let params = RoutingParameters::new(RouteOpcode::Unsharded, "main");
        assert_eq!(params.find_route(&single, &BindVars::new()).unwrap().0.len(), 1);
    }

    #[test]
    fn test_none_routes_nowhere() {
        let params = RoutingParameters::new(RouteOpcode::None, "user");
        let targets = params.find_route(&cursor(), &BindVars::new()).unwrap();
        assert!(targets.0.is_empty());
    }

    #[test]
    fn test_equal_unique_maps_through_vindex() {
        let params = RoutingParameters::new(RouteOpcode::EqualUnique, "user").with_vindex(
            vindexes::create("binary").unwrap(),
            vec![Expr::bind_var("id")],
        );
        let mut bv = BindVars::new();
        bv.insert("id".into(), BindVariable::Single(Value::Binary(vec![0x90])));
        let targets = params.find_route(&cursor(), &bv).unwrap();
        assert_eq!(shard_names(&targets), vec!["80-c0"]);
        assert_eq!(targets.1[0], bv);
    }

    #[test]
    fn test_in_splits_values_per_shard() {
        let params = RoutingParameters::new(RouteOpcode::In, "user").with_vindex(
            vindexes::create("binary").unwrap(),
            vec![Expr::TupleBindVar("ids".into())],
        );
        let ids = vec![
            Value::Binary(vec![0x10]),
            Value::Binary(vec![0xd0]),
            Value::Binary(vec![0x20]),
        ];
        let mut bv = BindVars::new();
        bv.insert("ids".into(), BindVariable::tuple(ids.clone()));

        let targets = params.find_route(&cursor(), &bv).unwrap();
        assert_eq!(shard_names(&targets), vec!["-40", "c0-"]);
        assert_eq!(
            targets.1[0].get(LIST_VAR),
            Some(&BindVariable::tuple(vec![ids[0].clone(), ids[2].clone()]))
        );
        assert_eq!(
            targets.1[1].get(LIST_VAR),
            Some(&BindVariable::tuple(vec![ids[1].clone()]))
        );
    }

    #[test]
    fn test_multi_equal_keeps_bind_vars() {
        let params = RoutingParameters::new(RouteOpcode::MultiEqual, "user").with_vindex(
            vindexes::create("binary").unwrap(),
            vec![Expr::Tuple(vec![
                Expr::literal(Value::Binary(vec![0x50])),
                Expr::literal(Value::Binary(vec![0x90])),
            ])],
        );
        let targets = params.find_route(&cursor(), &BindVars::new()).unwrap();
        assert_eq!(shard_names(&targets), vec!["40-80", "80-c0"]);
        assert!(targets.1.iter().all(|v| v.is_empty()));
    }

    #[test]
    fn test_missing_vindex_is_internal() {
        let mut params = RoutingParameters::new(RouteOpcode::Equal, "user");
        params.values = vec![Expr::literal(1i64)];
        let err = params.find_route(&cursor(), &BindVars::new()).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::Internal);
    }

    #[test]
    fn test_by_destination() {
        let params = RoutingParameters::new(RouteOpcode::ByDestination, "user")
            .with_destination(Destination::Shards(vec!["c0-".into(), "-40".into()]));
        let targets = params.find_route(&cursor(), &BindVars::new()).unwrap();
        assert_eq!(shard_names(&targets), vec!["c0-", "-40"]);
    }

    #[test]
    fn test_unknown_keyspace_is_routing_error() {
        let params = RoutingParameters::new(RouteOpcode::Scatter, "nope");
        let err = params.find_route(&cursor(), &BindVars::new()).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::Routing);
    }

    #[test]
    fn test_system_query_resolves_schema_keyspace() {
        let params = RoutingParameters::new(RouteOpcode::Dba, "main")
            .with_system_table_schema(vec![Expr::literal("user")]);
        let targets = params.find_route(&cursor(), &BindVars::new()).unwrap();
        assert_eq!(targets.0[0].keyspace, "user");
        assert_eq!(
            targets.1[0].get(SCHEMA_NAME_VAR),
            Some(&BindVariable::single("user"))
        );
        assert_eq!(
            targets.1[0].get(REPLACE_SCHEMA_NAME_VAR),
            Some(&BindVariable::single(1i64))
        );
    }

    #[test]
    fn test_system_query_falls_back() {
        for schema in ["information_schema", "unknown_db"] {
            let params = RoutingParameters::new(RouteOpcode::Dba, "main")
                .with_system_table_schema(vec![Expr::literal(schema)]);
            let targets = params.find_route(&cursor(), &BindVars::new()).unwrap();
            assert_eq!(targets.0.len(), 1);
            assert_eq!(targets.0[0].keyspace, "main");
            assert_eq!(
                targets.1[0].get(SCHEMA_NAME_VAR),
                Some(&BindVariable::single(schema))
            );
            assert!(!targets.1[0].contains_key(REPLACE_SCHEMA_NAME_VAR));
        }
    }

    #[test]
    fn test_system_query_two_schemas_is_routing_error() {
        let params = RoutingParameters::new(RouteOpcode::Dba, "main").with_system_table_schema(vec![
            Expr::literal("user"),
            Expr::literal("main"),
        ]);
        let err = params.find_route(&cursor(), &BindVars::new()).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::Routing);
        assert!(err.message().contains("more than one keyspace"));
    }

    #[test]
    fn test_opcode_serde_names() {
        let op: RouteOpcode = serde_json::from_str("\"IN\"").unwrap();
        assert_eq!(op, RouteOpcode::In);
        let op: RouteOpcode = serde_json::from_str("\"EqualUnique\"").unwrap();
        assert_eq!(op, RouteOpcode::EqualUnique);
        assert_eq!(serde_json::to_string(&RouteOpcode::Dba).unwrap(), "\"DBA\"");
    }
}
