//! The leaf primitive that sends queries to shards

use std::time::Duration;

use super::comparer::{describe_order_by, OrderByParam, RowComparator};
use super::context::ExecContext;
use super::cursor::{BoundQuery, Destination, VCursor};
use super::errors::{EngineError, EngineResult};
use super::primitive::{Primitive, PrimitiveDescription};
use super::routing::{RouteOpcode, RoutingParameters};
use crate::observability::{log_event_at, Event, Severity};
use crate::sqltypes::{BindVars, ResultSet};

/// Sends one SQL text to every shard chosen by its routing parameters and
/// merges the per-shard results.
#[derive(Debug)]
pub struct Route {
    pub routing: RoutingParameters,
    /// Query sent to the shards
    pub query: String,
    /// Query that matches no rows, used to learn the fields
    pub field_query: String,
    /// Re-sorts the merged rows when non-empty
    pub order_by: Vec<OrderByParam>,
    pub truncate_column_count: usize,
    /// Zero resolved shards still queries one shard, so aggregates over no
    /// matching rows produce their single row
    pub no_routes_special_handling: bool,
    pub query_timeout_ms: Option<u64>,
    /// Set by the planner for locking reads
    pub needs_transaction: bool,
    pub table_name: String,
}

impl Route {
    pub fn new(
        routing: RoutingParameters,
        query: impl Into<String>,
        field_query: impl Into<String>,
    ) -> Self {
        Self {
            routing,
            query: query.into(),
            field_query: field_query.into(),
            order_by: Vec::new(),
            truncate_column_count: 0,
            no_routes_special_handling: false,
            query_timeout_ms: None,
            needs_transaction: false,
            table_name: String::new(),
        }
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderByParam>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_truncate(mut self, count: usize) -> Self {
        self.truncate_column_count = count;
        self
    }

    pub fn with_no_routes_special_handling(mut self) -> Self {
        self.no_routes_special_handling = true;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.query_timeout_ms = Some(timeout_ms);
        self
    }

    fn query_context(&self, ctx: &ExecContext) -> ExecContext {
        match self.query_timeout_ms {
            Some(ms) => ctx.with_timeout(Duration::from_millis(ms)),
            None => ctx.clone(),
        }
    }

    fn sort(&self, mut result: ResultSet) -> EngineResult<ResultSet> {
        if !self.order_by.is_empty() {
            RowComparator::new(&self.order_by).sort(&mut result.rows)?;
        }
        Ok(result)
    }
}

impl Primitive for Route {
    fn operator_type(&self) -> &'static str {
        "Route"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        let ctx = self.query_context(ctx);
        let (mut shards, mut shard_vars) = self.routing.find_route(cursor, bind_vars)?;

        if shards.is_empty() {
            let handling = self.no_routes_special_handling.to_string();
            log_event_at(
                Severity::Info,
                Event::RouteNoShards,
                &[
                    ("keyspace", self.routing.keyspace.as_str()),
                    ("opcode", self.routing.opcode.as_str()),
                    ("special_handling", handling.as_str()),
                ],
            );
            if !self.no_routes_special_handling {
                if want_fields {
                    return self.get_fields(&ctx, cursor, bind_vars);
                }
                return Ok(ResultSet::default());
            }
            let (any, _) = cursor.resolve_destinations(
                &self.routing.keyspace,
                None,
                &[Destination::AnyShard],
            )?;
            shard_vars = vec![bind_vars.clone(); any.len()];
            shards = any;
        }

        let queries: Vec<BoundQuery> = shard_vars
            .into_iter()
            .map(|vars| BoundQuery::new(self.query.as_str(), vars))
            .collect();
        let result = cursor.execute_multi_shard(&ctx, &shards, &queries, want_fields)?;

        ctx.metrics.record_route(shards.len(), result.rows.len());
        if crate::observability::Logger::enabled(Severity::Trace) {
            let count = shards.len().to_string();
            let rows = result.rows.len().to_string();
            let request_id = ctx.request_id_str();
            log_event_at(
                Severity::Trace,
                Event::RouteExecute,
                &[
                    ("keyspace", self.routing.keyspace.as_str()),
                    ("opcode", self.routing.opcode.as_str()),
                    ("shards", count.as_str()),
                    ("rows", rows.as_str()),
                    ("request_id", request_id.as_str()),
                ],
            );
        }

        let result = self.sort(result)?;
        Ok(result.truncate(self.truncate_column_count))
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        let (shards, _) =
            cursor.resolve_destinations(&self.routing.keyspace, None, &[Destination::AnyShard])?;
        if shards.len() != 1 {
            return Err(EngineError::routing(format!(
                "no shards for keyspace: {}",
                self.routing.keyspace
            )));
        }
        let query = BoundQuery::new(self.field_query.as_str(), bind_vars.clone());
        let ctx = self.query_context(ctx);
        let result = cursor.execute_multi_shard(&ctx, &shards, &[query], true)?;
        Ok(ResultSet::fields_only(result.fields).truncate(self.truncate_column_count))
    }

    fn needs_transaction(&self) -> bool {
        self.needs_transaction
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        Vec::new()
    }

    fn description(&self) -> PrimitiveDescription {
        let mut desc = PrimitiveDescription::new(self.operator_type(), self.routing.opcode.as_str());
        desc.keyspace = Some(self.routing.keyspace.clone());
        desc.target_destination = self.routing.target_destination.as_ref().map(|d| d.to_string());
        desc = desc.with("Query", &self.query);
        if !self.field_query.is_empty() {
            desc = desc.with("FieldQuery", &self.field_query);
        }
        if let Some(vindex) = &self.routing.vindex {
            desc = desc.with("Vindex", vindex.name());
        }
        if !self.routing.values.is_empty() {
            desc = desc.with("Values", self.routing.describe_values());
        }
        if self.routing.opcode == RouteOpcode::Dba && !self.routing.system_table_schema.is_empty() {
            desc = desc.with("SysTableTableSchema", &self.routing.system_table_schema);
        }
        if !self.order_by.is_empty() {
            desc = desc.with("OrderBy", describe_order_by(&self.order_by));
        }
        if self.truncate_column_count > 0 {
            desc = desc.with("ResultColumns", self.truncate_column_count);
        }
        if !self.table_name.is_empty() {
            desc = desc.with("Table", &self.table_name);
        }
        if let Some(ms) = self.query_timeout_ms {
            desc = desc.with("QueryTimeout", ms);
        }
        desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{int_rows, make_result, FakeCursor};
    use crate::engine::{EngineErrorCode, UPPER_LIMIT_VAR};
    use crate::sqltypes::{BindVariable, SqlType, Value};

    fn id_result(rows: &[&[i64]]) -> ResultSet {
        make_result(&[("id", SqlType::Int64), ("ws", SqlType::VarBinary)], int_rows(rows))
    }

    fn scatter(query: &str) -> Route {
        Route::new(
            RoutingParameters::new(RouteOpcode::Scatter, "user"),
            query,
            "select id, ws from t where 1 != 1",
        )
    }

    #[test]
    fn test_scatter_sends_query_to_every_shard() {
        let cursor = FakeCursor::new(&["user"], &["-80", "80-"])
            .with_results(vec![Ok(id_result(&[&[1, 1], &[2, 2]]))]);
        let route = scatter("select id, ws from t");
        let mut bv = BindVars::new();
        bv.insert(UPPER_LIMIT_VAR.into(), BindVariable::single(10i64));

        let ctx = ExecContext::new();
        let result = route.execute(&ctx, &cursor, &bv, false).unwrap();
        assert_eq!(result.rows.len(), 2);

        let executed = cursor.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].shards.len(), 2);
        assert!(executed[0]
            .queries
            .iter()
            .all(|q| q.sql == "select id, ws from t" && q.bind_vars == bv));

        let snapshot = ctx.metrics.snapshot();
        assert_eq!(snapshot.shard_queries, 2);
        assert_eq!(snapshot.scatter_queries, 1);
        assert_eq!(snapshot.rows_returned, 2);
    }

    #[test]
    fn test_order_by_and_truncate() {
        let cursor = FakeCursor::new(&["user"], &["-80", "80-"])
            .with_results(vec![Ok(id_result(&[&[3, 30], &[1, 10], &[2, 20]]))]);
        let route = scatter("select id, ws from t order by ws")
            .with_order_by(vec![OrderByParam::desc(0).with_weight_string(1)])
            .with_truncate(1);
        let result = route
            .execute(&ExecContext::new(), &cursor, &BindVars::new(), true)
            .unwrap();
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.rows, int_rows(&[&[3], &[2], &[1]]));
    }

    #[test]
    fn test_no_shards_without_fields_is_empty() {
        let cursor = FakeCursor::new(&["user"], &["-80", "80-"]);
        let route = Route::new(
            RoutingParameters::new(RouteOpcode::None, "user"),
            "select id from t where 1 = 0",
            "select id from t where 1 != 1",
        );
        let result = route
            .execute(&ExecContext::new(), &cursor, &BindVars::new(), false)
            .unwrap();
        assert!(result.rows.is_empty());
        assert!(result.fields.is_empty());
        assert!(cursor.executed().is_empty());
    }

    #[test]
    fn test_no_shards_with_fields_runs_field_query() {
        let cursor = FakeCursor::new(&["user"], &["-80", "80-"])
            .with_results(vec![Ok(ResultSet::fields_only(vec![crate::sqltypes::Field::new(
                "id",
                SqlType::Int64,
            )]))]);
        let route = Route::new(
            RoutingParameters::new(RouteOpcode::None, "user"),
            "select id from t where 1 = 0",
            "select id from t where 1 != 1",
        );
        let result = route
            .execute(&ExecContext::new(), &cursor, &BindVars::new(), true)
            .unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.fields.len(), 1);

        let executed = cursor.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].queries[0].sql, "select id from t where 1 != 1");
        assert_eq!(executed[0].shards.len(), 1);
    }

    #[test]
    fn test_no_shards_special_handling_uses_any_shard() {
        let cursor = FakeCursor::new(&["user"], &["-80", "80-"]).with_results(vec![Ok(
            make_result(&[("count(*)", SqlType::Int64)], int_rows(&[&[0]])),
        )]);
        let route = Route::new(
            RoutingParameters::new(RouteOpcode::None, "user"),
            "select count(*) from t where x = 'missing'",
            "select count(*) from t where 1 != 1",
        )
        .with_no_routes_special_handling();
        let result = route
            .execute(&ExecContext::new(), &cursor, &BindVars::new(), false)
            .unwrap();
        assert_eq!(result.rows, int_rows(&[&[0]]));
        assert_eq!(cursor.executed()[0].shards.len(), 1);
    }

    #[test]
    fn test_shard_error_propagates() {
        let cursor = FakeCursor::new(&["user"], &["-80", "80-"])
            .with_results(vec![Err(EngineError::shard_execution("connection refused"))]);
        let err = scatter("select 1")
            .execute(&ExecContext::new(), &cursor, &BindVars::new(), false)
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::ShardExecution);
    }

    #[test]
    fn test_incomparable_sort_values_fail() {
        let cursor = FakeCursor::new(&["user"], &["-80", "80-"]).with_results(vec![Ok(
            make_result(
                &[("c", SqlType::VarChar)],
                vec![vec![Value::Int64(1)], vec![Value::text("a")]],
            ),
        )]);
        let route = scatter("select c from t order by c").with_order_by(vec![OrderByParam::asc(0)]);
        let err = route
            .execute(&ExecContext::new(), &cursor, &BindVars::new(), false)
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::TypeMismatch);
    }

    #[test]
    fn test_get_fields_truncates() {
        let cursor = FakeCursor::new(&["user"], &["-80", "80-"]).with_results(vec![Ok(id_result(&[]))]);
        let route = scatter("select id, ws from t").with_truncate(1);
        let fields = route
            .get_fields(&ExecContext::new(), &cursor, &BindVars::new())
            .unwrap();
        assert_eq!(fields.fields.len(), 1);
        assert!(!route.needs_transaction());
    }

    #[test]
    fn test_description() {
        let route = scatter("select id, ws from t").with_timeout_ms(50);
        let desc = route.description();
        assert_eq!(desc.operator_type, "Route");
        assert_eq!(desc.variant, "Scatter");
        assert_eq!(desc.keyspace.as_deref(), Some("user"));
        assert_eq!(desc.other["QueryTimeout"], serde_json::json!(50));
    }
}
