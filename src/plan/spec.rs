//! Serializable plan trees

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::engine::{
    AggregateParam, CheckColumn, Concatenate, Destination, Distinct, EngineError, EngineResult,
    Filter, GroupByKey, Join, JoinOpcode, Limit, MemorySort, OrderByParam, OrderedAggregate,
    Primitive, Projection, ProjectionColumn, Route, RouteOpcode, RoutingParameters,
    ScalarAggregate,
};
use crate::evalengine::Expr;
use crate::vindexes;

/// Route parameters as written in a plan file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub opcode: RouteOpcode,
    pub keyspace: String,
    pub query: String,
    #[serde(default)]
    pub field_query: String,
    /// Vindex type name, see [`vindexes::create`]
    #[serde(default)]
    pub vindex: Option<String>,
    #[serde(default)]
    pub values: Vec<Expr>,
    #[serde(default)]
    pub target_destination: Option<Destination>,
    #[serde(default)]
    pub system_table_schema: Vec<Expr>,
    #[serde(default)]
    pub order_by: Vec<OrderByParam>,
    #[serde(default)]
    pub truncate_column_count: usize,
    #[serde(default)]
    pub no_routes_special_handling: bool,
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,
    #[serde(default)]
    pub needs_transaction: bool,
    #[serde(default)]
    pub table_name: String,
}

/// A primitive tree in declarative form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanSpec {
    Route(RouteSpec),
    Join {
        #[serde(default)]
        opcode: JoinOpcode,
        left: Box<PlanSpec>,
        right: Box<PlanSpec>,
        cols: Vec<i32>,
        #[serde(default)]
        vars: BTreeMap<String, usize>,
    },
    OrderedAggregate {
        input: Box<PlanSpec>,
        aggregates: Vec<AggregateParam>,
        group_by_keys: Vec<GroupByKey>,
        #[serde(default)]
        truncate_column_count: usize,
    },
    ScalarAggregate {
        input: Box<PlanSpec>,
        aggregates: Vec<AggregateParam>,
        #[serde(default)]
        truncate_column_count: usize,
    },
    MemorySort {
        input: Box<PlanSpec>,
        order_by: Vec<OrderByParam>,
        #[serde(default)]
        upper_limit: Option<Expr>,
        #[serde(default)]
        truncate_column_count: usize,
    },
    Distinct {
        input: Box<PlanSpec>,
        check_cols: Vec<CheckColumn>,
        #[serde(default)]
        truncate_column_count: usize,
    },
    Limit {
        input: Box<PlanSpec>,
        #[serde(default)]
        count: Option<Expr>,
        #[serde(default)]
        offset: Option<Expr>,
    },
    Concatenate {
        sources: Vec<PlanSpec>,
        #[serde(default)]
        no_need_to_type_check: BTreeSet<usize>,
    },
    Filter {
        input: Box<PlanSpec>,
        predicate: Expr,
        #[serde(default)]
        truncate_column_count: usize,
    },
    Projection {
        input: Box<PlanSpec>,
        columns: Vec<ProjectionColumn>,
    },
}

impl PlanSpec {
    /// Builds the executable primitive tree
    pub fn build(&self) -> EngineResult<Box<dyn Primitive>> {
        let primitive: Box<dyn Primitive> = match self {
            PlanSpec::Route(spec) => Box::new(build_route(spec)?),
            PlanSpec::Join {
                opcode,
                left,
                right,
                cols,
                vars,
            } => {
                if cols.contains(&0) {
                    return Err(EngineError::invalid_argument(
                        "join column index 0 is neither left nor right",
                    ));
                }
                Box::new(Join::new(*opcode, left.build()?, right.build()?, cols.clone(), vars.clone()))
            }
            PlanSpec::OrderedAggregate {
                input,
                aggregates,
                group_by_keys,
                truncate_column_count,
            } => Box::new(
                OrderedAggregate::new(input.build()?, aggregates.clone(), group_by_keys.clone())
                    .with_truncate(*truncate_column_count),
            ),
            PlanSpec::ScalarAggregate {
                input,
                aggregates,
                truncate_column_count,
            } => Box::new(
                ScalarAggregate::new(input.build()?, aggregates.clone())
                    .with_truncate(*truncate_column_count),
            ),
            PlanSpec::MemorySort {
                input,
                order_by,
                upper_limit,
                truncate_column_count,
            } => {
                let mut sort = MemorySort::new(input.build()?, order_by.clone())
                    .with_truncate(*truncate_column_count);
                if let Some(limit) = upper_limit {
                    sort = sort.with_upper_limit(limit.clone());
                }
                Box::new(sort)
            }
            PlanSpec::Distinct {
                input,
                check_cols,
                truncate_column_count,
            } => Box::new(
                Distinct::new(input.build()?, check_cols.clone()).with_truncate(*truncate_column_count),
            ),
            PlanSpec::Limit {
                input,
                count,
                offset,
            } => Box::new(Limit::new(input.build()?, count.clone(), offset.clone())),
            PlanSpec::Concatenate {
                sources,
                no_need_to_type_check,
            } => {
                let built = sources
                    .iter()
                    .map(PlanSpec::build)
                    .collect::<EngineResult<Vec<_>>>()?;
                Box::new(
                    Concatenate::new(built).with_unchecked_types(no_need_to_type_check.iter().copied()),
                )
            }
            PlanSpec::Filter {
                input,
                predicate,
                truncate_column_count,
            } => Box::new(
                Filter::new(input.build()?, predicate.clone()).with_truncate(*truncate_column_count),
            ),
            PlanSpec::Projection { input, columns } => {
                Box::new(Projection::new(input.build()?, columns.clone()))
            }
        };
        Ok(primitive)
    }

    /// Number of primitives in the tree
    pub fn node_count(&self) -> usize {
        1 + match self {
            PlanSpec::Route(_) => 0,
            PlanSpec::Join { left, right, .. } => left.node_count() + right.node_count(),
            PlanSpec::Concatenate { sources, .. } => sources.iter().map(PlanSpec::node_count).sum(),
            PlanSpec::OrderedAggregate { input, .. }
            | PlanSpec::ScalarAggregate { input, .. }
            | PlanSpec::MemorySort { input, .. }
            | PlanSpec::Distinct { input, .. }
            | PlanSpec::Limit { input, .. }
            | PlanSpec::Filter { input, .. }
            | PlanSpec::Projection { input, .. } => input.node_count(),
        }
    }
}

fn build_route(spec: &RouteSpec) -> EngineResult<Route> {
    let mut routing = RoutingParameters::new(spec.opcode, spec.keyspace.as_str());
    match (&spec.vindex, spec.opcode.uses_vindex()) {
        (Some(kind), true) => {
            if spec.values.is_empty() {
                return Err(EngineError::invalid_argument(format!(
                    "route opcode {} needs at least one value",
                    spec.opcode
                )));
            }
            routing = routing.with_vindex(vindexes::create(kind)?, spec.values.clone());
        }
        (None, true) => {
            return Err(EngineError::invalid_argument(format!(
                "route opcode {} needs a vindex",
                spec.opcode
            )));
        }
        (_, false) => {}
    }
    match (&spec.target_destination, spec.opcode) {
        (Some(dest), _) => routing = routing.with_destination(dest.clone()),
        (None, RouteOpcode::ByDestination) => {
            return Err(EngineError::invalid_argument(
                "route opcode ByDestination needs a target destination",
            ));
        }
        (None, _) => {}
    }
    if !spec.system_table_schema.is_empty() {
        routing = routing.with_system_table_schema(spec.system_table_schema.clone());
    }

    let mut route = Route::new(routing, spec.query.as_str(), spec.field_query.as_str())
        .with_order_by(spec.order_by.clone())
        .with_truncate(spec.truncate_column_count);
    if spec.no_routes_special_handling {
        route = route.with_no_routes_special_handling();
    }
    if let Some(ms) = spec.query_timeout_ms {
        route = route.with_timeout_ms(ms);
    }
    route.needs_transaction = spec.needs_transaction;
    route.table_name = spec.table_name.clone();
    Ok(route)
}
