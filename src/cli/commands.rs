//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::engine::{explain as explain_tree, ExecContext, Primitive};
use crate::observability::{
    log_event_at, log_event_with_fields, Event, Logger, MetricsRegistry, ObservationScope, Severity,
};
use crate::plan::PlanFile;
use crate::sqltypes::ResultSet;
use crate::topology::{StaticCursor, Topology};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{read_json_file, write_response, write_text};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Explain { plan, text } => explain(&plan, text),
        Command::Run {
            plan,
            topology,
            config,
        } => run_plan(&plan, &topology, config.as_deref()),
    }
}

/// Prints the EXPLAIN tree of a plan file
pub fn explain(plan_path: &Path, text: bool) -> CliResult<()> {
    let file = load_plan(plan_path)?;
    let root = build_plan(&file)?;
    let desc = explain_tree::describe(root.as_ref());
    if text {
        write_text(&explain_tree::render_text(&desc))
    } else {
        write_response(&desc)
    }
}

/// Executes a plan file against a topology and prints the result
pub fn run_plan(plan_path: &Path, topology_path: &Path, config_path: Option<&Path>) -> CliResult<()> {
    let config = Config::load_optional(config_path)?;
    Logger::set_min_severity(config.severity()?);
    let max_rows = config.max_memory_rows.to_string();
    log_event_with_fields(Event::ConfigLoaded, &[("max_memory_rows", max_rows.as_str())]);

    let file = load_plan(plan_path)?;
    let topology: Topology = read_json_file(topology_path, CliError::topology_error)?;
    let cursor = StaticCursor::new(topology)
        .map_err(|e| CliError::topology_error(e.message()))?
        .with_max_memory_rows(config.max_memory_rows);

    let result = execute_plan(&file, &cursor, &config)?;
    write_response(json!({
        "fields": result.fields,
        "rows": result.rows,
        "rows_affected": result.rows_affected,
    }))
}

/// Builds and executes a loaded plan, logging the query lifecycle
pub fn execute_plan(file: &PlanFile, cursor: &StaticCursor, config: &Config) -> CliResult<ResultSet> {
    let root = build_plan(file)?;

    let metrics = Arc::new(MetricsRegistry::new());
    let mut ctx = ExecContext::with_metrics(Arc::clone(&metrics));
    if let Some(timeout) = config.query_timeout() {
        ctx = ctx.with_timeout(timeout);
    }
    let request_id = ctx.request_id_str();
    let scope = ObservationScope::new(
        "QUERY",
        &[("request_id", request_id.as_str()), ("root", root.operator_type())],
    );

    match root.execute(&ctx, cursor, &file.bind_vars, true) {
        Ok(result) => {
            metrics.increment_queries_executed();
            let snapshot = metrics.snapshot();
            let rows = result.rows.len().to_string();
            let shard_queries = snapshot.shard_queries.to_string();
            log_event_with_fields(
                Event::QueryComplete,
                &[
                    ("request_id", request_id.as_str()),
                    ("rows", rows.as_str()),
                    ("shard_queries", shard_queries.as_str()),
                ],
            );
            scope.complete(&[("rows", rows.as_str())]);
            Ok(result)
        }
        Err(err) => {
            metrics.increment_queries_failed();
            let message = err.to_string();
            let severity = if err.is_fatal() {
                Severity::Fatal
            } else {
                Severity::Error
            };
            log_event_at(
                severity,
                Event::QueryFailed,
                &[
                    ("code", err.code().code()),
                    ("error", message.as_str()),
                    ("request_id", request_id.as_str()),
                ],
            );
            scope.fail(&message);
            Err(err.into())
        }
    }
}

fn load_plan(path: &Path) -> CliResult<PlanFile> {
    read_json_file(path, CliError::plan_error)
}

fn build_plan(file: &PlanFile) -> CliResult<Box<dyn Primitive>> {
    let root = file
        .plan
        .build()
        .map_err(|e| CliError::plan_error(e.message()))?;
    let nodes = file.plan.node_count().to_string();
    log_event_with_fields(
        Event::PlanLoaded,
        &[("nodes", nodes.as_str()), ("root", root.operator_type())],
    );
    Ok(root)
}
