//! CLI Loader Tests
//!
//! Plan, topology and config files loaded from disk and executed end to end.

use std::fs;
use std::path::PathBuf;

use serde_json::json;
use shardgate::cli::{execute_plan, run_plan, CliErrorCode, Config};
use shardgate::engine::EngineErrorCode;
use shardgate::plan::PlanFile;
use shardgate::sqltypes::Value;
use shardgate::topology::{StaticCursor, Topology};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write(dir: &TempDir, name: &str, value: serde_json::Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    path
}

fn topology_json() -> serde_json::Value {
    json!({
        "keyspaces": {
            "main": { "shards": { "0": { "queries": [
                { "sql": "select id, name from user", "result": {
                    "fields": [{"name": "id", "type": "INT64"}, {"name": "name", "type": "VARCHAR"}],
                    "rows": [[1, "alice"], [2, "bob"]] } },
                { "sql": "select total from orders where uid = :uid", "bind_vars": { "uid": 1 }, "result": {
                    "fields": [{"name": "total", "type": "INT64"}], "rows": [[10], [15]] } },
                { "sql": "select total from orders where uid = :uid", "bind_vars": { "uid": 2 }, "result": {
                    "fields": [{"name": "total", "type": "INT64"}], "rows": [] } }
            ] } } },
            "user": {
                "sharded": true,
                "shards": {
                    "-80": { "queries": [
                        { "sql": "select color, qty from stock order by color", "result": {
                            "fields": [{"name": "color", "type": "VARCHAR"}, {"name": "qty", "type": "INT64"}],
                            "rows": [["blue", 1], ["red", 2]] } }
                    ] },
                    "80-": { "queries": [
                        { "sql": "select color, qty from stock order by color", "result": {
                            "fields": [{"name": "color", "type": "VARCHAR"}, {"name": "qty", "type": "INT64"}],
                            "rows": [["blue", 3]] } }
                    ] }
                }
            }
        }
    })
}

fn cursor(config: &Config) -> StaticCursor {
    let topology: Topology = serde_json::from_value(topology_json()).unwrap();
    StaticCursor::new(topology)
        .unwrap()
        .with_max_memory_rows(config.max_memory_rows)
}

fn left_join_plan() -> PlanFile {
    PlanFile::from_json(
        &json!({
            "plan": {
                "type": "join",
                "opcode": "left_join",
                "left": { "type": "route", "opcode": "Unsharded", "keyspace": "main",
                          "query": "select id, name from user" },
                "right": { "type": "route", "opcode": "Unsharded", "keyspace": "main",
                           "query": "select total from orders where uid = :uid" },
                "cols": [-2, 1],
                "vars": { "uid": 0 }
            }
        })
        .to_string(),
    )
    .unwrap()
}

// =============================================================================
// End-to-end Execution
// =============================================================================

#[test]
fn test_left_join_plan_from_json() {
    let config = Config::default();
    let result = execute_plan(&left_join_plan(), &cursor(&config), &config).unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::text("alice"), Value::Int64(10)],
            vec![Value::text("alice"), Value::Int64(15)],
            vec![Value::text("bob"), Value::Null],
        ]
    );
    let names: Vec<&str> = result.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "total"]);
}

#[test]
fn test_grouped_sum_over_scatter() {
    let file = PlanFile::from_json(
        &json!({
            "plan": {
                "type": "ordered_aggregate",
                "aggregates": [{ "opcode": "sum", "column": 1 }],
                "group_by_keys": [{ "key_column": 0 }],
                "input": {
                    "type": "route", "opcode": "Scatter", "keyspace": "user",
                    "query": "select color, qty from stock order by color",
                    "order_by": [{ "column": 0 }]
                }
            }
        })
        .to_string(),
    )
    .unwrap();
    let config = Config::default();
    let result = execute_plan(&file, &cursor(&config), &config).unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::text("blue"), Value::Int64(4)],
            vec![Value::text("red"), Value::Int64(2)],
        ]
    );
}

#[test]
fn test_plan_bind_vars_reach_shards() {
    let file = PlanFile::from_json(
        &json!({
            "bind_vars": { "uid": 1 },
            "plan": { "type": "route", "opcode": "Unsharded", "keyspace": "main",
                      "query": "select total from orders where uid = :uid" }
        })
        .to_string(),
    )
    .unwrap();
    let config = Config::default();
    let c = cursor(&config);
    let result = execute_plan(&file, &c, &config).unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(c.executed().len(), 1);
}

// =============================================================================
// Config Effects
// =============================================================================

#[test]
fn test_config_memory_ceiling_applies_to_joins() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.json", json!({ "max_memory_rows": 1 }));
    let config = Config::load(&path).unwrap();

    let err = execute_plan(&left_join_plan(), &cursor(&config), &config).unwrap_err();
    assert_eq!(
        err.code(),
        CliErrorCode::Engine(EngineErrorCode::ResourceExhausted)
    );
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.json", json!({ "max_rows": 5 }));
    let err = Config::load(&path).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::ConfigError);
}

// =============================================================================
// File Errors
// =============================================================================

#[test]
fn test_run_plan_reports_file_errors() {
    let dir = TempDir::new().unwrap();
    let plan = write(&dir, "plan.json", serde_json::to_value(left_join_plan()).unwrap());
    let topology = write(&dir, "topology.json", topology_json());

    run_plan(&plan, &topology, None).unwrap();

    let missing = dir.path().join("missing.json");
    let err = run_plan(&missing, &topology, None).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::IoError);

    let bad_plan = write(&dir, "bad_plan.json", json!({ "plan": { "type": "teleport" } }));
    let err = run_plan(&bad_plan, &topology, None).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::PlanError);

    let two_shard_unsharded = write(
        &dir,
        "bad_topology.json",
        json!({ "keyspaces": { "main": { "shards": { "-80": {}, "80-": {} } } } }),
    );
    let err = run_plan(&plan, &two_shard_unsharded, None).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::TopologyError);
}
