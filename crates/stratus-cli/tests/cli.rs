// crates/stratus-cli/tests/cli.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests that run the `stratus` binary.
// Purpose: Check exit codes and output of config and store commands.
// Dependencies: stratus-cli binary, stratus-store-sqlite, tempfile
// ============================================================================

//! ## Overview
//! Runs the built binary against temporary config files and `SQLite` stores.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use serde_json::Value;
use serde_json::json;
use stratus_config::StratusConfig;
use stratus_core::Resource;
use stratus_core::ResourceScope;
use stratus_core::ResourceStore;
use stratus_core::Timestamp;
use stratus_store_sqlite::SqliteResourceStore;
use stratus_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn stratus_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stratus"))
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(stratus_bin())
        .current_dir(dir)
        .env_remove("STRATUS_CONFIG")
        .args(args)
        .output()
        .expect("run stratus")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).unwrap()
}

fn seed_store(path: &Path) {
    let store = SqliteResourceStore::new(&SqliteStoreConfig::at(path)).unwrap();
    let queues = ResourceScope::new("default", "sqs", "queue");
    let rows = [
        (queues.key("sqs:queue/beta"), json!({"url": "b"})),
        (queues.key("sqs:queue/alpha"), json!({"url": "a"})),
        (ResourceScope::new("team-a", "sqs", "queue").key("sqs:queue/other"), json!({})),
    ];
    for (key, attributes) in rows {
        store.create(&Resource::new(key, attributes, Timestamp::from_unix_millis(1_000))).unwrap();
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

#[test]
fn config_example_is_a_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["config", "example"]);
    assert!(output.status.success());
    StratusConfig::from_bytes(&output.stdout).unwrap();
}

#[test]
fn config_validate_reports_a_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[server]\nbind = \"127.0.0.1:5000\"\n\n[identity]\nregion = \"eu-west-1\"\n")
        .unwrap();
    let output = run(dir.path(), &["config", "validate", "--config", path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    let line = stdout(&output);
    assert!(line.starts_with("config ok:"));
    assert!(line.contains("bind=127.0.0.1:5000"));
    assert!(line.contains("region=eu-west-1"));
}

#[test]
fn config_validate_without_a_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["config", "validate"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("store=memory"));
}

#[test]
fn config_validate_rejects_unknown_fields() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stratus.toml"), "[server]\nbinding = \"x\"\n").unwrap();
    let output = run(dir.path(), &["config", "validate"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("config load failed"));
}

#[test]
fn serve_rejects_non_loopback_bind_before_starting() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["serve", "--bind", "0.0.0.0:4566"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("allow_non_loopback"));
}

// ============================================================================
// SECTION: Store Commands
// ============================================================================

#[test]
fn store_list_prints_one_json_line_per_resource() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("stratus.sqlite");
    seed_store(&db);
    let output = run(dir.path(), &[
        "store",
        "list",
        "--db",
        db.to_str().unwrap(),
        "--service",
        "sqs",
        "--type",
        "queue",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let rows: Vec<Value> =
        stdout(&output).lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["identifier"], "sqs:queue/alpha");
    assert_eq!(rows[1]["identifier"], "sqs:queue/beta");
    assert_eq!(rows[0]["attributes"]["url"], "a");
    assert_eq!(rows[0]["created_at"], 1_000);
}

#[test]
fn store_list_filters_by_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("stratus.sqlite");
    seed_store(&db);
    let output = run(dir.path(), &[
        "store",
        "list",
        "--db",
        db.to_str().unwrap(),
        "--namespace",
        "team-a",
        "--service",
        "sqs",
        "--type",
        "queue",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).lines().count(), 1);
}

#[test]
fn store_list_fails_for_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &[
        "store", "list", "--db", "absent.sqlite", "--service", "sqs", "--type", "queue",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("store not found"));
}
