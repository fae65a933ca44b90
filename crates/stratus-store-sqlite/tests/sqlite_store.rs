// crates/stratus-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SqliteResourceStore behavior.
// Purpose: Ensure durable persistence, key scoping, and integrity checks.
// Dependencies: stratus-store-sqlite, stratus-core, rusqlite, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed resource store. Covers the same
//! contract as the in-memory backend plus durability across reopen and
//! fail-closed handling of tampered rows.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::json;
use stratus_core::Resource;
use stratus_core::ResourceKey;
use stratus_core::ResourceScope;
use stratus_core::ResourceStore;
use stratus_core::StoreError;
use stratus_core::Timestamp;
use stratus_store_sqlite::SqliteResourceStore;
use stratus_store_sqlite::SqliteStoreConfig;
use stratus_store_sqlite::SqliteStoreError;
use stratus_store_sqlite::SqliteStoreMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_for(temp: &TempDir) -> SqliteResourceStore {
    SqliteResourceStore::new(&SqliteStoreConfig::at(temp.path().join("store.sqlite"))).unwrap()
}

fn table(identifier: &str, namespace: &str) -> Resource {
    Resource::new(
        ResourceKey::new(identifier, namespace, "dynamodb", "table"),
        json!({"TableName": identifier, "BillingMode": "PAY_PER_REQUEST"}),
        Timestamp::from_unix_millis(1_700_000_000_000),
    )
}

// ============================================================================
// SECTION: Contract
// ============================================================================

#[test]
fn create_get_round_trip() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let row = table("orders", "default");
    store.create(&row).unwrap();
    assert_eq!(store.get(&row.key()).unwrap(), row);
}

#[test]
fn duplicate_create_is_already_exists() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.create(&table("orders", "default")).unwrap();
    let err = store.create(&table("orders", "default")).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));
}

#[test]
fn namespaces_do_not_collide() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.create(&table("orders", "team-a")).unwrap();
    store.create(&table("orders", "team-b")).unwrap();
    let listed = store.list(&ResourceScope::new("team-a", "dynamodb", "table")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].namespace.as_str(), "team-a");
}

#[test]
fn key_components_all_scope_reads() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.create(&table("orders", "default")).unwrap();
    let wrong_service = ResourceKey::new("orders", "default", "sqs", "table");
    assert!(store.get(&wrong_service).unwrap_err().is_not_found());
    assert!(store.delete(&wrong_service).unwrap_err().is_not_found());
    assert!(store.get(&table("orders", "default").key()).is_ok());
}

#[test]
fn list_orders_by_identifier() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    for name in ["c", "a", "b"] {
        store.create(&table(name, "default")).unwrap();
    }
    let names: Vec<String> = store
        .list(&ResourceScope::new("default", "dynamodb", "table"))
        .unwrap()
        .into_iter()
        .map(|row| row.identifier.to_string())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn update_replaces_blob_and_keeps_created_at() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.create(&table("orders", "default")).unwrap();
    let mut changed = table("orders", "default");
    changed.attributes = json!({"TableName": "orders", "BillingMode": "PROVISIONED"});
    changed.created_at = Timestamp::from_unix_millis(5);
    store.update(&changed).unwrap();
    let stored = store.get(&changed.key()).unwrap();
    assert_eq!(stored.attributes["BillingMode"], json!("PROVISIONED"));
    assert_eq!(stored.created_at, Timestamp::from_unix_millis(1_700_000_000_000));
}

#[test]
fn update_and_delete_of_missing_rows_are_not_found() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    assert!(store.update(&table("ghost", "default")).unwrap_err().is_not_found());
    assert!(store.delete(&table("ghost", "default").key()).unwrap_err().is_not_found());
}

// ============================================================================
// SECTION: Durability and Integrity
// ============================================================================

#[test]
fn rows_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let row = table("orders", "default");
    {
        let store = store_for(&temp);
        store.create(&row).unwrap();
    }
    let reopened = store_for(&temp);
    assert_eq!(reopened.get(&row.key()).unwrap(), row);
}

#[test]
fn delete_journal_mode_is_supported() {
    let temp = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::at(temp.path().join("nested").join("store.sqlite"));
    config.journal_mode = SqliteStoreMode::Delete;
    let store = SqliteResourceStore::new(&config).unwrap();
    store.create(&table("orders", "default")).unwrap();
    assert!(store.get(&table("orders", "default").key()).is_ok());
}

#[test]
fn tampered_attributes_fail_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = SqliteResourceStore::new(&SqliteStoreConfig::at(&path)).unwrap();
    store.create(&table("orders", "default")).unwrap();
    drop(store);

    let connection = rusqlite::Connection::open(&path).unwrap();
    connection
        .execute("UPDATE resources SET attributes = ?1", rusqlite::params![b"{}".to_vec()])
        .unwrap();
    drop(connection);

    let store = SqliteResourceStore::new(&SqliteStoreConfig::at(&path)).unwrap();
    let err = store.get(&table("orders", "default").key()).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[test]
fn unknown_schema_version_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    drop(SqliteResourceStore::new(&SqliteStoreConfig::at(&path)).unwrap());
    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(connection);

    let Err(err) = SqliteResourceStore::new(&SqliteStoreConfig::at(&path)) else {
        panic!("expected version mismatch");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn directory_path_is_rejected() {
    let temp = TempDir::new().unwrap();
    let Err(err) = SqliteResourceStore::new(&SqliteStoreConfig::at(temp.path())) else {
        panic!("expected invalid path");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}
