// crates/stratus-gateway/tests/server.rs
// ============================================================================
// Module: Gateway Server Tests
// Description: Configuration-driven server construction.
// Purpose: Ensure store, audit, and validation settings take effect.
// Dependencies: stratus-gateway, stratus-config, tempfile, tower, tokio
// ============================================================================

//! ## Overview
//! Builds [`GatewayServer`] instances from [`StratusConfig`] values and
//! checks durability across restarts and audit log output.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use stratus_config::StoreType;
use stratus_config::StratusConfig;
use stratus_gateway::GatewayServer;
use stratus_gateway::GatewayServerError;
use tempfile::TempDir;
use tower::ServiceExt;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn sqlite_config(dir: &TempDir) -> StratusConfig {
    let mut config = StratusConfig::default();
    config.store.store_type = StoreType::Sqlite;
    config.store.path = Some(dir.path().join("stratus.sqlite"));
    config.read_retry.max_attempts = 1;
    config.audit.enabled = true;
    config.audit.path = Some(dir.path().join("audit.jsonl").to_string_lossy().into_owned());
    config
}

async fn call(server: &GatewayServer, form: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn sqlite_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first = GatewayServer::from_config(sqlite_config(&dir)).unwrap();
    let (status, _) = call(&first, "Action=CreateQueue&QueueName=durable").await;
    assert_eq!(status, StatusCode::OK);
    drop(first);

    let second = GatewayServer::from_config(sqlite_config(&dir)).unwrap();
    let (status, body) = call(&second, "Action=GetQueueUrl&QueueName=durable").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("/000000000000/durable</QueueUrl>"));
}

#[tokio::test]
async fn audit_log_receives_one_line_per_request() {
    let dir = tempfile::tempdir().unwrap();
    let server = GatewayServer::from_config(sqlite_config(&dir)).unwrap();
    call(&server, "Action=ListQueues").await;
    call(&server, "Action=Nope").await;
    let log = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
    let requests: Vec<serde_json::Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .filter(|event: &serde_json::Value| event["event"] == "gateway_request")
        .collect();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["operation"], "ListQueues");
    assert_eq!(requests[0]["outcome"], "ok");
    assert_eq!(requests[1]["error_code"], "InvalidAction");
    assert_eq!(requests[1]["outcome"], "error");
}

#[test]
fn invalid_configuration_is_rejected() {
    let mut config = StratusConfig::default();
    config.server.bind = "not an address".to_string();
    let err = GatewayServer::from_config(config).err().unwrap();
    assert!(matches!(err, GatewayServerError::Config(_)));
}
