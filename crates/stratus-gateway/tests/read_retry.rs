// crates/stratus-gateway/tests/read_retry.rs
// ============================================================================
// Module: Read Retry Tests
// Description: Service reads over a store whose reads briefly lag writes.
// Purpose: Ensure lookups that follow a write ride the configured read retry.
// Dependencies: stratus-gateway, stratus-core, serde_json
// ============================================================================

//! ## Overview
//! Wraps the in-memory store so the next table read after arming reports
//! not-found once, then drives table tagging through the gateway.

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

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use serde_json::Value;
use serde_json::json;
use stratus_core::InMemoryResourceStore;
use stratus_core::ReadRetryPolicy;
use stratus_core::Resource;
use stratus_core::ResourceKey;
use stratus_core::ResourceScope;
use stratus_core::ResourceStore;
use stratus_core::SharedResourceStore;
use stratus_core::StoreError;
use stratus_gateway::Gateway;
use stratus_gateway::InboundRequest;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const TABLE_ARN: &str = "arn:aws:dynamodb:us-east-1:000000000000:table/orders";

/// Store that misses the first table read after `lagging` is armed.
struct LaggingStore {
    inner: InMemoryResourceStore,
    lagging: Arc<AtomicBool>,
}

impl ResourceStore for LaggingStore {
    fn create(&self, resource: &Resource) -> Result<(), StoreError> {
        self.inner.create(resource)
    }

    fn get(&self, key: &ResourceKey) -> Result<Resource, StoreError> {
        let table = key.service.as_str() == "dynamodb";
        if table && self.lagging.swap(false, Ordering::SeqCst) {
            return Err(StoreError::NotFound(key.identifier.to_string()));
        }
        self.inner.get(key)
    }

    fn list(&self, scope: &ResourceScope) -> Result<Vec<Resource>, StoreError> {
        self.inner.list(scope)
    }

    fn update(&self, resource: &Resource) -> Result<(), StoreError> {
        self.inner.update(resource)
    }

    fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
}

fn gateway(policy: ReadRetryPolicy) -> (Gateway, Arc<AtomicBool>) {
    let lagging = Arc::new(AtomicBool::new(false));
    let store = LaggingStore {
        inner: InMemoryResourceStore::new(),
        lagging: Arc::clone(&lagging),
    };
    let shared = SharedResourceStore::from_store(store).with_read_retry(policy);
    (Gateway::with_builtin_services(shared).unwrap(), lagging)
}

fn target(target: &'static str, body: &Value) -> InboundRequest {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/x-amz-json-1.0"));
    headers.insert("x-amz-target", HeaderValue::from_static(target));
    InboundRequest {
        method: Method::POST,
        path: "/".to_string(),
        query: None,
        headers,
        body: Bytes::from(body.to_string()),
    }
}

fn create_orders(gateway: &Gateway) {
    let create = json!({
        "TableName": "orders",
        "AttributeDefinitions": [{"AttributeName": "pk", "AttributeType": "S"}],
        "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
    });
    let response = gateway.handle(&target("DynamoDB_20120810.CreateTable", &create));
    assert_eq!(response.status, StatusCode::OK);
}

fn tag_orders(gateway: &Gateway) -> StatusCode {
    let tag = json!({
        "ResourceArn": TABLE_ARN,
        "Tags": [{"Key": "Team", "Value": "billing"}],
    });
    gateway.handle(&target("DynamoDB_20120810.TagResource", &tag)).status
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn tagging_a_lagging_table_retries_the_read() {
    let policy = ReadRetryPolicy {
        max_attempts: 3,
        delay: Duration::ZERO,
    };
    let (gateway, lagging) = gateway(policy);
    create_orders(&gateway);

    lagging.store(true, Ordering::SeqCst);
    assert_eq!(tag_orders(&gateway), StatusCode::OK);

    let list = json!({"ResourceArn": TABLE_ARN});
    let response = gateway.handle(&target("DynamoDB_20120810.ListTagsOfResource", &list));
    assert_eq!(response.status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["Tags"], json!([{"Key": "Team", "Value": "billing"}]));
}

#[test]
fn tagging_without_retry_surfaces_the_missing_table() {
    let (gateway, lagging) = gateway(ReadRetryPolicy::none());
    create_orders(&gateway);

    lagging.store(true, Ordering::SeqCst);
    assert_eq!(tag_orders(&gateway), StatusCode::BAD_REQUEST);
}
