// crates/stratus-gateway/tests/registry.rs
// ============================================================================
// Module: Handler Registry Tests
// Description: Startup validation of service definitions and path shapes.
// Purpose: Ensure misconfigured services are rejected before serving.
// Dependencies: stratus-gateway, axum
// ============================================================================

//! ## Overview
//! Builds registries from small hand-written definitions and checks each
//! registration rule, plus dispatch precedence across conventions.

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

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use stratus_gateway::ApiError;
use stratus_gateway::Binding;
use stratus_gateway::HandlerRegistry;
use stratus_gateway::InboundRequest;
use stratus_gateway::MarkupStyle;
use stratus_gateway::OperationContext;
use stratus_gateway::OperationInput;
use stratus_gateway::OperationOutput;
use stratus_gateway::RegistryError;
use stratus_gateway::ServiceDefinition;
use stratus_gateway::WireConvention;
use stratus_gateway::registry::PathPattern;
use stratus_gateway::services::builtin_services;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn noop(_ctx: &OperationContext<'_>, _input: &OperationInput) -> Result<OperationOutput, ApiError> {
    Ok(OperationOutput::markup(Vec::new()))
}

fn service(
    name: &'static str,
    target_prefix: Option<&'static str>,
    operations: &'static [&'static str],
    bindings: Vec<Binding>,
) -> ServiceDefinition {
    ServiceDefinition {
        name,
        target_prefix,
        data_content_type: "application/x-amz-json-1.0",
        xml_namespace: "urn:test",
        markup_style: MarkupStyle::Wrapped,
        operations,
        bindings,
    }
}

fn request(
    method: Method,
    path: &str,
    headers: &[(&'static str, &str)],
    body: &str,
) -> InboundRequest {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(*name, HeaderValue::from_str(value).unwrap());
    }
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (path.to_string(), None),
    };
    InboundRequest {
        method,
        path,
        query,
        headers: map,
        body: Bytes::from(body.to_string()),
    }
}

// ============================================================================
// SECTION: Registration Rules
// ============================================================================

#[test]
fn builtin_services_register_cleanly() {
    let registry = HandlerRegistry::new(builtin_services()).unwrap();
    let names: Vec<&str> = registry.services().iter().map(|svc| svc.name).collect();
    assert_eq!(names, vec!["dynamodb", "secretsmanager", "sqs", "ec2", "route53"]);
}

#[test]
fn duplicate_service_names_are_rejected() {
    let err = HandlerRegistry::new(vec![
        service("a", None, &["Op"], vec![Binding::action("Op", noop)]),
        service("a", None, &["Other"], vec![Binding::action("Other", noop)]),
    ])
    .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateService("a".to_string()));
}

#[test]
fn declared_operations_must_be_bound() {
    let err = HandlerRegistry::new(vec![service("a", None, &["Op", "Missing"], vec![
        Binding::action("Op", noop),
    ])])
    .unwrap_err();
    assert_eq!(err, RegistryError::UnboundOperation {
        service: "a".to_string(),
        operation: "Missing".to_string(),
    });
}

#[test]
fn bound_operations_must_be_declared() {
    let err = HandlerRegistry::new(vec![service("a", None, &["Op"], vec![
        Binding::action("Op", noop),
        Binding::action("Stray", noop),
    ])])
    .unwrap_err();
    assert!(matches!(err, RegistryError::UndeclaredOperation { .. }));
}

#[test]
fn at_most_two_conventions_per_service() {
    let err = HandlerRegistry::new(vec![service("a", Some("A"), &["One", "Two", "Three"], vec![
        Binding::target("One", noop),
        Binding::action("Two", noop),
        Binding::rest("Three", Method::GET, "/three", noop),
    ])])
    .unwrap_err();
    assert_eq!(err, RegistryError::TooManyConventions("a".to_string()));
}

#[test]
fn target_bindings_need_a_prefix() {
    let err = HandlerRegistry::new(vec![service("a", None, &["Op"], vec![Binding::target(
        "Op", noop,
    )])])
    .unwrap_err();
    assert_eq!(err, RegistryError::MissingTargetPrefix("a".to_string()));
}

#[test]
fn routes_are_unique_across_services() {
    let err = HandlerRegistry::new(vec![
        service("a", None, &["Op"], vec![Binding::action("Op", noop)]),
        service("b", None, &["Op"], vec![Binding::action("Op", noop)]),
    ])
    .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateRoute(_)));

    let err = HandlerRegistry::new(vec![
        service("a", None, &["Get"], vec![Binding::rest("Get", Method::GET, "/items/{Id}", noop)]),
        service("b", None, &["Get"], vec![Binding::rest("Get", Method::GET, "/items/{Id}", noop)]),
    ])
    .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateRoute(_)));
}

#[test]
fn malformed_path_shapes_are_rejected() {
    for shape in ["items", "/items//x", "/items/{", "/items/{}", "/it{em}s"] {
        assert!(
            matches!(PathPattern::parse(shape), Err(RegistryError::InvalidPath(_))),
            "{shape} should be rejected"
        );
    }
    let pattern = PathPattern::parse("/2013-04-01/hostedzone/{Id}/rrset").unwrap();
    let captured = pattern.matches("/2013-04-01/hostedzone/Z1/rrset/").unwrap();
    assert_eq!(captured.get("Id").map(String::as_str), Some("Z1"));
    assert!(pattern.matches("/2013-04-01/hostedzone/Z1").is_none());
}

// ============================================================================
// SECTION: Dispatch Precedence
// ============================================================================

#[test]
fn target_header_wins_over_action_and_path() {
    let registry = HandlerRegistry::new(vec![
        service("t", Some("T_1"), &["Ping"], vec![Binding::target("Ping", noop)]),
        service("q", None, &["Ping2"], vec![Binding::action("Ping2", noop)]),
        service("r", None, &["Get"], vec![Binding::rest("Get", Method::POST, "/ping", noop)]),
    ])
    .unwrap();
    let req = request(Method::POST, "/ping?Action=Ping2", &[("x-amz-target", "T_1.Ping")], "");
    let dispatch = registry.dispatch(&req).unwrap();
    assert_eq!(dispatch.convention, WireConvention::TargetHeader);
    assert_eq!(dispatch.operation, "Ping");
    assert_eq!(dispatch.input, OperationInput::Json(serde_json::json!({})));

    let req = request(Method::POST, "/ping?Action=Ping2", &[], "");
    let dispatch = registry.dispatch(&req).unwrap();
    assert_eq!(dispatch.convention, WireConvention::QueryAction);

    let req = request(Method::POST, "/ping", &[], "");
    let dispatch = registry.dispatch(&req).unwrap();
    assert_eq!(dispatch.convention, WireConvention::RestPath);
}

#[test]
fn form_body_values_override_query_values() {
    let registry = HandlerRegistry::new(vec![service("q", None, &["Ping"], vec![
        Binding::action("Ping", noop),
    ])])
    .unwrap();
    let req = request(
        Method::POST,
        "/?Action=Ping&Name=query",
        &[("content-type", "application/x-www-form-urlencoded")],
        "Name=body",
    );
    let dispatch = registry.dispatch(&req).unwrap();
    let OperationInput::Params(params) = dispatch.input else {
        panic!("expected form params");
    };
    assert_eq!(params.get("Name").map(String::as_str), Some("body"));
}
