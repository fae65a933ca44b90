// crates/stratus-gateway/src/dispatch.rs
// ============================================================================
// Module: Protocol Dispatcher
// Description: Picks a handler for a raw request by wire convention.
// Purpose: Apply the fixed precedence target header > Action > path shape.
// Dependencies: axum, serde_json, crate::registry
// ============================================================================

//! ## Overview
//! Dispatch precedence:
//! 1. An `X-Amz-Target` header routes by `<prefix>.<Operation>` and the body
//!    is decoded as JSON (an empty body is `{}`).
//! 2. Otherwise an `Action` form or query parameter routes by its value.
//! 3. Otherwise the method and path are matched against registered shapes.
//! 4. Otherwise the request fails as an unknown operation, answered in JSON
//!    when the request declared a JSON content type and in markup otherwise.
//!
//! Failures carry enough context for the encoder to answer in the
//! convention the request arrived in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::StatusCode;
use serde_json::Map;
use serde_json::Value;

use crate::error::ApiError;
use crate::error::ErrorKind;
use crate::protocol::ACTION_PARAMETER;
use crate::protocol::InboundRequest;
use crate::protocol::OperationInput;
use crate::protocol::ResponseFamily;
use crate::protocol::RestInput;
use crate::protocol::TARGET_HEADER;
use crate::protocol::WireConvention;
use crate::registry::Handler;
use crate::registry::HandlerRegistry;
use crate::registry::RouteTarget;
use crate::registry::ServiceDefinition;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A request routed to a handler.
#[derive(Debug)]
pub struct Dispatch<'r> {
    /// Owning service.
    pub service: &'r ServiceDefinition,
    /// Operation name.
    pub operation: &'static str,
    /// Convention the request arrived in.
    pub convention: WireConvention,
    /// Handler to run.
    pub handler: Handler,
    /// Decoded input.
    pub input: OperationInput,
}

/// A request that could not be routed.
#[derive(Debug)]
pub struct DispatchFailure<'r> {
    /// Service, when the request identified one.
    pub service: Option<&'r ServiceDefinition>,
    /// Convention, when the request used a recognizable one.
    pub convention: Option<WireConvention>,
    /// Family the error must be rendered in.
    pub family: ResponseFamily,
    /// Error to render.
    pub error: ApiError,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

impl HandlerRegistry {
    /// Routes a request to its handler.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchFailure`] when no handler matches or the body cannot
    /// be decoded for the matched convention.
    pub fn dispatch(&self, request: &InboundRequest) -> Result<Dispatch<'_>, DispatchFailure<'_>> {
        if let Some(target) = request.header(TARGET_HEADER) {
            return self.dispatch_target(target, request);
        }
        let params = request.form_params();
        if let Some(action) = params.get(ACTION_PARAMETER) {
            let Some(route) = self.action(action) else {
                return Err(DispatchFailure {
                    service: None,
                    convention: Some(WireConvention::QueryAction),
                    family: ResponseFamily::Markup,
                    error: ApiError::unknown_operation(
                        "InvalidAction",
                        format!("The action {action} is not valid for this endpoint."),
                    ),
                });
            };
            return self.routed(route, WireConvention::QueryAction, OperationInput::Params(params));
        }
        if let Some((route, path_params)) = self.rest(&request.method, &request.path) {
            let input = OperationInput::Rest(RestInput {
                path_params,
                query: request.query_params(),
                body: request.body.clone(),
            });
            return self.routed(route, WireConvention::RestPath, input);
        }
        let family = if request.content_type().is_some_and(|value| value.contains("json")) {
            ResponseFamily::Data
        } else {
            ResponseFamily::Markup
        };
        Err(DispatchFailure {
            service: None,
            convention: None,
            family,
            error: ApiError::unknown_operation(
                "UnknownOperation",
                format!("no operation matches {} {}", request.method, request.path),
            )
            .with_status(StatusCode::NOT_FOUND),
        })
    }

    /// Routes a target-header request.
    fn dispatch_target<'r>(
        &'r self,
        target: &str,
        request: &InboundRequest,
    ) -> Result<Dispatch<'r>, DispatchFailure<'r>> {
        let (prefix, operation) = target.rsplit_once('.').unwrap_or(("", target));
        let service = self.target_service(prefix);
        let failure = |error: ApiError| DispatchFailure {
            service,
            convention: Some(WireConvention::TargetHeader),
            family: ResponseFamily::Data,
            error,
        };
        let Some(route) = self.target(prefix, operation) else {
            return Err(failure(ApiError::unknown_operation(
                "UnknownOperationException",
                format!("unknown operation: {target}"),
            )));
        };
        let body = if request.body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(&request.body).map_err(|err| {
                failure(ApiError::new(
                    ErrorKind::Validation,
                    "SerializationException",
                    format!("request body is not valid JSON: {err}"),
                ))
            })?
        };
        if !body.is_object() {
            return Err(failure(ApiError::new(
                ErrorKind::Validation,
                "SerializationException",
                "request body must be a JSON object",
            )));
        }
        self.routed(route, WireConvention::TargetHeader, OperationInput::Json(body))
    }

    /// Builds a [`Dispatch`] for a resolved route.
    fn routed(
        &self,
        route: RouteTarget,
        convention: WireConvention,
        input: OperationInput,
    ) -> Result<Dispatch<'_>, DispatchFailure<'_>> {
        let Some(service) = self.service(route.service) else {
            return Err(DispatchFailure {
                service: None,
                convention: Some(convention),
                family: convention.family(),
                error: ApiError::internal("route points at an unregistered service"),
            });
        };
        Ok(Dispatch {
            service,
            operation: route.operation,
            convention,
            handler: route.handler,
            input,
        })
    }
}
