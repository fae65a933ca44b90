// crates/stratus-gateway/src/protocol.rs
// ============================================================================
// Module: Wire Protocol Types
// Description: Request/response shapes shared by dispatcher, handlers, encoder.
// Purpose: Decouple handlers from HTTP framing and wire conventions.
// Dependencies: axum, serde, serde_json, url
// ============================================================================

//! ## Overview
//! Three wire conventions exist:
//! - [`WireConvention::TargetHeader`]: `X-Amz-Target: <prefix>.<Operation>`
//!   with a JSON body, answered in the data family.
//! - [`WireConvention::QueryAction`]: form or query parameters with an
//!   `Action` parameter, answered in the markup family.
//! - [`WireConvention::RestPath`]: method plus URL path shape, answered in
//!   the markup family.
//!
//! Handlers receive an [`OperationInput`] already decoded for their
//! convention and return an [`OperationOutput`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::USER_AGENT;
use serde::Serialize;
use serde_json::Value;

use crate::xml::XmlNode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying `<prefix>.<Operation>` for the target-header convention.
pub const TARGET_HEADER: &str = "x-amz-target";
/// Form parameter naming the operation for the query-action convention.
pub const ACTION_PARAMETER: &str = "Action";

// ============================================================================
// SECTION: Conventions
// ============================================================================

/// Request/response encoding family a request arrived in.
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireConvention {
    /// Operation header plus JSON body.
    TargetHeader,
    /// Form-encoded `Action` parameter.
    QueryAction,
    /// Method plus URL path shape.
    RestPath,
}

impl WireConvention {
    /// Returns the response family this convention answers in.
    #[must_use]
    pub const fn family(self) -> ResponseFamily {
        match self {
            Self::TargetHeader => ResponseFamily::Data,
            Self::QueryAction | Self::RestPath => ResponseFamily::Markup,
        }
    }
}

/// Response encoding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFamily {
    /// XML envelopes.
    Markup,
    /// JSON objects.
    Data,
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Decoded form or query parameters.
pub type FormParams = BTreeMap<String, String>;

/// Raw HTTP request as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP method.
    pub method: Method,
    /// URL path without the query string.
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl InboundRequest {
    /// Returns a header value as a string when present and valid.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns the client identification header.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get(USER_AGENT).and_then(|value| value.to_str().ok())
    }

    /// Returns the declared content type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
    }

    /// Returns true when the body is declared as form-encoded.
    #[must_use]
    pub fn has_form_body(&self) -> bool {
        self.content_type()
            .is_some_and(|value| value.contains("application/x-www-form-urlencoded"))
    }

    /// Decodes query parameters.
    #[must_use]
    pub fn query_params(&self) -> FormParams {
        self.query.as_deref().map(|query| parse_form(query.as_bytes())).unwrap_or_default()
    }

    /// Decodes query parameters merged with a form body; body values win.
    #[must_use]
    pub fn form_params(&self) -> FormParams {
        let mut params = self.query_params();
        if self.has_form_body() {
            params.extend(parse_form(&self.body));
        }
        params
    }
}

/// Parses `application/x-www-form-urlencoded` bytes.
#[must_use]
pub fn parse_form(bytes: &[u8]) -> FormParams {
    url::form_urlencoded::parse(bytes).into_owned().collect()
}

/// Input for a path-routed operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RestInput {
    /// Values captured from `{param}` path segments.
    pub path_params: BTreeMap<String, String>,
    /// Query parameters.
    pub query: FormParams,
    /// Raw body.
    pub body: Bytes,
}

/// Operation input decoded for the handler's convention.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationInput {
    /// JSON body of a target-header request.
    Json(Value),
    /// Form parameters of a query-action request.
    Params(FormParams),
    /// Path parameters, query, and body of a REST request.
    Rest(RestInput),
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Successful operation payload.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationBody {
    /// JSON object for the data family.
    Data(Value),
    /// Result children for the markup family; the encoder adds the envelope.
    Markup(Vec<XmlNode>),
}

/// Successful operation result.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutput {
    /// Payload.
    pub body: OperationBody,
    /// HTTP status, 200 unless the operation says otherwise.
    pub status: StatusCode,
}

impl OperationOutput {
    /// Builds a data-family result.
    #[must_use]
    pub const fn data(value: Value) -> Self {
        Self {
            body: OperationBody::Data(value),
            status: StatusCode::OK,
        }
    }

    /// Builds a markup-family result from its children.
    #[must_use]
    pub const fn markup(children: Vec<XmlNode>) -> Self {
        Self {
            body: OperationBody::Markup(children),
            status: StatusCode::OK,
        }
    }

    /// Overrides the status.
    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn request(
        query: Option<&str>,
        content_type: Option<&'static str>,
        body: &'static str,
    ) -> InboundRequest {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        InboundRequest {
            method: Method::POST,
            path: "/".to_string(),
            query: query.map(str::to_string),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn form_body_overrides_query() {
        let req = request(
            Some("Action=ListQueues&Version=1"),
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "Action=CreateQueue&QueueName=a%20b",
        );
        let params = req.form_params();
        assert_eq!(params.get("Action").map(String::as_str), Some("CreateQueue"));
        assert_eq!(params.get("QueueName").map(String::as_str), Some("a b"));
        assert_eq!(params.get("Version").map(String::as_str), Some("1"));
    }

    #[test]
    fn non_form_body_is_ignored() {
        let req = request(None, Some("application/json"), "Action=CreateQueue");
        assert!(req.form_params().is_empty());
    }

    #[test]
    fn conventions_map_to_families() {
        assert_eq!(WireConvention::TargetHeader.family(), ResponseFamily::Data);
        assert_eq!(WireConvention::QueryAction.family(), ResponseFamily::Markup);
        assert_eq!(WireConvention::RestPath.family(), ResponseFamily::Markup);
    }
}
