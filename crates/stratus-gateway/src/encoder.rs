// crates/stratus-gateway/src/encoder.rs
// ============================================================================
// Module: Response Encoder
// Description: Renders operation results and errors into HTTP responses.
// Purpose: Answer in the family and envelope the request arrived in.
// Dependencies: axum, serde_json, stratus-core, crate::xml
// ============================================================================

//! ## Overview
//! The encoder owns the request id generator and stamps every response, error
//! or not, with the standard headers: `Server`, `Date` (RFC 7231 GMT),
//! `x-amzn-RequestId` and `x-amz-id-2`.
//!
//! Data-family errors are `{"__type": code, "message": text}`. Markup errors
//! follow the service's [`MarkupStyle`]; requests with no identifiable
//! service get the wrapped `<ErrorResponse>` layout.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::DATE;
use axum::http::header::SERVER;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::json;
use stratus_core::Timestamp;

use crate::error::ApiError;
use crate::protocol::OperationBody;
use crate::protocol::OperationOutput;
use crate::protocol::ResponseFamily;
use crate::registry::MarkupStyle;
use crate::registry::ServiceDefinition;
use crate::request_id::RequestIdGenerator;
use crate::xml::XmlNode;
use crate::xml::render_document;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Data-family content type when no service is known.
pub const DEFAULT_DATA_CONTENT_TYPE: &str = "application/x-amz-json-1.0";
/// Markup-family content type.
pub const MARKUP_CONTENT_TYPE: &str = "text/xml";
/// Primary request id header.
pub const REQUEST_ID_HEADER: &str = "x-amzn-requestid";
/// Secondary tracking id header.
pub const TRACKING_ID_HEADER: &str = "x-amz-id-2";
/// Error code header on data-family errors.
pub const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";
/// Body used when an error envelope itself cannot be rendered.
const FALLBACK_ERROR_BODY: &[u8] = b"InternalFailure";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Fully rendered response.
#[derive(Debug, Clone)]
pub struct EncodedResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Headers, including the standard set.
    pub headers: HeaderMap,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl EncodedResponse {
    /// Returns a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

impl IntoResponse for EncodedResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// Where an error is being rendered.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTarget<'a> {
    /// Service, when identified.
    pub service: Option<&'a ServiceDefinition>,
    /// Response family.
    pub family: ResponseFamily,
}

// ============================================================================
// SECTION: Encoder
// ============================================================================

/// Renders results and errors; owns the request id generator.
#[derive(Debug)]
pub struct ResponseEncoder {
    /// Value of the `Server` header.
    server_name: String,
    /// Request id generator for this encoder's lifetime.
    request_ids: RequestIdGenerator,
}

impl ResponseEncoder {
    /// Creates an encoder that identifies itself as `server_name`.
    #[must_use]
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Issues the request id for a new request.
    #[must_use]
    pub fn issue_request_id(&self) -> String {
        self.request_ids.issue()
    }

    /// Renders a successful result.
    #[must_use]
    pub fn encode_success(
        &self,
        request_id: &str,
        service: &ServiceDefinition,
        operation: &str,
        output: OperationOutput,
    ) -> EncodedResponse {
        let family = match &output.body {
            OperationBody::Data(_) => ResponseFamily::Data,
            OperationBody::Markup(_) => ResponseFamily::Markup,
        };
        let rendered = match output.body {
            OperationBody::Data(value) => serde_json::to_vec(&value)
                .map(|body| (service.data_content_type, body))
                .map_err(|err| ApiError::internal(err.to_string())),
            OperationBody::Markup(children) => {
                let root = success_envelope(service, operation, request_id, children);
                render_document(&root).map(|body| (MARKUP_CONTENT_TYPE, body))
            }
        };
        match rendered {
            Ok((content_type, body)) => {
                self.finish(request_id, output.status, content_type, body)
            }
            Err(err) => self.encode_error(
                request_id,
                ErrorTarget {
                    service: Some(service),
                    family,
                },
                &err,
            ),
        }
    }

    /// Renders an error in the target family and envelope.
    #[must_use]
    pub fn encode_error(
        &self,
        request_id: &str,
        target: ErrorTarget<'_>,
        error: &ApiError,
    ) -> EncodedResponse {
        match target.family {
            ResponseFamily::Data => {
                let content_type =
                    target.service.map_or(DEFAULT_DATA_CONTENT_TYPE, |svc| svc.data_content_type);
                let payload = json!({ "__type": error.code(), "message": error.message() });
                let body = serde_json::to_vec(&payload)
                    .unwrap_or_else(|_| FALLBACK_ERROR_BODY.to_vec());
                let mut response = self.finish(request_id, error.status(), content_type, body);
                if let Ok(value) = HeaderValue::from_str(error.code()) {
                    response.headers.insert(HeaderName::from_static(ERROR_TYPE_HEADER), value);
                }
                response
            }
            ResponseFamily::Markup => {
                let root = error_envelope(target.service, request_id, error);
                let body =
                    render_document(&root).unwrap_or_else(|_| FALLBACK_ERROR_BODY.to_vec());
                self.finish(request_id, error.status(), MARKUP_CONTENT_TYPE, body)
            }
        }
    }

    /// Attaches the standard headers.
    fn finish(
        &self,
        request_id: &str,
        status: StatusCode,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> EncodedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        if let Ok(value) = HeaderValue::from_str(&self.server_name) {
            headers.insert(SERVER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&Timestamp::now().to_http_date()) {
            headers.insert(DATE, value);
        }
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.request_ids.tracking_id()) {
            headers.insert(HeaderName::from_static(TRACKING_ID_HEADER), value);
        }
        EncodedResponse {
            status,
            headers,
            body,
        }
    }
}

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Wraps result children in the service's success envelope.
fn success_envelope(
    service: &ServiceDefinition,
    operation: &str,
    request_id: &str,
    children: Vec<XmlNode>,
) -> XmlNode {
    let name = format!("{operation}Response");
    let content = match service.markup_style {
        MarkupStyle::Wrapped => {
            let mut content = Vec::with_capacity(2);
            if !children.is_empty() {
                content.push(XmlNode::parent(format!("{operation}Result"), children));
            }
            content.push(XmlNode::parent(
                "ResponseMetadata",
                vec![XmlNode::text("RequestId", request_id)],
            ));
            content
        }
        MarkupStyle::Flat => {
            let mut content = Vec::with_capacity(children.len() + 1);
            content.push(XmlNode::text("requestId", request_id));
            content.extend(children);
            content
        }
        MarkupStyle::Bare => children,
    };
    XmlNode::parent(name, content).attr("xmlns", service.xml_namespace)
}

/// Builds the error envelope for the service's markup style.
fn error_envelope(
    service: Option<&ServiceDefinition>,
    request_id: &str,
    error: &ApiError,
) -> XmlNode {
    match service.map(|svc| svc.markup_style) {
        Some(MarkupStyle::Flat) => XmlNode::parent(
            "Response",
            vec![
                XmlNode::parent(
                    "Errors",
                    vec![XmlNode::parent(
                        "Error",
                        vec![
                            XmlNode::text("Code", error.code()),
                            XmlNode::text("Message", error.message()),
                        ],
                    )],
                ),
                XmlNode::text("RequestID", request_id),
            ],
        ),
        _ => {
            let root = XmlNode::parent(
                "ErrorResponse",
                vec![
                    XmlNode::parent(
                        "Error",
                        vec![
                            XmlNode::text("Type", error.fault_type()),
                            XmlNode::text("Code", error.code()),
                            XmlNode::text("Message", error.message()),
                        ],
                    ),
                    XmlNode::text("RequestId", request_id),
                ],
            );
            match service {
                Some(svc) => root.attr("xmlns", svc.xml_namespace),
                None => root,
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn service(style: MarkupStyle) -> ServiceDefinition {
        ServiceDefinition {
            name: "demo",
            target_prefix: None,
            data_content_type: "application/x-amz-json-1.1",
            xml_namespace: "urn:demo",
            markup_style: style,
            operations: &[],
            bindings: Vec::new(),
        }
    }

    fn body(response: &EncodedResponse) -> String {
        String::from_utf8(response.body.clone()).unwrap()
    }

    #[test]
    fn standard_headers_are_always_present() {
        let encoder = ResponseEncoder::new("Stratus");
        let id = encoder.issue_request_id();
        let response = encoder.encode_error(
            &id,
            ErrorTarget {
                service: None,
                family: ResponseFamily::Markup,
            },
            &ApiError::internal("boom"),
        );
        assert_eq!(response.header("server"), Some("Stratus"));
        assert!(response.header("date").unwrap().ends_with(" GMT"));
        assert_eq!(response.header(REQUEST_ID_HEADER), Some(id.as_str()));
        assert!(response.header(TRACKING_ID_HEADER).is_some());
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(&response).contains("<Type>Receiver</Type>"));
    }

    #[test]
    fn wrapped_success_has_result_and_metadata() {
        let encoder = ResponseEncoder::new("Stratus");
        let response = encoder.encode_success(
            "rid",
            &service(MarkupStyle::Wrapped),
            "CreateQueue",
            OperationOutput::markup(vec![XmlNode::text("QueueUrl", "u")]),
        );
        let text = body(&response);
        assert!(text.contains("<CreateQueueResponse xmlns=\"urn:demo\">"));
        assert!(text.contains("<CreateQueueResult><QueueUrl>u</QueueUrl></CreateQueueResult>"));
        assert!(text.contains("<ResponseMetadata><RequestId>rid</RequestId></ResponseMetadata>"));
        assert_eq!(response.header("content-type"), Some(MARKUP_CONTENT_TYPE));
    }

    #[test]
    fn flat_success_leads_with_request_id() {
        let encoder = ResponseEncoder::new("Stratus");
        let response = encoder.encode_success(
            "rid",
            &service(MarkupStyle::Flat),
            "DeleteVolume",
            OperationOutput::markup(vec![XmlNode::text("return", "true")]),
        );
        assert!(body(&response).contains(
            "<DeleteVolumeResponse xmlns=\"urn:demo\"><requestId>rid</requestId>\
             <return>true</return>"
        ));
    }

    #[test]
    fn bare_success_carries_request_id_only_in_headers() {
        let encoder = ResponseEncoder::new("Stratus");
        let response = encoder.encode_success(
            "rid",
            &service(MarkupStyle::Bare),
            "GetHostedZone",
            OperationOutput::markup(vec![XmlNode::text("Name", "example.com.")]),
        );
        let text = body(&response);
        assert!(text.ends_with(
            "<GetHostedZoneResponse xmlns=\"urn:demo\"><Name>example.com.</Name>\
             </GetHostedZoneResponse>"
        ));
        assert!(!text.contains("rid"));
        assert_eq!(response.header(REQUEST_ID_HEADER), Some("rid"));
    }

    #[test]
    fn flat_errors_use_errors_list() {
        let encoder = ResponseEncoder::new("Stratus");
        let response = encoder.encode_error(
            "rid",
            ErrorTarget {
                service: Some(&service(MarkupStyle::Flat)),
                family: ResponseFamily::Markup,
            },
            &ApiError::in_use("VolumeInUse", "attached"),
        );
        let text = body(&response);
        assert!(text.contains("<Response><Errors><Error><Code>VolumeInUse</Code>"));
        assert!(text.contains("<RequestID>rid</RequestID>"));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn data_errors_carry_type_and_message() {
        let encoder = ResponseEncoder::new("Stratus");
        let response = encoder.encode_error(
            "rid",
            ErrorTarget {
                service: Some(&service(MarkupStyle::Bare)),
                family: ResponseFamily::Data,
            },
            &ApiError::validation("bad"),
        );
        let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(value["__type"], "ValidationException");
        assert_eq!(value["message"], "bad");
        assert_eq!(response.header("content-type"), Some("application/x-amz-json-1.1"));
        assert_eq!(response.header(ERROR_TYPE_HEADER), Some("ValidationException"));
    }
}
