// crates/stratus-gateway/src/lib.rs
// ============================================================================
// Module: Stratus Gateway Library
// Description: HTTP front door for the Stratus emulator.
// Purpose: Dispatch wire requests to service handlers and encode responses.
// Dependencies: axum, quick-xml, stratus-core, stratus-config
// ============================================================================

//! ## Overview
//! The gateway turns raw HTTP requests into typed handler calls. The
//! [`HandlerRegistry`] is built once from every [`ServiceDefinition`] and
//! validated at startup; the dispatcher picks a handler by wire convention;
//! the [`ResponseEncoder`] renders results and errors in the convention the
//! request arrived in. Each request is handled synchronously end to end.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod dispatch;
pub mod encoder;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod request_id;
pub mod server;
pub mod services;
pub mod telemetry;
pub mod xml;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RequestAuditEvent;
pub use audit::StderrAuditSink;
pub use dispatch::Dispatch;
pub use dispatch::DispatchFailure;
pub use encoder::EncodedResponse;
pub use encoder::ResponseEncoder;
pub use error::ApiError;
pub use error::ErrorKind;
pub use protocol::InboundRequest;
pub use protocol::OperationInput;
pub use protocol::OperationOutput;
pub use protocol::ResponseFamily;
pub use protocol::WireConvention;
pub use registry::Binding;
pub use registry::HandlerRegistry;
pub use registry::MarkupStyle;
pub use registry::OperationContext;
pub use registry::RegistryError;
pub use registry::Route;
pub use registry::ServiceDefinition;
pub use server::Gateway;
pub use server::GatewayServer;
pub use server::GatewayServerError;
pub use telemetry::GatewayMetrics;
pub use telemetry::NoopMetrics;
pub use xml::XmlNode;
