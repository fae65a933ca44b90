// crates/stratus-gateway/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: Request pipeline and HTTP transport for the emulator.
// Purpose: Run every request through dispatch, handler, encoder, and audit.
// Dependencies: axum, stratus-config, stratus-core, stratus-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! [`Gateway`] owns the validated registry, the shared store, and the
//! observability sinks, and turns one [`InboundRequest`] into one
//! [`EncodedResponse`]. Every request gets a request id before dispatch, so
//! even unroutable requests are answered with one. Handlers run
//! synchronously; on a multi-thread runtime the HTTP layer moves them off
//! the async workers with `block_in_place`.
//!
//! [`GatewayServer`] builds a gateway from configuration and serves it over
//! HTTP with axum. Every path and method reaches the same fallback handler;
//! routing is the dispatcher's job, not the HTTP router's.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::Uri;
use stratus_config::AuditConfig;
use stratus_config::StoreType;
use stratus_config::StratusConfig;
use stratus_core::EntityStore;
use stratus_core::InMemoryResourceStore;
use stratus_core::NamespaceResolver;
use stratus_core::ProviderIdentity;
use stratus_core::SharedResourceStore;
use stratus_store_sqlite::SqliteResourceStore;

use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::PostureAuditEvent;
use crate::audit::RequestAuditEvent;
use crate::audit::RequestAuditEventParams;
use crate::audit::StderrAuditSink;
use crate::encoder::EncodedResponse;
use crate::encoder::ErrorTarget;
use crate::encoder::ResponseEncoder;
use crate::error::ApiError;
use crate::protocol::InboundRequest;
use crate::protocol::WireConvention;
use crate::registry::HandlerRegistry;
use crate::registry::OperationContext;
use crate::registry::RegistryError;
use crate::services::builtin_services;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::NoopMetrics;
use crate::telemetry::RequestMetricEvent;
use crate::telemetry::RequestOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default `Server` header value.
pub const DEFAULT_SERVER_NAME: &str = "Stratus";

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Request pipeline shared by every connection.
pub struct Gateway {
    /// Validated handler registry.
    registry: HandlerRegistry,
    /// Response encoder and request id source.
    encoder: ResponseEncoder,
    /// Resource store shared by all namespaces.
    store: SharedResourceStore,
    /// Identity embedded in ARNs and URLs.
    identity: ProviderIdentity,
    /// User-Agent to namespace resolver.
    resolver: NamespaceResolver,
    /// Request audit sink.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn GatewayMetrics>,
}

/// What the pipeline learned about a request, for audit and metrics.
#[derive(Default)]
struct RequestSummary {
    /// Convention the request was routed by.
    convention: Option<WireConvention>,
    /// Owning service.
    service: Option<&'static str>,
    /// Operation name.
    operation: Option<&'static str>,
    /// Error code returned to the client.
    error_code: Option<String>,
    /// Error category.
    error_kind: Option<&'static str>,
}

impl RequestSummary {
    /// Records `error` as the request's failure.
    fn fail(&mut self, error: &ApiError) {
        self.error_code = Some(error.code().to_string());
        self.error_kind = Some(error.kind().as_str());
    }
}

impl Gateway {
    /// Creates a gateway with no-op audit and metrics sinks.
    #[must_use]
    pub fn new(
        registry: HandlerRegistry,
        store: SharedResourceStore,
        identity: ProviderIdentity,
        resolver: NamespaceResolver,
    ) -> Self {
        Self {
            registry,
            encoder: ResponseEncoder::new(DEFAULT_SERVER_NAME),
            store,
            identity,
            resolver,
            audit: Arc::new(NoopAuditSink),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Creates a gateway serving the built-in services with default identity
    /// and namespace rules.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the built-in definitions are invalid.
    pub fn with_builtin_services(store: SharedResourceStore) -> Result<Self, RegistryError> {
        let registry = HandlerRegistry::new(builtin_services())?;
        Ok(Self::new(registry, store, ProviderIdentity::default(), NamespaceResolver::default()))
    }

    /// Sets the `Server` header value.
    #[must_use]
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.encoder = ResponseEncoder::new(server_name);
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn GatewayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the handler registry.
    #[must_use]
    pub const fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns the shared store.
    #[must_use]
    pub const fn store(&self) -> &SharedResourceStore {
        &self.store
    }

    /// Handles one request end to end.
    #[must_use]
    pub fn handle(&self, request: &InboundRequest) -> EncodedResponse {
        let started = Instant::now();
        let request_id = self.encoder.issue_request_id();
        let namespace = self.resolver.resolve(request.user_agent());
        let mut summary = RequestSummary::default();
        let response = match self.registry.dispatch(request) {
            Ok(dispatch) => {
                summary.convention = Some(dispatch.convention);
                summary.service = Some(dispatch.service.name);
                summary.operation = Some(dispatch.operation);
                let context = OperationContext {
                    entities: EntityStore::new(&self.store, &self.identity, &namespace),
                    operation: dispatch.operation,
                    request_id: &request_id,
                };
                match (dispatch.handler)(&context, &dispatch.input) {
                    Ok(output) => self.encoder.encode_success(
                        &request_id,
                        dispatch.service,
                        dispatch.operation,
                        output,
                    ),
                    Err(error) => {
                        summary.fail(&error);
                        let target = ErrorTarget {
                            service: Some(dispatch.service),
                            family: dispatch.convention.family(),
                        };
                        self.encoder.encode_error(&request_id, target, &error)
                    }
                }
            }
            Err(failure) => {
                summary.convention = failure.convention;
                summary.service = failure.service.map(|service| service.name);
                summary.fail(&failure.error);
                let target = ErrorTarget {
                    service: failure.service,
                    family: failure.family,
                };
                self.encoder.encode_error(&request_id, target, &failure.error)
            }
        };
        self.observe(request, &request_id, namespace.as_str(), summary, &response, started);
        response
    }

    /// Emits the audit event and metrics for a finished request.
    fn observe(
        &self,
        request: &InboundRequest,
        request_id: &str,
        namespace: &str,
        summary: RequestSummary,
        response: &EncodedResponse,
        started: Instant,
    ) {
        let latency = started.elapsed();
        let outcome = if summary.error_code.is_some() || !response.status.is_success() {
            RequestOutcome::Error
        } else {
            RequestOutcome::Ok
        };
        let metric = RequestMetricEvent {
            convention: summary.convention,
            service: summary.service,
            operation: summary.operation,
            outcome,
            error_kind: summary.error_kind,
        };
        self.metrics.record_request(&metric);
        self.metrics.record_latency(&metric, latency);
        self.audit.record(&RequestAuditEvent::new(RequestAuditEventParams {
            request_id: request_id.to_string(),
            namespace: namespace.to_string(),
            convention: summary.convention,
            service: summary.service,
            operation: summary.operation,
            status: response.status.as_u16(),
            error_code: summary.error_code,
            error_kind: summary.error_kind,
            request_bytes: request.body.len(),
            response_bytes: response.body.len(),
            latency_ms: latency.as_millis(),
        }));
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Builds the axum router for `gateway`.
#[must_use]
pub fn router(gateway: Arc<Gateway>, max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(handle_http)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(gateway)
}

/// Collects the raw request and runs the pipeline.
async fn handle_http(
    State(gateway): State<Arc<Gateway>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> EncodedResponse {
    let request = InboundRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };
    handle_with_blocking(&gateway, &request)
}

/// Runs the pipeline, shifting to a blocking context when available.
fn handle_with_blocking(gateway: &Gateway, request: &InboundRequest) -> EncodedResponse {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| gateway.handle(request))
        }
        _ => gateway.handle(request),
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Configured gateway ready to serve HTTP.
pub struct GatewayServer {
    /// Validated configuration.
    config: StratusConfig,
    /// Shared request pipeline.
    gateway: Arc<Gateway>,
}

impl GatewayServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when validation or initialization fails.
    pub fn from_config(mut config: StratusConfig) -> Result<Self, GatewayServerError> {
        config.validate().map_err(|err| GatewayServerError::Config(err.to_string()))?;
        let store = build_store(&config)?;
        let audit = build_audit_sink(&config.audit)?;
        let registry = HandlerRegistry::new(builtin_services())
            .map_err(|err| GatewayServerError::Init(err.to_string()))?;
        let gateway = Gateway::new(
            registry,
            store,
            config.provider_identity(),
            config.namespace_resolver(),
        )
        .with_server_name(config.server.server_name.clone())
        .with_audit(Arc::clone(&audit));
        emit_posture_warnings(&config, audit.as_ref());
        Ok(Self {
            config,
            gateway: Arc::new(gateway),
        })
    }

    /// Returns the request pipeline.
    #[must_use]
    pub const fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Returns the axum router without binding a socket.
    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.gateway), self.config.server.max_body_bytes)
    }

    /// Binds the configured address and serves until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), GatewayServerError> {
        let addr = self
            .config
            .server
            .bind_addr()
            .map_err(|err| GatewayServerError::Config(err.to_string()))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| GatewayServerError::Transport(format!("http bind failed: {err}")))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| GatewayServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Builds the shared store from configuration.
fn build_store(config: &StratusConfig) -> Result<SharedResourceStore, GatewayServerError> {
    let store = match config.store.store_type {
        StoreType::Memory => SharedResourceStore::from_store(InMemoryResourceStore::new()),
        StoreType::Sqlite => {
            let sqlite = config.store.sqlite().ok_or_else(|| {
                GatewayServerError::Config("sqlite store requires path".to_string())
            })?;
            let store = SqliteResourceStore::new(&sqlite)
                .map_err(|err| GatewayServerError::Init(err.to_string()))?;
            SharedResourceStore::from_store(store)
        }
    };
    Ok(store.with_read_retry(config.read_retry_policy()))
}

/// Builds the audit sink from configuration.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, GatewayServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| GatewayServerError::Init(format!("audit log: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Writes startup posture warnings; stderr when auditing is disabled.
fn emit_posture_warnings(config: &StratusConfig, audit: &dyn AuditSink) {
    let mut warnings = Vec::new();
    if config.server.bind_addr().is_ok_and(|addr| !addr.ip().is_loopback()) {
        warnings.push(PostureAuditEvent::new(
            "non_loopback_bind",
            format!("gateway is reachable beyond loopback at {}", config.server.bind),
        ));
    }
    if config.store.store_type == StoreType::Memory {
        warnings.push(PostureAuditEvent::new(
            "ephemeral_store",
            "memory store in use; resources are lost on restart",
        ));
    }
    for warning in &warnings {
        if config.audit.enabled {
            audit.record_posture(warning);
        } else {
            StderrAuditSink.record_posture(warning);
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
