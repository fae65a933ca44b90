// crates/stratus-gateway/src/registry.rs
// ============================================================================
// Module: Handler Registry
// Description: Startup-validated routing table from route keys to handlers.
// Purpose: Make every operation reachable exactly once per route key.
// Dependencies: axum, stratus-core, thiserror
// ============================================================================

//! ## Overview
//! Each emulated service contributes one [`ServiceDefinition`]: the
//! operations it declares and the [`Binding`]s that route requests to them.
//! [`HandlerRegistry::new`] refuses to start when:
//! - a declared operation has no binding, or a binding names an undeclared
//!   operation,
//! - two bindings share a route key (target prefix plus operation, `Action`
//!   value, or method plus path shape),
//! - a service binds more than two wire conventions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use axum::http::Method;
use stratus_core::EntityStore;
use thiserror::Error;

use crate::error::ApiError;
use crate::protocol::OperationInput;
use crate::protocol::OperationOutput;
use crate::protocol::WireConvention;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of wire conventions one service may bind.
pub const MAX_CONVENTIONS_PER_SERVICE: usize = 2;

// ============================================================================
// SECTION: Handler Types
// ============================================================================

/// Per-request context handed to a handler.
#[derive(Clone, Copy)]
pub struct OperationContext<'a> {
    /// Namespace-scoped typed store.
    pub entities: EntityStore<'a>,
    /// Operation being executed.
    pub operation: &'static str,
    /// Request id that will be returned to the client.
    pub request_id: &'a str,
}

/// Operation handler.
pub type Handler = fn(&OperationContext<'_>, &OperationInput) -> Result<OperationOutput, ApiError>;

/// Envelope layout for markup responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupStyle {
    /// `<OpResponse><OpResult>..</OpResult><ResponseMetadata>` with
    /// `<ErrorResponse>` errors.
    Wrapped,
    /// `<OpResponse><requestId>..` children inline, with
    /// `<Response><Errors>` errors.
    Flat,
    /// `<OpResponse>` children only; request id travels in headers.
    Bare,
}

/// How requests reach a bound operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `X-Amz-Target: <prefix>.<operation>`.
    Target,
    /// `Action=<operation>`.
    Action,
    /// Method plus path shape with `{param}` segments.
    Rest {
        /// HTTP method.
        method: Method,
        /// Path shape, e.g. `/2013-04-01/hostedzone/{Id}`.
        path: &'static str,
    },
}

impl Route {
    /// Returns the convention this route belongs to.
    #[must_use]
    pub const fn convention(&self) -> WireConvention {
        match self {
            Self::Target => WireConvention::TargetHeader,
            Self::Action => WireConvention::QueryAction,
            Self::Rest {
                ..
            } => WireConvention::RestPath,
        }
    }
}

/// Binding of one operation to one route.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Operation name.
    pub operation: &'static str,
    /// Route that reaches it.
    pub route: Route,
    /// Handler.
    pub handler: Handler,
}

impl Binding {
    /// Binds `operation` under the target-header convention.
    #[must_use]
    pub const fn target(operation: &'static str, handler: Handler) -> Self {
        Self {
            operation,
            route: Route::Target,
            handler,
        }
    }

    /// Binds `operation` under the query-action convention.
    #[must_use]
    pub const fn action(operation: &'static str, handler: Handler) -> Self {
        Self {
            operation,
            route: Route::Action,
            handler,
        }
    }

    /// Binds `operation` to a method and path shape.
    #[must_use]
    pub fn rest(
        operation: &'static str,
        method: Method,
        path: &'static str,
        handler: Handler,
    ) -> Self {
        Self {
            operation,
            route: Route::Rest {
                method,
                path,
            },
            handler,
        }
    }
}

/// Everything the gateway needs to know about one emulated service.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// Service name, e.g. `sqs`.
    pub name: &'static str,
    /// Prefix before the `.` in the target header, when bound.
    pub target_prefix: Option<&'static str>,
    /// Content type of data-family responses.
    pub data_content_type: &'static str,
    /// XML namespace of markup responses.
    pub xml_namespace: &'static str,
    /// Markup envelope layout.
    pub markup_style: MarkupStyle,
    /// Declared operations.
    pub operations: &'static [&'static str],
    /// Routes to those operations.
    pub bindings: Vec<Binding>,
}

// ============================================================================
// SECTION: Path Patterns
// ============================================================================

/// One segment of a path shape.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Must match exactly.
    Literal(String),
    /// Captures the segment under this name.
    Param(String),
}

/// Parsed path shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    /// Segments between `/` separators.
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a path shape such as `/2013-04-01/hostedzone/{Id}/rrset`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPath`] for shapes without a leading
    /// `/`, with empty segments, or with malformed braces.
    pub fn parse(shape: &str) -> Result<Self, RegistryError> {
        let rest = shape
            .strip_prefix('/')
            .ok_or_else(|| RegistryError::InvalidPath(shape.to_string()))?;
        let mut segments = Vec::new();
        for raw in rest.split('/') {
            if raw.is_empty() {
                return Err(RegistryError::InvalidPath(shape.to_string()));
            }
            let segment = match raw.strip_prefix('{').and_then(|inner| inner.strip_suffix('}')) {
                Some(name) if !name.is_empty() && !name.contains(['{', '}']) => {
                    Segment::Param(name.to_string())
                }
                Some(_) => return Err(RegistryError::InvalidPath(shape.to_string())),
                None if raw.contains(['{', '}']) => {
                    return Err(RegistryError::InvalidPath(shape.to_string()));
                }
                None => Segment::Literal(raw.to_string()),
            };
            segments.push(segment);
        }
        Ok(Self {
            segments,
        })
    }

    /// Matches a request path, returning captured parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let trimmed = path.strip_prefix('/')?;
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut captured = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Param(name) if !part.is_empty() => {
                    captured.insert(name.clone(), part.to_string());
                }
                _ => return None,
            }
        }
        Some(captured)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two definitions share a service name.
    #[error("duplicate service: {0}")]
    DuplicateService(String),
    /// A declared operation has no binding.
    #[error("operation {service}.{operation} is declared but not bound")]
    UnboundOperation {
        /// Service name.
        service: String,
        /// Operation name.
        operation: String,
    },
    /// A binding names an operation the service does not declare.
    #[error("operation {service}.{operation} is bound but not declared")]
    UndeclaredOperation {
        /// Service name.
        service: String,
        /// Operation name.
        operation: String,
    },
    /// A service binds too many conventions.
    #[error("service {0} binds more than two wire conventions")]
    TooManyConventions(String),
    /// A target binding exists without a target prefix.
    #[error("service {0} binds target operations without a target prefix")]
    MissingTargetPrefix(String),
    /// Two bindings share a route key.
    #[error("duplicate route: {0}")]
    DuplicateRoute(String),
    /// A path shape failed to parse.
    #[error("invalid path shape: {0}")]
    InvalidPath(String),
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Resolved route target.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RouteTarget {
    /// Index into the service list.
    pub service: usize,
    /// Operation name.
    pub operation: &'static str,
    /// Handler.
    pub handler: Handler,
}

/// Path-routed entry.
#[derive(Debug, Clone)]
pub(crate) struct RestRoute {
    /// HTTP method.
    pub method: Method,
    /// Parsed path shape.
    pub pattern: PathPattern,
    /// Route target.
    pub target: RouteTarget,
}

/// Validated routing table.
#[derive(Debug)]
pub struct HandlerRegistry {
    /// Registered services, in registration order.
    services: Vec<ServiceDefinition>,
    /// Target-header routes keyed by prefix, then operation.
    targets: BTreeMap<&'static str, BTreeMap<&'static str, RouteTarget>>,
    /// Query-action routes keyed by `Action` value.
    actions: BTreeMap<&'static str, RouteTarget>,
    /// Path routes in registration order.
    rest: Vec<RestRoute>,
}

impl HandlerRegistry {
    /// Builds and validates the routing table.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when any registration rule is violated.
    pub fn new(services: Vec<ServiceDefinition>) -> Result<Self, RegistryError> {
        let mut names = BTreeSet::new();
        let mut targets: BTreeMap<&'static str, BTreeMap<&'static str, RouteTarget>> =
            BTreeMap::new();
        let mut actions = BTreeMap::new();
        let mut rest: Vec<RestRoute> = Vec::new();
        for (index, service) in services.iter().enumerate() {
            if !names.insert(service.name) {
                return Err(RegistryError::DuplicateService(service.name.to_string()));
            }
            validate_operations(service)?;
            if let Some(prefix) = service.target_prefix
                && targets.contains_key(prefix)
            {
                return Err(RegistryError::DuplicateRoute(format!("target prefix {prefix}")));
            }
            for binding in &service.bindings {
                let target = RouteTarget {
                    service: index,
                    operation: binding.operation,
                    handler: binding.handler,
                };
                match &binding.route {
                    Route::Target => {
                        let prefix = service.target_prefix.ok_or_else(|| {
                            RegistryError::MissingTargetPrefix(service.name.to_string())
                        })?;
                        let operations = targets.entry(prefix).or_default();
                        if operations.insert(binding.operation, target).is_some() {
                            return Err(RegistryError::DuplicateRoute(format!(
                                "{prefix}.{}",
                                binding.operation
                            )));
                        }
                    }
                    Route::Action => {
                        if actions.insert(binding.operation, target).is_some() {
                            return Err(RegistryError::DuplicateRoute(format!(
                                "Action={}",
                                binding.operation
                            )));
                        }
                    }
                    Route::Rest {
                        method,
                        path,
                    } => {
                        let pattern = PathPattern::parse(path)?;
                        let taken = rest
                            .iter()
                            .any(|route| &route.method == method && route.pattern == pattern);
                        if taken {
                            return Err(RegistryError::DuplicateRoute(format!("{method} {path}")));
                        }
                        rest.push(RestRoute {
                            method: method.clone(),
                            pattern,
                            target,
                        });
                    }
                }
            }
        }
        Ok(Self {
            services,
            targets,
            actions,
            rest,
        })
    }

    /// Returns the registered services.
    #[must_use]
    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    /// Returns the service at `index`.
    pub(crate) fn service(&self, index: usize) -> Option<&ServiceDefinition> {
        self.services.get(index)
    }

    /// Resolves a target-header route.
    pub(crate) fn target(&self, prefix: &str, operation: &str) -> Option<RouteTarget> {
        self.targets.get(prefix).and_then(|operations| operations.get(operation)).copied()
    }

    /// Returns the service owning a target prefix.
    pub(crate) fn target_service(&self, prefix: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|service| service.target_prefix == Some(prefix))
    }

    /// Resolves a query-action route.
    pub(crate) fn action(&self, action: &str) -> Option<RouteTarget> {
        self.actions.get(action).copied()
    }

    /// Resolves a path route, returning captured path parameters.
    pub(crate) fn rest(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(RouteTarget, BTreeMap<String, String>)> {
        self.rest.iter().filter(|route| &route.method == method).find_map(|route| {
            route.pattern.matches(path).map(|captured| (route.target, captured))
        })
    }
}

/// Checks declared operations against bindings and the convention budget.
fn validate_operations(service: &ServiceDefinition) -> Result<(), RegistryError> {
    let declared: BTreeSet<&str> = service.operations.iter().copied().collect();
    let bound: BTreeSet<&str> = service.bindings.iter().map(|binding| binding.operation).collect();
    if let Some(operation) = declared.difference(&bound).next() {
        return Err(RegistryError::UnboundOperation {
            service: service.name.to_string(),
            operation: (*operation).to_string(),
        });
    }
    if let Some(operation) = bound.difference(&declared).next() {
        return Err(RegistryError::UndeclaredOperation {
            service: service.name.to_string(),
            operation: (*operation).to_string(),
        });
    }
    let conventions: BTreeSet<WireConvention> =
        service.bindings.iter().map(|binding| binding.route.convention()).collect();
    if conventions.len() > MAX_CONVENTIONS_PER_SERVICE {
        return Err(RegistryError::TooManyConventions(service.name.to_string()));
    }
    Ok(())
}
