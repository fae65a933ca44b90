// crates/stratus-gateway/src/error.rs
// ============================================================================
// Module: Gateway API Errors
// Description: Provider-facing error taxonomy for emulated operations.
// Purpose: Carry a code, message, and status class to the response encoder.
// Dependencies: axum, stratus-core, thiserror
// ============================================================================

//! ## Overview
//! Handlers fail with [`ApiError`]. The [`ErrorKind`] fixes the default HTTP
//! status and the markup `Type` (`Sender` for client faults, `Receiver` for
//! server faults); the code string is whatever the emulated provider uses
//! for that situation. Errors are terminal for the request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::StatusCode;
use stratus_core::StoreError;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Error class of an [`ApiError`].
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required request parameter was absent.
    MissingParameter,
    /// A parameter was present but invalid.
    Validation,
    /// The addressed resource does not exist.
    NotFound,
    /// A create collided with an existing resource.
    AlreadyExists,
    /// The resource is referenced by another resource.
    InUse,
    /// The request could not be routed to an operation.
    UnknownOperation,
    /// The emulator failed internally.
    Internal,
}

impl ErrorKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingParameter => "missing_parameter",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InUse => "in_use",
            Self::UnknownOperation => "unknown_operation",
            Self::Internal => "internal",
        }
    }

    /// Returns the default HTTP status for the kind.
    #[must_use]
    pub const fn default_status(self) -> StatusCode {
        match self {
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error returned by an emulated operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Error class.
    kind: ErrorKind,
    /// Provider error code rendered on the wire.
    code: String,
    /// Human-readable message.
    message: String,
    /// Status override; defaults to the kind's status.
    status: Option<StatusCode>,
}

impl ApiError {
    /// Builds an error of the given kind and code.
    #[must_use]
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Reports a missing required parameter.
    #[must_use]
    pub fn missing_parameter(name: &str) -> Self {
        Self::new(
            ErrorKind::MissingParameter,
            "MissingParameter",
            format!("The request must contain the parameter {name}"),
        )
    }

    /// Reports an invalid parameter value.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, "ValidationException", message)
    }

    /// Reports a missing resource under a provider code.
    #[must_use]
    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    /// Reports a create collision under a provider code.
    #[must_use]
    pub fn already_exists(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, code, message)
    }

    /// Reports a resource that is still referenced.
    #[must_use]
    pub fn in_use(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InUse, code, message)
    }

    /// Reports a request that names no known operation.
    #[must_use]
    pub fn unknown_operation(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownOperation, code, message)
    }

    /// Reports an internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, "InternalFailure", message)
    }

    /// Overrides the HTTP status.
    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the error class.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the provider code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status to render.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.kind.default_status())
    }

    /// Returns the markup fault party: `Sender` or `Receiver`.
    #[must_use]
    pub fn fault_type(&self) -> &'static str {
        if self.status().is_server_error() { "Receiver" } else { "Sender" }
    }

    /// Maps a store error using service-specific codes for the not-found and
    /// collision cases.
    #[must_use]
    pub fn from_store(err: StoreError, not_found_code: &str, exists_code: &str) -> Self {
        match err {
            StoreError::NotFound(id) => {
                Self::not_found(not_found_code, format!("resource not found: {id}"))
            }
            StoreError::AlreadyExists(id) => {
                Self::already_exists(exists_code, format!("resource already exists: {id}"))
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::from_store(err, "ResourceNotFoundException", "ResourceAlreadyExistsException")
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
