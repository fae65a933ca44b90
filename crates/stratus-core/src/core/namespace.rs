// crates/stratus-core/src/core/namespace.rs
// ============================================================================
// Module: Stratus Namespace Resolver
// Description: Derives a tenant namespace from the client identification string.
// Purpose: Let independent test suites share one emulator without colliding.
// Dependencies: crate::core::identifiers
// ============================================================================

//! ## Overview
//! Clients select a namespace by appending a marker-prefixed token to their
//! `User-Agent`, for example `sdk/1.0 custom-teamA`. Only the last
//! whitespace-delimited token is inspected. Anything else falls back to the
//! shared default namespace. Resolution never fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::NamespaceId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default marker prefix that opts a request into a custom namespace.
pub const DEFAULT_NAMESPACE_MARKER: &str = "custom-";
/// Default shared namespace.
pub const DEFAULT_NAMESPACE: &str = "default";
/// Maximum accepted namespace length; longer tokens fall back to the default.
pub const MAX_NAMESPACE_LENGTH: usize = 128;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Maps client identification strings to namespaces.
///
/// # Invariants
/// - Resolution is pure; equal inputs always yield equal namespaces.
/// - The result is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceResolver {
    /// Marker prefix on the last user-agent token.
    marker: String,
    /// Namespace used when no marker token is present.
    default_namespace: NamespaceId,
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE_MARKER, DEFAULT_NAMESPACE)
    }
}

impl NamespaceResolver {
    /// Builds a resolver with an explicit marker and default namespace.
    #[must_use]
    pub fn new(marker: impl Into<String>, default_namespace: impl Into<NamespaceId>) -> Self {
        Self {
            marker: marker.into(),
            default_namespace: default_namespace.into(),
        }
    }

    /// Returns the default namespace.
    #[must_use]
    pub const fn default_namespace(&self) -> &NamespaceId {
        &self.default_namespace
    }

    /// Resolves the namespace for an optional user-agent value.
    #[must_use]
    pub fn resolve(&self, user_agent: Option<&str>) -> NamespaceId {
        user_agent
            .and_then(|agent| agent.split_whitespace().next_back())
            .and_then(|token| token.strip_prefix(self.marker.as_str()))
            .filter(|name| !name.is_empty() && name.len() <= MAX_NAMESPACE_LENGTH)
            .map_or_else(|| self.default_namespace.clone(), NamespaceId::from)
    }
}
