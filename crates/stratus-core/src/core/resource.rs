// crates/stratus-core/src/core/resource.rs
// ============================================================================
// Module: Stratus Resource Model
// Description: The single generic entity persisted by every store backend.
// Purpose: Carry a composite key plus an opaque attribute blob.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Resource`] is the only thing Stratus persists. Attributes are an
//! untyped JSON value at this layer; services decode them into typed structs
//! through [`crate::runtime::EntityStore`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::NamespaceId;
use crate::core::identifiers::ResourceId;
use crate::core::identifiers::ResourceKey;
use crate::core::identifiers::ResourceType;
use crate::core::identifiers::ServiceName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Resource
// ============================================================================

/// Generic persisted resource row.
///
/// # Invariants
/// - `(identifier, namespace)` is unique across a store.
/// - `created_at` is set once by the creator and never rewritten by updates.
/// - `attributes` has no schema at the store layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identifier.
    pub identifier: ResourceId,
    /// Owning namespace.
    pub namespace: NamespaceId,
    /// Owning service.
    pub service: ServiceName,
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Opaque attribute blob.
    pub attributes: Value,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Resource {
    /// Builds a resource from a key, attributes, and creation time.
    #[must_use]
    pub fn new(key: ResourceKey, attributes: Value, created_at: Timestamp) -> Self {
        Self {
            identifier: key.identifier,
            namespace: key.namespace,
            service: key.service,
            resource_type: key.resource_type,
            attributes,
            created_at,
        }
    }

    /// Returns the composite key of this resource.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            identifier: self.identifier.clone(),
            namespace: self.namespace.clone(),
            service: self.service.clone(),
            resource_type: self.resource_type.clone(),
        }
    }

    /// Returns true when the resource lives under `key`.
    #[must_use]
    pub fn matches(&self, key: &ResourceKey) -> bool {
        self.identifier == key.identifier
            && self.namespace == key.namespace
            && self.service == key.service
            && self.resource_type == key.resource_type
    }
}
