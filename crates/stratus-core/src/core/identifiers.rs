// crates/stratus-core/src/core/identifiers.rs
// ============================================================================
// Module: Stratus Identifiers
// Description: Opaque string identifiers for resources, namespaces, and services.
// Purpose: Keep the four composite-key components from being swapped by accident.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each component of a resource's composite key gets its own newtype. All of
//! them serialize as bare strings. Validation happens at the protocol boundary,
//! never inside these wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares a transparent string identifier with the usual conversions.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier!(
    /// Resource identifier, unique per namespace across the whole store.
    ResourceId
);

string_identifier!(
    /// Tenant namespace derived from request metadata.
    NamespaceId
);

string_identifier!(
    /// Emulated API family (for example `dynamodb` or `sqs`).
    ServiceName
);

string_identifier!(
    /// Resource kind within a service (for example `table` or `queue`).
    ResourceType
);

// ============================================================================
// SECTION: Composite Keys
// ============================================================================

/// Fully-qualified key for a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Resource identifier.
    pub identifier: ResourceId,
    /// Owning namespace.
    pub namespace: NamespaceId,
    /// Owning service.
    pub service: ServiceName,
    /// Resource kind.
    pub resource_type: ResourceType,
}

impl ResourceKey {
    /// Builds a key from its four components.
    #[must_use]
    pub fn new(
        identifier: impl Into<ResourceId>,
        namespace: impl Into<NamespaceId>,
        service: impl Into<ServiceName>,
        resource_type: impl Into<ResourceType>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            namespace: namespace.into(),
            service: service.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Returns the list scope this key belongs to.
    #[must_use]
    pub fn scope(&self) -> ResourceScope {
        ResourceScope {
            namespace: self.namespace.clone(),
            service: self.service.clone(),
            resource_type: self.resource_type.clone(),
        }
    }
}

/// Scope used to list resources of one kind in one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceScope {
    /// Owning namespace.
    pub namespace: NamespaceId,
    /// Owning service.
    pub service: ServiceName,
    /// Resource kind.
    pub resource_type: ResourceType,
}

impl ResourceScope {
    /// Builds a scope from its components.
    #[must_use]
    pub fn new(
        namespace: impl Into<NamespaceId>,
        service: impl Into<ServiceName>,
        resource_type: impl Into<ResourceType>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            service: service.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Returns the key for `identifier` inside this scope.
    #[must_use]
    pub fn key(&self, identifier: impl Into<ResourceId>) -> ResourceKey {
        ResourceKey {
            identifier: identifier.into(),
            namespace: self.namespace.clone(),
            service: self.service.clone(),
            resource_type: self.resource_type.clone(),
        }
    }
}
