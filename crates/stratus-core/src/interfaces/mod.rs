// crates/stratus-core/src/interfaces/mod.rs
// ============================================================================
// Module: Stratus Interfaces
// Description: Backend-agnostic contract for resource persistence.
// Purpose: Let handlers run unchanged over in-memory and durable stores.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! [`ResourceStore`] is the only persistence seam in Stratus. Implementations
//! must be safe to share across request threads; each call is atomic for the
//! single row it touches and nothing is transactional across rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::Resource;
use crate::core::ResourceKey;
use crate::core::ResourceScope;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Resource store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No resource exists under the requested key.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// A resource already occupies the `(identifier, namespace)` slot.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),
    /// Store I/O error.
    #[error("resource store io error: {0}")]
    Io(String),
    /// Stored data failed to decode.
    #[error("resource store corruption: {0}")]
    Corrupt(String),
    /// Caller supplied invalid data.
    #[error("resource store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("resource store error: {0}")]
    Store(String),
}

impl StoreError {
    /// Returns true for [`StoreError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ============================================================================
// SECTION: Resource Store
// ============================================================================

/// Generic persistent map from composite key to attribute blob.
pub trait ResourceStore {
    /// Inserts a new resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when `(identifier, namespace)` is taken.
    fn create(&self, resource: &Resource) -> Result<(), StoreError>;

    /// Fetches a resource by its full key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row matches all four key parts.
    fn get(&self, key: &ResourceKey) -> Result<Resource, StoreError>;

    /// Lists every resource in a scope, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn list(&self, scope: &ResourceScope) -> Result<Vec<Resource>, StoreError>;

    /// Replaces the attribute blob of an existing resource.
    ///
    /// `created_at` on the stored row is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the row does not exist.
    fn update(&self, resource: &Resource) -> Result<(), StoreError>;

    /// Deletes a resource by its full key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row matches.
    fn delete(&self, key: &ResourceKey) -> Result<(), StoreError>;
}
