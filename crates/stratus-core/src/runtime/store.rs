// crates/stratus-core/src/runtime/store.rs
// ============================================================================
// Module: Stratus In-Memory Store
// Description: In-memory resource store plus the shared store wrapper.
// Purpose: Provide a dependency-free backend and read-after-write retry.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryResourceStore`] keeps rows in a mutex-guarded `BTreeMap` keyed
//! by `(namespace, identifier)`. [`SharedResourceStore`] wraps any backend in
//! an `Arc` so handlers can clone it freely, and attaches the bounded
//! [`ReadRetryPolicy`] that `get` applies before surfacing not-found.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::core::NamespaceId;
use crate::core::Resource;
use crate::core::ResourceId;
use crate::core::ResourceKey;
use crate::core::ResourceScope;
use crate::interfaces::ResourceStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Map key for the in-memory store.
type RowKey = (NamespaceId, ResourceId);

/// In-memory resource store for tests and ephemeral runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryResourceStore {
    /// Resource rows protected by a mutex.
    rows: Arc<Mutex<BTreeMap<RowKey, Resource>>>,
}

impl InMemoryResourceStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Locks the row map.
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<RowKey, Resource>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Store("resource store mutex poisoned".to_string()))
    }
}

/// Builds the map key for a resource key.
fn row_key(key: &ResourceKey) -> RowKey {
    (key.namespace.clone(), key.identifier.clone())
}

impl ResourceStore for InMemoryResourceStore {
    fn create(&self, resource: &Resource) -> Result<(), StoreError> {
        let key = row_key(&resource.key());
        let mut guard = self.lock()?;
        if guard.contains_key(&key) {
            return Err(StoreError::AlreadyExists(resource.identifier.to_string()));
        }
        guard.insert(key, resource.clone());
        drop(guard);
        Ok(())
    }

    fn get(&self, key: &ResourceKey) -> Result<Resource, StoreError> {
        let guard = self.lock()?;
        guard
            .get(&row_key(key))
            .filter(|resource| resource.matches(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.identifier.to_string()))
    }

    fn list(&self, scope: &ResourceScope) -> Result<Vec<Resource>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .values()
            .filter(|resource| {
                resource.namespace == scope.namespace
                    && resource.service == scope.service
                    && resource.resource_type == scope.resource_type
            })
            .cloned()
            .collect())
    }

    fn update(&self, resource: &Resource) -> Result<(), StoreError> {
        let key = resource.key();
        let mut guard = self.lock()?;
        let existing = guard
            .get_mut(&row_key(&key))
            .filter(|existing| existing.matches(&key))
            .ok_or_else(|| StoreError::NotFound(key.identifier.to_string()))?;
        existing.attributes = resource.attributes.clone();
        drop(guard);
        Ok(())
    }

    fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let row = row_key(key);
        match guard.get(&row) {
            Some(existing) if existing.matches(key) => {
                guard.remove(&row);
                Ok(())
            }
            _ => Err(StoreError::NotFound(key.identifier.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Read Retry Policy
// ============================================================================

/// Default number of `get` attempts before not-found is surfaced.
pub const DEFAULT_READ_ATTEMPTS: u32 = 3;
/// Default delay between `get` attempts.
pub const DEFAULT_READ_DELAY: Duration = Duration::from_millis(50);

/// Bounded fixed-delay retry applied to reads that may follow a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRetryPolicy {
    /// Total attempts, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay slept between attempts.
    pub delay: Duration,
}

impl Default for ReadRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_READ_ATTEMPTS,
            delay: DEFAULT_READ_DELAY,
        }
    }
}

impl ReadRetryPolicy {
    /// Policy with a single attempt and no delay.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared resource store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedResourceStore {
    /// Inner store implementation.
    inner: Arc<dyn ResourceStore + Send + Sync>,
    /// Retry policy applied by [`ResourceStore::get`].
    read_retry: ReadRetryPolicy,
}

impl SharedResourceStore {
    /// Wraps a resource store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl ResourceStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
            read_retry: ReadRetryPolicy::default(),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore + Send + Sync>) -> Self {
        Self {
            inner: store,
            read_retry: ReadRetryPolicy::default(),
        }
    }

    /// Replaces the read retry policy.
    #[must_use]
    pub const fn with_read_retry(mut self, policy: ReadRetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    /// Returns the active read retry policy.
    #[must_use]
    pub const fn read_retry(&self) -> ReadRetryPolicy {
        self.read_retry
    }

    /// Single-attempt existence check; maps not-found to `None`.
    ///
    /// Used where absence is an expected answer (idempotent create checks),
    /// so no retry delay is paid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for any backend failure other than not-found.
    pub fn lookup(&self, key: &ResourceKey) -> Result<Option<Resource>, StoreError> {
        match self.inner.get(key) {
            Ok(resource) => Ok(Some(resource)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl ResourceStore for SharedResourceStore {
    fn create(&self, resource: &Resource) -> Result<(), StoreError> {
        self.inner.create(resource)
    }

    fn get(&self, key: &ResourceKey) -> Result<Resource, StoreError> {
        let attempts = self.read_retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.get(key) {
                Err(StoreError::NotFound(_)) if attempt < attempts => {
                    attempt += 1;
                    if !self.read_retry.delay.is_zero() {
                        thread::sleep(self.read_retry.delay);
                    }
                }
                result => return result,
            }
        }
    }

    fn list(&self, scope: &ResourceScope) -> Result<Vec<Resource>, StoreError> {
        self.inner.list(scope)
    }

    fn update(&self, resource: &Resource) -> Result<(), StoreError> {
        self.inner.update(resource)
    }

    fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
}
