// crates/stratus-core/src/runtime/entity.rs
// ============================================================================
// Module: Stratus Entity Layer
// Description: Typed attribute bags, idempotent create policies, normalization.
// Purpose: Keep every stored and returned entity internally consistent.
// Dependencies: serde, serde_json, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Services never touch [`Resource`] attribute blobs directly. They declare a
//! typed attribute struct implementing [`EntityKind`] and go through
//! [`EntityStore`], which:
//! - applies the kind's [`IdempotencyPolicy`] on create,
//! - runs [`EntityKind::normalize`] before every write and after every read,
//! - decodes blobs that fail to parse as [`StoreError::Corrupt`].
//!
//! Normalizers must be idempotent and infallible: missing data is replaced by
//! documented defaults rather than rejected.
//!
//! Store identifiers are unique per namespace across every service, so the
//! entity layer qualifies each logical name as `{service}:{type}/{name}`.
//! Handlers only ever see the logical name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::NamespaceId;
use crate::core::ProviderIdentity;
use crate::core::Resource;
use crate::core::ResourceId;
use crate::core::ResourceKey;
use crate::core::ResourceScope;
use crate::core::Timestamp;
use crate::interfaces::ResourceStore;
use crate::interfaces::StoreError;
use crate::runtime::store::SharedResourceStore;

// ============================================================================
// SECTION: Policies
// ============================================================================

/// What a second create of an existing identifier does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyPolicy {
    /// Second create fails with [`StoreError::AlreadyExists`].
    StrictConflict,
    /// Second create returns the stored entity without writing.
    IdempotentReturn,
    /// Second create merges the provided fields onto the stored entity.
    IdempotentMerge,
}

/// Inputs available to a normalizer.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Logical name of the entity being normalized.
    pub name: &'a str,
    /// Namespace the entity lives in.
    pub namespace: &'a NamespaceId,
    /// Provider identity used for derived names.
    pub identity: &'a ProviderIdentity,
}

/// Typed attribute bag for one `(service, type)` pair.
pub trait EntityKind: Serialize + DeserializeOwned + Default + Clone {
    /// Owning service name.
    const SERVICE: &'static str;
    /// Resource type within the service.
    const RESOURCE_TYPE: &'static str;
    /// Create policy for this kind.
    const POLICY: IdempotencyPolicy;

    /// Enforces mode-exclusive fields, non-empty collections, and derived
    /// fields. Must be idempotent.
    fn normalize(&mut self, ctx: &NormalizeContext<'_>);
}

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Decoded, normalized entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<T> {
    /// Composite key of the underlying resource.
    pub key: ResourceKey,
    /// Logical name (the identifier without its kind qualifier).
    pub name: String,
    /// Creation time of the underlying resource.
    pub created_at: Timestamp,
    /// Typed attributes.
    pub attributes: T,
}

impl<T> Entity<T> {
    /// Returns the qualified store identifier.
    #[must_use]
    pub const fn identifier(&self) -> &ResourceId {
        &self.key.identifier
    }
}

/// Returns the store identifier of `name` for kind `T`.
#[must_use]
pub fn qualified_identifier<T: EntityKind>(name: &str) -> ResourceId {
    ResourceId::new(format!("{}:{}/{name}", T::SERVICE, T::RESOURCE_TYPE))
}

/// Recovers the logical name from a qualified identifier.
fn logical_name<T: EntityKind>(identifier: &ResourceId) -> String {
    let prefix = format!("{}:{}/", T::SERVICE, T::RESOURCE_TYPE);
    identifier.as_str().strip_prefix(prefix.as_str()).unwrap_or(identifier.as_str()).to_string()
}

/// Result of a policy-gated create.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome<T> {
    /// A new row was written.
    Created(Entity<T>),
    /// The existing row was returned untouched.
    Existing(Entity<T>),
    /// The incoming fields were merged into the existing row.
    Merged(Entity<T>),
}

impl<T> CreateOutcome<T> {
    /// Returns true when a new row was written.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Returns the resulting entity.
    #[must_use]
    pub fn into_entity(self) -> Entity<T> {
        match self {
            Self::Created(entity) | Self::Existing(entity) | Self::Merged(entity) => entity,
        }
    }
}

// ============================================================================
// SECTION: Entity Store
// ============================================================================

/// Namespace-scoped typed view over a [`SharedResourceStore`].
#[derive(Clone, Copy)]
pub struct EntityStore<'a> {
    /// Backing store.
    store: &'a SharedResourceStore,
    /// Provider identity handed to normalizers.
    identity: &'a ProviderIdentity,
    /// Namespace every call is scoped to.
    namespace: &'a NamespaceId,
}

impl<'a> EntityStore<'a> {
    /// Creates a typed view for one namespace.
    #[must_use]
    pub const fn new(
        store: &'a SharedResourceStore,
        identity: &'a ProviderIdentity,
        namespace: &'a NamespaceId,
    ) -> Self {
        Self {
            store,
            identity,
            namespace,
        }
    }

    /// Returns the namespace this view is scoped to.
    #[must_use]
    pub const fn namespace(&self) -> &NamespaceId {
        self.namespace
    }

    /// Returns the provider identity.
    #[must_use]
    pub const fn identity(&self) -> &ProviderIdentity {
        self.identity
    }

    /// Builds the key of the `T` entity called `name` in this namespace.
    #[must_use]
    pub fn key<T: EntityKind>(&self, name: &str) -> ResourceKey {
        ResourceKey::new(
            qualified_identifier::<T>(name),
            self.namespace.clone(),
            T::SERVICE,
            T::RESOURCE_TYPE,
        )
    }

    /// Builds the list scope of `T` in this namespace.
    #[must_use]
    pub fn scope<T: EntityKind>(&self) -> ResourceScope {
        ResourceScope::new(self.namespace.clone(), T::SERVICE, T::RESOURCE_TYPE)
    }

    /// Creates an entity under the kind's idempotency policy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] for strict-conflict kinds whose
    /// identifier is taken, and [`StoreError`] for backend failures.
    pub fn create<T: EntityKind>(
        &self,
        name: &str,
        attributes: T,
    ) -> Result<CreateOutcome<T>, StoreError> {
        let key = self.key::<T>(name);
        if T::POLICY != IdempotencyPolicy::StrictConflict
            && let Some(existing) = self.store.lookup(&key)?
        {
            return self.resolve_existing(existing, attributes);
        }
        let fallback =
            (T::POLICY != IdempotencyPolicy::StrictConflict).then(|| attributes.clone());
        let entity = Entity {
            key,
            name: name.to_string(),
            created_at: Timestamp::now(),
            attributes,
        };
        match (self.insert(entity), fallback) {
            (Ok(entity), _) => Ok(CreateOutcome::Created(entity)),
            (Err(StoreError::AlreadyExists(_)), Some(incoming)) => {
                // Lost a create race; treat the winner as the existing row.
                let existing = self.store.get(&self.key::<T>(name))?;
                self.resolve_existing(existing, incoming)
            }
            (Err(err), _) => Err(err),
        }
    }

    /// Fetches an entity, retrying per the store's read policy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] after the retry budget is spent.
    pub fn get<T: EntityKind>(&self, name: &str) -> Result<Entity<T>, StoreError> {
        let resource = self.store.get(&self.key::<T>(name))?;
        self.decode(resource)
    }

    /// Fetches an entity with a single attempt, mapping absence to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for backend or decode failures.
    pub fn find<T: EntityKind>(&self, name: &str) -> Result<Option<Entity<T>>, StoreError> {
        self.store
            .lookup(&self.key::<T>(name))?
            .map(|resource| self.decode(resource))
            .transpose()
    }

    /// Lists every `T` in the namespace, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for backend or decode failures.
    pub fn list<T: EntityKind>(&self) -> Result<Vec<Entity<T>>, StoreError> {
        let mut entities = self
            .store
            .list(&self.scope::<T>())?
            .into_iter()
            .map(|resource| self.decode(resource))
            .collect::<Result<Vec<Entity<T>>, StoreError>>()?;
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entities)
    }

    /// Normalizes and persists an existing entity (full replace).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the row vanished.
    pub fn save<T: EntityKind>(&self, entity: &mut Entity<T>) -> Result<(), StoreError> {
        entity.attributes.normalize(&self.context(&entity.name));
        let resource =
            Resource::new(entity.key.clone(), encode(&entity.attributes)?, entity.created_at);
        self.store.update(&resource)
    }

    /// Deletes an entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the row does not exist.
    pub fn delete<T: EntityKind>(&self, name: &str) -> Result<(), StoreError> {
        self.store.delete(&self.key::<T>(name))
    }

    /// Applies the create policy to a row that already exists.
    fn resolve_existing<T: EntityKind>(
        &self,
        existing: Resource,
        incoming: T,
    ) -> Result<CreateOutcome<T>, StoreError> {
        match T::POLICY {
            IdempotencyPolicy::StrictConflict => {
                Err(StoreError::AlreadyExists(existing.identifier.to_string()))
            }
            IdempotencyPolicy::IdempotentReturn => {
                Ok(CreateOutcome::Existing(self.decode(existing)?))
            }
            IdempotencyPolicy::IdempotentMerge => {
                let mut merged = existing.attributes.clone();
                merge_value(&mut merged, encode(&incoming)?);
                let mut entity = self.decode(Resource {
                    attributes: merged,
                    ..existing
                })?;
                self.save(&mut entity)?;
                Ok(CreateOutcome::Merged(entity))
            }
        }
    }

    /// Normalizes and inserts a fresh entity.
    fn insert<T: EntityKind>(&self, mut entity: Entity<T>) -> Result<Entity<T>, StoreError> {
        entity.attributes.normalize(&self.context(&entity.name));
        let resource =
            Resource::new(entity.key.clone(), encode(&entity.attributes)?, entity.created_at);
        self.store.create(&resource)?;
        Ok(entity)
    }

    /// Decodes and normalizes a stored row.
    fn decode<T: EntityKind>(&self, resource: Resource) -> Result<Entity<T>, StoreError> {
        let key = resource.key();
        let name = logical_name::<T>(&key.identifier);
        let mut attributes: T = serde_json::from_value(resource.attributes).map_err(|err| {
            StoreError::Corrupt(format!("{} {name}: {err}", T::RESOURCE_TYPE))
        })?;
        attributes.normalize(&self.context(&name));
        Ok(Entity {
            key,
            name,
            created_at: resource.created_at,
            attributes,
        })
    }

    /// Builds the normalizer context for `name`.
    fn context<'b>(&'b self, name: &'b str) -> NormalizeContext<'b> {
        NormalizeContext {
            name,
            namespace: self.namespace,
            identity: self.identity,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Encodes typed attributes into a JSON blob.
fn encode<T: Serialize>(attributes: &T) -> Result<Value, StoreError> {
    serde_json::to_value(attributes).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Recursively overlays `incoming` onto `base`. Objects merge key by key;
/// any other incoming value replaces the base value. Incoming nulls are
/// ignored.
pub fn merge_value(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (field, value) in incoming_map {
                match base_map.get_mut(&field) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        if !value.is_null() {
                            base_map.insert(field, value);
                        }
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
