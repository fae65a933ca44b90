// crates/stratus-gateway/src/services/tags.rs
// ============================================================================
// Module: Shared Tagging
// Description: Tag sets keyed by the ARN of the tagged resource.
// Purpose: Give every service the same merge-on-create tagging behavior.
// Dependencies: serde, stratus-core
// ============================================================================

//! ## Overview
//! Tags live beside the resource they describe as a `tag-set` entity whose
//! logical name is the tagged resource's ARN. Creating a tag set that
//! already exists merges the new keys in, so tag calls are naturally
//! idempotent. Deleting the owning resource clears its tag set.
//!
//! A create request that fails after its entity was written calls
//! [`discard`] so the rejected request leaves nothing behind.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use stratus_core::EntityKind;
use stratus_core::EntityStore;
use stratus_core::IdempotencyPolicy;
use stratus_core::NormalizeContext;

use crate::error::ApiError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Tags attached to one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSet {
    /// Tag key to value.
    pub tags: BTreeMap<String, String>,
}

impl EntityKind for TagSet {
    const SERVICE: &'static str = "tagging";
    const RESOURCE_TYPE: &'static str = "tag-set";
    const POLICY: IdempotencyPolicy = IdempotencyPolicy::IdempotentMerge;

    fn normalize(&mut self, _ctx: &NormalizeContext<'_>) {
        self.tags.retain(|key, _| !key.trim().is_empty());
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Adds or overwrites tags on `arn`.
///
/// # Errors
///
/// Returns [`ApiError`] for store failures.
pub fn tag(
    entities: &EntityStore<'_>,
    arn: &str,
    tags: BTreeMap<String, String>,
) -> Result<(), ApiError> {
    if tags.is_empty() {
        return Ok(());
    }
    entities.create(arn, TagSet {
        tags,
    })?;
    Ok(())
}

/// Removes `keys` from the tags on `arn`.
///
/// # Errors
///
/// Returns [`ApiError`] for store failures.
pub fn untag(entities: &EntityStore<'_>, arn: &str, keys: &[String]) -> Result<(), ApiError> {
    let Some(mut entity) = entities.find::<TagSet>(arn)? else {
        return Ok(());
    };
    for key in keys {
        entity.attributes.tags.remove(key);
    }
    if entity.attributes.tags.is_empty() {
        entities.delete::<TagSet>(arn)?;
    } else {
        entities.save(&mut entity)?;
    }
    Ok(())
}

/// Returns the tags on `arn`.
///
/// # Errors
///
/// Returns [`ApiError`] for store failures.
pub fn tags_of(
    entities: &EntityStore<'_>,
    arn: &str,
) -> Result<BTreeMap<String, String>, ApiError> {
    Ok(entities.find::<TagSet>(arn)?.map(|entity| entity.attributes.tags).unwrap_or_default())
}

/// Drops every tag on `arn`.
///
/// # Errors
///
/// Returns [`ApiError`] for store failures other than absence.
pub fn clear(entities: &EntityStore<'_>, arn: &str) -> Result<(), ApiError> {
    match entities.delete::<TagSet>(arn) {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Removes a freshly created `T` called `name` together with any tags on
/// `arn`. Cleanup failures are ignored; the caller reports the original
/// error.
pub fn discard<T: EntityKind>(entities: &EntityStore<'_>, name: &str, arn: &str) {
    let _ = entities.delete::<T>(name);
    let _ = clear(entities, arn);
}
