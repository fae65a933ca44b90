// crates/stratus-core/src/runtime/mod.rs
// ============================================================================
// Module: Stratus Runtime
// Description: Store implementations and the typed entity layer.
// Purpose: Bridge handlers to the generic resource store.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`store`] holds the in-memory backend and the shared wrapper with its
//! read-after-write retry. [`entity`] layers typed attribute structs,
//! idempotency policies, and invariant normalization on top.

pub mod entity;
pub mod store;

pub use entity::CreateOutcome;
pub use entity::Entity;
pub use entity::EntityKind;
pub use entity::EntityStore;
pub use entity::IdempotencyPolicy;
pub use entity::NormalizeContext;
pub use entity::merge_value;
pub use entity::qualified_identifier;
pub use store::InMemoryResourceStore;
pub use store::ReadRetryPolicy;
pub use store::SharedResourceStore;
