// crates/stratus-core/src/lib.rs
// ============================================================================
// Module: Stratus Core Library
// Description: Public API surface for the Stratus emulation core.
// Purpose: Expose the resource model, store interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Stratus core is the service-agnostic half of the emulator. It owns the
//! single persisted [`Resource`] shape, the [`ResourceStore`] contract, the
//! namespace resolver, identifier generation, and the typed entity layer that
//! applies idempotency policies and invariant normalization on every read and
//! write. Wire protocols live in `stratus-gateway`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::ResourceStore;
pub use interfaces::StoreError;
pub use runtime::CreateOutcome;
pub use runtime::Entity;
pub use runtime::EntityKind;
pub use runtime::EntityStore;
pub use runtime::IdempotencyPolicy;
pub use runtime::InMemoryResourceStore;
pub use runtime::NormalizeContext;
pub use runtime::ReadRetryPolicy;
pub use runtime::SharedResourceStore;
pub use runtime::merge_value;
pub use runtime::qualified_identifier;
