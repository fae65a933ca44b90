// crates/stratus-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Resource Store
// Description: Durable ResourceStore backend using SQLite.
// Purpose: Persist emulated resources across emulator restarts.
// Dependencies: stratus-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`stratus_core::ResourceStore`]. All
//! resources live in one `resources` table keyed by `(namespace, identifier)`.
//! Attribute blobs are stored as canonical JSON with a SHA-256 digest and are
//! verified on every read; rows that fail the check surface as corruption.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_ATTRIBUTE_BYTES;
pub use store::SqliteResourceStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
