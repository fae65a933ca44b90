// crates/stratus-config/src/lib.rs
// ============================================================================
// Module: Stratus Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for stratus.toml semantics.
// Dependencies: stratus-core, stratus-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `stratus-config` defines the configuration model for the emulator. Loading
//! is strict and fail-closed: oversized, non-UTF-8, or inconsistent files are
//! rejected before any listener or store is opened.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
