// crates/stratus-core/src/core/mod.rs
// ============================================================================
// Module: Stratus Core Types
// Description: Resource model, identifiers, time, hashing, and naming helpers.
// Purpose: Group the value types shared by every emulated service.
// Dependencies: serde, serde_json, serde_jcs, sha2, rand, time
// ============================================================================

//! ## Overview
//! Value types with no I/O. Everything here is deterministic except
//! [`tokens::random_token`] and [`time::Timestamp::now`].

pub mod hashing;
pub mod identifiers;
pub mod identity;
pub mod namespace;
pub mod resource;
pub mod time;
pub mod tokens;

pub use self::hashing::*;
pub use self::identifiers::*;
pub use self::identity::*;
pub use self::namespace::*;
pub use self::resource::*;
pub use self::time::*;
pub use self::tokens::*;
