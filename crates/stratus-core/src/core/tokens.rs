// crates/stratus-core/src/core/tokens.rs
// ============================================================================
// Module: Stratus Identifier Tokens
// Description: Random and content-addressed hex tokens for resource identifiers.
// Purpose: Produce identifiers that are either unique per call or stable per seed.
// Dependencies: rand, sha2
// ============================================================================

//! ## Overview
//! Two generators back every identifier Stratus hands out:
//! - [`random_token`] draws from the OS RNG; use it for values that must be
//!   unique per call (instance ids, secret version ids).
//! - [`deterministic_token`] hashes a seed; use it for values a client will
//!   observe repeatedly across an entity's life (zone ids, name servers).
//!
//! Both return lowercase hex of exactly the requested length.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::RngCore;
use rand::rngs::OsRng;

use crate::core::hashing::hex_encode;
use crate::core::hashing::sha256;

// ============================================================================
// SECTION: Generators
// ============================================================================

/// Returns `len` lowercase hex characters drawn from the OS RNG.
#[must_use]
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0_u8; len.div_ceil(2)];
    OsRng.fill_bytes(&mut bytes);
    let mut token = hex_encode(&bytes);
    token.truncate(len);
    token
}

/// Returns `len` lowercase hex characters derived from `seed` with SHA-256.
///
/// The first 64 characters are the digest of the seed itself; longer
/// requests append digests of `"{seed}#{block}"` for block 1, 2, ...
#[must_use]
pub fn deterministic_token(seed: &str, len: usize) -> String {
    let mut token = hex_encode(&sha256(seed.as_bytes()));
    let mut block: u64 = 1;
    while token.len() < len {
        token.push_str(&hex_encode(&sha256(format!("{seed}#{block}").as_bytes())));
        block += 1;
    }
    token.truncate(len);
    token
}

/// Returns `len` random bytes from the OS RNG.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0_u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
