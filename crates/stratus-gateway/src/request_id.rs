// crates/stratus-gateway/src/request_id.rs
// ============================================================================
// Module: Request Identifiers
// Description: Boot-scoped generator for per-response request ids.
// Purpose: Give every response a unique, UUID-shaped request id.
// Dependencies: base64, rand, stratus-core
// ============================================================================

//! ## Overview
//! Request ids combine a random 64-bit boot id with a monotonic 64-bit
//! counter and are rendered in the 8-4-4-4-12 UUID layout clients expect.
//! The generator lives as long as the [`crate::ResponseEncoder`] that owns
//! it. Secondary tracking ids (`x-amz-id-2`) are pure random bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use stratus_core::random_bytes;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Random bytes behind each secondary tracking id.
const TRACKING_ID_BYTES: usize = 48;

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Boot-scoped request id generator.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
pub struct RequestIdGenerator {
    /// Boot-scoped random identifier.
    boot_id: u64,
    /// Monotonic counter for ids issued in this process.
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Creates a generator with a fresh boot id.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            boot_id: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues the next request id.
    #[must_use]
    pub fn issue(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let boot = self.boot_id;
        format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            boot >> 32,
            (boot >> 16) & 0xffff,
            boot & 0xffff,
            seq >> 48,
            seq & 0xffff_ffff_ffff
        )
    }

    /// Issues a secondary tracking id.
    #[must_use]
    pub fn tracking_id(&self) -> String {
        STANDARD.encode(random_bytes(TRACKING_ID_BYTES))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
