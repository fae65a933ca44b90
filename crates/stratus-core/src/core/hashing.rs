// crates/stratus-core/src/core/hashing.rs
// ============================================================================
// Module: Stratus Canonical Hashing
// Description: SHA-256 digests and RFC 8785 canonical JSON bytes.
// Purpose: Give stores and identifier derivation one stable byte encoding.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Attribute blobs are stored as canonical JSON (JCS) so equal values always
//! persist as equal bytes. Deterministic identifiers are SHA-256 digests of
//! their seed, rendered as lowercase hex.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical encodings.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Returns the raw SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Returns the lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_encode(&sha256(bytes))
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::canonical_json_bytes;
    use super::hex_encode;
    use super::sha256_hex;

    #[test]
    fn canonical_bytes_sort_keys() {
        let left = canonical_json_bytes(&json!({"b": 1, "a": 2})).ok();
        let right = canonical_json_bytes(&json!({"a": 2, "b": 1})).ok();
        assert_eq!(left, right);
        assert_eq!(left.as_deref(), Some(br#"{"a":2,"b":1}"#.as_slice()));
    }

    #[test]
    fn sha256_of_empty_input_is_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hex_encode_pads_low_nibbles() {
        assert_eq!(hex_encode(&[0x00, 0x0f, 0xa0]), "000fa0");
    }
}
