//! Canonical request serialization for signing.
//!
//! The canonical string is the shared contract between device and server:
//!
//! ```text
//! {METHOD}\n{PATH}\n{DEVICE_ID}\n{TIMESTAMP}\n{NONCE}\n{SHA256_HEX(BODY)}
//! ```
//!
//! Field order and delimiters are fixed for [`CANONICAL_VERSION`]. Any change
//! breaks every deployed terminal, so a new layout needs a new version.

use std::fmt;

use sha2::{Digest, Sha256};

/// Version of the canonical string layout.
pub const CANONICAL_VERSION: u8 = 1;

/// Lowercase hex SHA-256 of a request body.
///
/// An absent body hashes as the empty string.
pub fn body_hash_hex(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Fields of a request that are covered by the signature.
///
/// Building is pure: the same inputs always produce the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest<'a> {
    method: &'a str,
    path: &'a str,
    device_id: &'a str,
    timestamp: u64,
    nonce: &'a str,
    body_hash: String,
}

impl<'a> CanonicalRequest<'a> {
    /// Capture the signed fields of a request, hashing the raw body.
    pub fn new(
        method: &'a str,
        path: &'a str,
        device_id: &'a str,
        timestamp: u64,
        nonce: &'a str,
        body: &[u8],
    ) -> Self {
        Self { method, path, device_id, timestamp, nonce, body_hash: body_hash_hex(body) }
    }

    /// Lowercase hex SHA-256 of the body.
    pub fn body_hash(&self) -> &str {
        &self.body_hash
    }

    /// Canonical string as bytes, ready for HMAC.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for CanonicalRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method, self.path, self.device_id, self.timestamp, self.nonce, self.body_hash
        )
    }
}
