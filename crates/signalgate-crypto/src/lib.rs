//! Signalgate Cryptographic Primitives
//!
//! Cryptographic building blocks for device authentication. Pure functions
//! with deterministic outputs. Callers provide random bytes (AEAD nonces) so
//! that everything here can be tested deterministically.
//!
//! # Request Authentication
//!
//! ```text
//! method, path, device_id, timestamp, nonce, SHA-256(body)
//!        │
//!        ▼
//! Canonical string (newline-delimited, fixed order)
//!        │
//!        ▼
//! HMAC-SHA256(device signing secret) → lowercase hex signature
//! ```
//!
//! # Payload Encryption
//!
//! ```text
//! Master secret
//!        │
//!        ▼
//! PBKDF2-HMAC-SHA256(salt = "{device_id}::{date_tag}") → Device key
//!        │
//!        ▼
//! AES-256-GCM(random 96-bit nonce, AAD) → Ciphertext || Tag
//! ```
//!
//! # Security
//!
//! Signatures:
//! - Verification uses the MAC's constant-time tag comparison
//! - Malformed signatures fail exactly like wrong ones (no oracle)
//!
//! Key derivation:
//! - Deterministic: server and provisioning tooling derive identical keys
//!   without transmitting key material
//! - Device isolation: the device id is part of the salt
//! - Rotation: the date tag is part of the salt
//! - Work factor: at least [`MIN_KDF_ITERATIONS`] rounds
//!
//! Encryption:
//! - Fresh caller-supplied nonce per call; never reuse a nonce under a key
//! - AAD binds the ciphertext to a device and protocol version
//! - Failed tag verification returns no plaintext at all

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod canonical;
pub mod error;
pub mod kdf;
pub mod signature;

pub use aead::{AeadKey, KEY_LEN, NONCE_LEN, TAG_LEN, open, seal};
pub use canonical::{CANONICAL_VERSION, CanonicalRequest, body_hash_hex};
pub use error::CryptoError;
pub use kdf::{KdfIterations, MIN_KDF_ITERATIONS, derive_device_key, kdf_salt};
pub use signature::{SIGNATURE_HEX_LEN, sign, verify};
