//! Per-device key derivation using PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::{
    aead::{AeadKey, KEY_LEN},
    error::CryptoError,
};

/// Minimum accepted PBKDF2 iteration count.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// PBKDF2 iteration count, guaranteed to be at least [`MIN_KDF_ITERATIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KdfIterations(u32);

impl KdfIterations {
    /// Validate an iteration count.
    ///
    /// # Errors
    ///
    /// `WeakKdfIterations` if `rounds` is below [`MIN_KDF_ITERATIONS`].
    pub fn new(rounds: u32) -> Result<Self, CryptoError> {
        if rounds < MIN_KDF_ITERATIONS {
            return Err(CryptoError::WeakKdfIterations {
                minimum: MIN_KDF_ITERATIONS,
                requested: rounds,
            });
        }
        Ok(Self(rounds))
    }

    /// Raw round count.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for KdfIterations {
    fn default() -> Self {
        Self(MIN_KDF_ITERATIONS)
    }
}

/// Salt binding a derived key to one device and one date tag.
pub fn kdf_salt(device_id: &str, date_tag: &str) -> String {
    format!("{device_id}::{date_tag}")
}

/// Derive the 32-byte AES key for `(device_id, date_tag)`.
///
/// # Security
///
/// - Deterministic: same inputs always produce the same key, so no key
///   material ever needs to travel
/// - Different devices produce different keys (device isolation)
/// - Different date tags produce different keys (rotation)
pub fn derive_device_key(
    master_secret: &[u8],
    device_id: &str,
    date_tag: &str,
    iterations: KdfIterations,
) -> AeadKey {
    let salt = kdf_salt(device_id, date_tag);

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(master_secret, salt.as_bytes(), iterations.get(), &mut key);

    AeadKey::new(key)
}
