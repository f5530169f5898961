//! Payload encryption using `AES-256-GCM`
//!
//! All functions are pure - the nonce must be provided by the caller.
//! This enables deterministic testing; production callers draw it from the
//! OS CSPRNG for every call.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// AES-256 key size (32 bytes)
pub const KEY_LEN: usize = 32;

/// GCM nonce size (12 bytes)
pub const NONCE_LEN: usize = 12;

/// GCM tag size (16 bytes), appended to every ciphertext
pub const TAG_LEN: usize = 16;

/// A 256-bit AES-GCM key.
///
/// Key bytes are zeroized on drop and never printed.
#[derive(Clone)]
pub struct AeadKey {
    bytes: [u8; KEY_LEN],
}

impl AeadKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a key from a slice.
    ///
    /// # Errors
    ///
    /// `InvalidKeyLength` if `bytes` is not exactly [`KEY_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength { expected: KEY_LEN, actual: bytes.len() })?;
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AeadKey(<redacted>)")
    }
}

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Encrypt `plaintext`, authenticating `aad` alongside it.
///
/// Returns ciphertext with the 16-byte tag appended.
///
/// # Security
///
/// - Caller MUST never reuse `nonce` under the same key
/// - `aad` is authenticated but not encrypted; decryption with different
///   AAD fails
pub fn seal(key: &AeadKey, nonce: &[u8; NONCE_LEN], aad: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("AES-256-GCM encryption cannot fail for payloads below 64 GiB");
    };

    ciphertext
}

/// Decrypt and authenticate `ciphertext`.
///
/// # Errors
///
/// - `InvalidNonceLength` / `CiphertextTooShort`: contract violation by the
///   caller, the wire layer should have rejected this input
/// - `AuthenticationFailed`: wrong key, wrong AAD, or tampered ciphertext
pub fn open(
    key: &AeadKey,
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::InvalidNonceLength { expected: NONCE_LEN, actual: nonce.len() });
    }
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::CiphertextTooShort { minimum: TAG_LEN, actual: ciphertext.len() });
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(seed: u8) -> AeadKey {
        let mut key = [0u8; KEY_LEN];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_add(seed);
        }
        AeadKey::new(key)
    }

    const AAD: &[u8] = b"signalgate/v1;device=dev-1";

    #[test]
    fn seal_open_roundtrip() {
        let key = test_key(0);
        let plaintext = br#"{"instrument":"GOLD","side":"buy","price":1950.50}"#;
        let nonce = [0xAB; NONCE_LEN];

        let ciphertext = seal(&key, &nonce, AAD, plaintext);
        let decrypted = open(&key, &nonce, AAD, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = test_key(0);
        let nonce = [0x00; NONCE_LEN];

        let ciphertext = seal(&key, &nonce, AAD, b"");
        assert_eq!(ciphertext.len(), TAG_LEN);
        assert_eq!(open(&key, &nonce, AAD, &ciphertext).unwrap(), b"");
    }

    #[test]
    fn ciphertext_is_plaintext_plus_tag() {
        let key = test_key(0);
        let plaintext = b"test message";

        let ciphertext = seal(&key, &[0u8; NONCE_LEN], AAD, plaintext);

        assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);
    }

    #[test]
    fn wrong_key_fails() {
        let nonce = [0x00; NONCE_LEN];
        let ciphertext = seal(&test_key(0), &nonce, AAD, b"secret");

        assert_eq!(
            open(&test_key(1), &nonce, AAD, &ciphertext),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn wrong_aad_fails() {
        let key = test_key(0);
        let nonce = [0x00; NONCE_LEN];
        let ciphertext = seal(&key, &nonce, AAD, b"secret");

        assert_eq!(
            open(&key, &nonce, b"signalgate/v1;device=dev-2", &ciphertext),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = test_key(0);
        let nonce = [0x00; NONCE_LEN];
        let mut ciphertext = seal(&key, &nonce, AAD, b"original message");

        ciphertext[0] ^= 0xFF;

        assert!(open(&key, &nonce, AAD, &ciphertext).is_err());
    }

    #[test]
    fn different_nonces_produce_different_ciphertexts() {
        let key = test_key(0);

        let a = seal(&key, &[0x00; NONCE_LEN], AAD, b"same");
        let b = seal(&key, &[0xFF; NONCE_LEN], AAD, b"same");

        assert_ne!(a, b);
    }

    #[test]
    fn wrong_nonce_length_is_contract_violation() {
        let key = test_key(0);
        let ciphertext = seal(&key, &[0u8; NONCE_LEN], AAD, b"x");

        let err = open(&key, &[0u8; 11], AAD, &ciphertext).unwrap_err();
        assert_eq!(err, CryptoError::InvalidNonceLength { expected: 12, actual: 11 });
        assert!(err.is_contract_violation());
    }

    #[test]
    fn short_ciphertext_is_contract_violation() {
        let err = open(&test_key(0), &[0u8; NONCE_LEN], AAD, &[0u8; 15]).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn key_from_slice_checks_length() {
        assert!(AeadKey::from_slice(&[0u8; KEY_LEN]).is_ok());
        assert!(matches!(
            AeadKey::from_slice(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength { expected: 32, actual: 16 })
        ));
    }

    #[test]
    fn debug_never_prints_key() {
        let rendered = format!("{:?}", test_key(7));
        assert_eq!(rendered, "AeadKey(<redacted>)");
    }
}
