//! Crypto error types.

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key is not 32 bytes
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// Nonce is not 12 bytes
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected nonce length in bytes
        expected: usize,
        /// Actual nonce length in bytes
        actual: usize,
    },

    /// Ciphertext cannot even hold the 16-byte tag
    #[error("ciphertext too short: need at least {minimum} bytes, got {actual}")]
    CiphertextTooShort {
        /// Minimum length (the tag size)
        minimum: usize,
        /// Actual ciphertext length
        actual: usize,
    },

    /// Tag verification failed (wrong key, wrong AAD, or tampering)
    #[error("authentication failed")]
    AuthenticationFailed,

    /// PBKDF2 iteration count below the enforced minimum
    #[error("kdf iterations too low: minimum {minimum}, requested {requested}")]
    WeakKdfIterations {
        /// Enforced minimum
        minimum: u32,
        /// Requested count
        requested: u32,
    },
}

impl CryptoError {
    /// Returns true if this error means the caller broke a fixed contract
    /// value (key, nonce or tag length).
    ///
    /// These are programming errors, never business failures: the wire layer
    /// validates lengths before anything reaches the cipher.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyLength { .. }
                | Self::InvalidNonceLength { .. }
                | Self::CiphertextTooShort { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_errors_are_contract_violations() {
        assert!(CryptoError::InvalidKeyLength { expected: 32, actual: 31 }.is_contract_violation());
        assert!(
            CryptoError::InvalidNonceLength { expected: 12, actual: 24 }.is_contract_violation()
        );
        assert!(CryptoError::CiphertextTooShort { minimum: 16, actual: 3 }.is_contract_violation());
    }

    #[test]
    fn authentication_failure_is_not_contract_violation() {
        assert!(!CryptoError::AuthenticationFailed.is_contract_violation());
        assert!(
            !CryptoError::WeakKdfIterations { minimum: 100_000, requested: 1 }
                .is_contract_violation()
        );
    }
}
