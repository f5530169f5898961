//! Device-bound AEAD envelopes for signal payloads.
//!
//! Every envelope is sealed under the device's current key with a fresh
//! random 12-byte nonce and an AAD naming the device, so a ciphertext for
//! one device can never be opened as another's.

use std::sync::Arc;

use signalgate_crypto::{NONCE_LEN, TAG_LEN, open, seal};
use signalgate_proto::{ENVELOPE_NONCE_LEN, ENVELOPE_TAG_LEN, EnvelopeWire};

use crate::{
    env::Environment,
    error::{AuthError, AuthenticationReason},
    keys::DeviceKeyManager,
};

const _: () = assert!(ENVELOPE_NONCE_LEN == NONCE_LEN, "wire and cipher nonce lengths differ");
const _: () = assert!(ENVELOPE_TAG_LEN == TAG_LEN, "wire and cipher tag lengths differ");

/// Versioned prefix of every envelope AAD.
pub const AAD_PREFIX: &str = "signalgate/v1;device=";

/// AAD binding an envelope to `device_id`.
pub fn envelope_aad(device_id: &str) -> String {
    format!("{AAD_PREFIX}{device_id}")
}

/// Output of [`SignalEnvelope::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSignal {
    /// Ciphertext with the 16-byte tag appended
    pub ciphertext: Vec<u8>,
    /// Per-call random nonce
    pub nonce: [u8; NONCE_LEN],
    /// AAD the ciphertext is bound to
    pub aad: String,
    /// Unix seconds at encryption
    pub created_at: u64,
    /// Id of the key that sealed it
    pub key_id: String,
}

impl SealedSignal {
    /// Base64 wire form.
    pub fn to_wire(&self) -> EnvelopeWire {
        EnvelopeWire::encode(&self.ciphertext, &self.nonce, &self.aad)
    }
}

/// AES-256-GCM engine over per-device derived keys.
#[derive(Debug, Clone)]
pub struct SignalEnvelope<E: Environment> {
    env: E,
    keys: Arc<DeviceKeyManager>,
}

impl<E: Environment> SignalEnvelope<E> {
    /// Create an engine drawing nonces and time from `env`.
    pub fn new(env: E, keys: Arc<DeviceKeyManager>) -> Self {
        Self { env, keys }
    }

    /// Key manager backing this engine.
    pub fn keys(&self) -> &Arc<DeviceKeyManager> {
        &self.keys
    }

    /// Seal `plaintext` for `device_id` under its current key.
    ///
    /// # Errors
    ///
    /// `Authentication(DeviceInactive)` if the device is revoked;
    /// `Authentication(NoValidKey)` if no key can be scheduled.
    pub fn encrypt(&self, device_id: &str, plaintext: &[u8]) -> Result<SealedSignal, AuthError> {
        let now = self.env.wall_clock_secs();
        let key = self.keys.active_key(device_id, now)?;

        let nonce: [u8; NONCE_LEN] = self.env.random_array();
        let aad = envelope_aad(device_id);
        let ciphertext = seal(&key.key, &nonce, aad.as_bytes(), plaintext);

        Ok(SealedSignal { ciphertext, nonce, aad, created_at: now, key_id: key.key_id })
    }

    /// Open an envelope sealed for `device_id`.
    ///
    /// Tries the current key, then the grace key.
    ///
    /// # Errors
    ///
    /// - `Authentication(AadMismatch)`: `aad` is not this device's AAD
    /// - `Authentication(DeviceInactive)`: device revoked
    /// - `Authentication(DecryptionFailed)`: no candidate key verifies the tag
    /// - `ContractViolation`: nonce or ciphertext length is off-contract
    pub fn decrypt(
        &self,
        device_id: &str,
        ciphertext: &[u8],
        nonce: &[u8],
        aad: &str,
    ) -> Result<Vec<u8>, AuthError> {
        if aad != envelope_aad(device_id) {
            return Err(AuthError::Authentication(AuthenticationReason::AadMismatch));
        }

        let now = self.env.wall_clock_secs();
        for candidate in self.keys.decryption_keys(device_id, now)? {
            match open(&candidate.key, nonce, aad.as_bytes(), ciphertext) {
                Ok(plaintext) => {
                    if !candidate.is_active {
                        tracing::debug!(device_id, key_id = %candidate.key_id, "opened with grace key");
                    }
                    return Ok(plaintext);
                },
                Err(err) if err.is_contract_violation() => return Err(err.into()),
                Err(_) => {},
            }
        }

        Err(AuthError::Authentication(AuthenticationReason::DecryptionFailed))
    }

    /// Open a wire envelope for `device_id`.
    ///
    /// # Errors
    ///
    /// `Authentication(MalformedEnvelope)` if the base64 fields or lengths
    /// are invalid; otherwise as [`Self::decrypt`].
    pub fn open_wire(&self, device_id: &str, wire: &EnvelopeWire) -> Result<Vec<u8>, AuthError> {
        let decoded = wire
            .decode()
            .map_err(|_| AuthError::Authentication(AuthenticationReason::MalformedEnvelope))?;
        self.decrypt(device_id, &decoded.ciphertext, &decoded.nonce, &decoded.aad)
    }
}
