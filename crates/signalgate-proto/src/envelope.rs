//! Encrypted envelope wire shape.
//!
//! On the wire an encrypted payload is a JSON object:
//!
//! ```json
//! {"ciphertext": "<base64>", "nonce": "<base64>", "aad": "<string>"}
//! ```
//!
//! The ciphertext includes the 16-byte GCM tag. The nonce is exactly 12 bytes.
//! [`EnvelopeWire::decode`] enforces both lengths so that the cipher layer is
//! only ever handed well-formed input.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// AES-GCM nonce length carried in an envelope.
pub const ENVELOPE_NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length included in the ciphertext.
pub const ENVELOPE_TAG_LEN: usize = 16;

/// Envelope as it appears on the wire (base64 fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvelopeWire {
    /// Base64 ciphertext with appended tag
    pub ciphertext: String,
    /// Base64 12-byte nonce
    pub nonce: String,
    /// Additional authenticated data, verbatim
    pub aad: String,
}

/// Envelope with binary fields decoded and lengths checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEnvelope {
    /// Ciphertext with appended tag (at least [`ENVELOPE_TAG_LEN`] bytes)
    pub ciphertext: Vec<u8>,
    /// AES-GCM nonce
    pub nonce: [u8; ENVELOPE_NONCE_LEN],
    /// Additional authenticated data
    pub aad: String,
}

impl EnvelopeWire {
    /// Encode binary envelope parts for the wire.
    pub fn encode(ciphertext: &[u8], nonce: &[u8; ENVELOPE_NONCE_LEN], aad: &str) -> Self {
        Self {
            ciphertext: STANDARD.encode(ciphertext),
            nonce: STANDARD.encode(nonce),
            aad: aad.to_string(),
        }
    }

    /// Parse an envelope from a JSON request body.
    ///
    /// # Errors
    ///
    /// `MalformedEnvelope` if the body is not exactly the envelope object.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    /// Serialize to a JSON response body.
    ///
    /// # Errors
    ///
    /// `MalformedEnvelope` if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    /// Decode the base64 fields and check contract lengths.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64`: a binary field is not standard base64
    /// - `InvalidFieldLength`: the nonce is not 12 bytes, or the ciphertext
    ///   is shorter than the 16-byte tag
    pub fn decode(&self) -> Result<DecodedEnvelope> {
        let ciphertext = STANDARD
            .decode(&self.ciphertext)
            .map_err(|_| ProtocolError::InvalidBase64 { field: "ciphertext" })?;
        let nonce_bytes =
            STANDARD.decode(&self.nonce).map_err(|_| ProtocolError::InvalidBase64 { field: "nonce" })?;

        if ciphertext.len() < ENVELOPE_TAG_LEN {
            return Err(ProtocolError::InvalidFieldLength {
                field: "ciphertext",
                expected: ENVELOPE_TAG_LEN,
                actual: ciphertext.len(),
            });
        }

        let nonce: [u8; ENVELOPE_NONCE_LEN] =
            nonce_bytes.as_slice().try_into().map_err(|_| ProtocolError::InvalidFieldLength {
                field: "nonce",
                expected: ENVELOPE_NONCE_LEN,
                actual: nonce_bytes.len(),
            })?;

        Ok(DecodedEnvelope { ciphertext, nonce, aad: self.aad.clone() })
    }
}
