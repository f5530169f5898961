//! HMAC-SHA256 request signatures.
//!
//! # Security Properties
//!
//! - Constant-time: tag comparison goes through [`Mac::verify_slice`]
//! - No oracle: a signature that is not 64 lowercase hex characters returns
//!   `false`, indistinguishable from a wrong signature
//! - No retries: a failed verification is terminal for the request

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded HMAC-SHA256 signature.
pub const SIGNATURE_HEX_LEN: usize = 64;

/// Sign a canonical request, returning the lowercase hex digest.
pub fn sign(secret: &[u8], canonical: &[u8]) -> String {
    hex::encode(mac(secret, canonical).finalize().into_bytes())
}

/// Verify a hex signature over a canonical request.
///
/// Returns `false` for a wrong signature and for a malformed one alike.
pub fn verify(secret: &[u8], canonical: &[u8], signature: &str) -> bool {
    let Some(expected) = decode_signature(signature) else {
        return false;
    };

    mac(secret, canonical).verify_slice(&expected).is_ok()
}

fn mac(secret: &[u8], canonical: &[u8]) -> HmacSha256 {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(canonical);
    mac
}

/// Decode a signature only if it is exactly 64 lowercase hex characters.
fn decode_signature(signature: &str) -> Option<[u8; 32]> {
    if signature.len() != SIGNATURE_HEX_LEN
        || !signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return None;
    }

    let mut out = [0u8; 32];
    hex::decode_to_slice(signature, &mut out).ok()?;
    Some(out)
}
