//! Authentication header contract.
//!
//! Every device request carries exactly these four headers:
//!
//! | Header | Value |
//! |--------|-------|
//! | `X-Device-Id` | opaque device identifier |
//! | `X-Timestamp` | integer Unix seconds |
//! | `X-Nonce` | random string, unique per request |
//! | `X-Signature` | lowercase hex HMAC-SHA256 over the canonical string |
//!
//! Header names are matched case-insensitively, as HTTP does. Values are
//! matched exactly.
//!
//! # Invariants
//!
//! - Device id and nonce are 1..=128 visible ASCII characters. No whitespace
//!   means no `\n`, so neither value can smuggle an extra line into the
//!   canonical signing string.
//! - The timestamp and signature are carried verbatim. Their grammar is
//!   judged by the replay guard and the signature validator respectively, so
//!   that a malformed value fails the same way a wrong value does.

use crate::errors::{ProtocolError, Result};

/// Device identifier header.
pub const HEADER_DEVICE_ID: &str = "X-Device-Id";

/// Request timestamp header (Unix seconds).
pub const HEADER_TIMESTAMP: &str = "X-Timestamp";

/// Per-request nonce header.
pub const HEADER_NONCE: &str = "X-Nonce";

/// HMAC signature header.
pub const HEADER_SIGNATURE: &str = "X-Signature";

/// Maximum device id length in bytes.
pub const MAX_DEVICE_ID_LEN: usize = 128;

/// Maximum nonce length in bytes.
pub const MAX_NONCE_LEN: usize = 128;

/// Upper bound on timestamp and signature lengths before we stop copying.
const MAX_RAW_VALUE_LEN: usize = 256;

/// The four authentication headers of a device request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Opaque device identifier
    pub device_id: String,
    /// Timestamp exactly as sent (grammar checked by the replay guard)
    pub timestamp: String,
    /// Replay-prevention nonce
    pub nonce: String,
    /// Signature exactly as sent (grammar checked by the verifier)
    pub signature: String,
}

impl SignedHeaders {
    /// Extract and validate the authentication headers from raw header pairs.
    ///
    /// Unrelated headers are ignored.
    ///
    /// # Errors
    ///
    /// - `MissingHeader`: one of the four headers is absent
    /// - `DuplicateHeader`: one of the four headers appears twice
    /// - `InvalidHeader`: device id or nonce violates its grammar, or a value
    ///   is absurdly long
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut device_id = None;
        let mut timestamp = None;
        let mut nonce = None;
        let mut signature = None;

        for (name, value) in pairs {
            let slot = if name.eq_ignore_ascii_case(HEADER_DEVICE_ID) {
                (&mut device_id, HEADER_DEVICE_ID)
            } else if name.eq_ignore_ascii_case(HEADER_TIMESTAMP) {
                (&mut timestamp, HEADER_TIMESTAMP)
            } else if name.eq_ignore_ascii_case(HEADER_NONCE) {
                (&mut nonce, HEADER_NONCE)
            } else if name.eq_ignore_ascii_case(HEADER_SIGNATURE) {
                (&mut signature, HEADER_SIGNATURE)
            } else {
                continue;
            };

            let (target, header) = slot;
            if target.is_some() {
                return Err(ProtocolError::DuplicateHeader(header));
            }
            *target = Some(value);
        }

        let device_id = device_id.ok_or(ProtocolError::MissingHeader(HEADER_DEVICE_ID))?;
        let timestamp = timestamp.ok_or(ProtocolError::MissingHeader(HEADER_TIMESTAMP))?;
        let nonce = nonce.ok_or(ProtocolError::MissingHeader(HEADER_NONCE))?;
        let signature = signature.ok_or(ProtocolError::MissingHeader(HEADER_SIGNATURE))?;

        validate_token(HEADER_DEVICE_ID, device_id, MAX_DEVICE_ID_LEN)?;
        validate_token(HEADER_NONCE, nonce, MAX_NONCE_LEN)?;
        validate_length(HEADER_TIMESTAMP, timestamp)?;
        validate_length(HEADER_SIGNATURE, signature)?;

        Ok(Self {
            device_id: device_id.to_string(),
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
            signature: signature.to_string(),
        })
    }

    /// Header pairs in contract order, for emitting a request.
    pub fn to_pairs(&self) -> [(&'static str, &str); 4] {
        [
            (HEADER_DEVICE_ID, self.device_id.as_str()),
            (HEADER_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_NONCE, self.nonce.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
        ]
    }
}

/// Check that `value` is 1..=`max` visible ASCII characters.
fn validate_token(name: &'static str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() {
        return Err(ProtocolError::InvalidHeader { name, reason: "empty value" });
    }
    if value.len() > max {
        return Err(ProtocolError::InvalidHeader { name, reason: "value too long" });
    }
    if !value.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ProtocolError::InvalidHeader {
            name,
            reason: "value must be visible ASCII without whitespace",
        });
    }
    Ok(())
}

fn validate_length(name: &'static str, value: &str) -> Result<()> {
    if value.len() > MAX_RAW_VALUE_LEN {
        return Err(ProtocolError::InvalidHeader { name, reason: "value too long" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("X-Device-Id", "dev-1"),
            ("X-Timestamp", "1000"),
            ("X-Nonce", "abc123"),
            ("X-Signature", "00ff"),
        ]
    }

    #[test]
    fn parses_valid_headers() {
        let headers = SignedHeaders::from_pairs(valid_pairs()).unwrap();

        assert_eq!(headers.device_id, "dev-1");
        assert_eq!(headers.timestamp, "1000");
        assert_eq!(headers.nonce, "abc123");
        assert_eq!(headers.signature, "00ff");
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let pairs = vec![
            ("x-device-id", "dev-1"),
            ("X-TIMESTAMP", "1000"),
            ("x-Nonce", "abc123"),
            ("x-signature", "00ff"),
        ];

        assert!(SignedHeaders::from_pairs(pairs).is_ok());
    }

    #[test]
    fn unrelated_headers_are_ignored() {
        let mut pairs = valid_pairs();
        pairs.push(("Content-Type", "application/json"));
        pairs.push(("User-Agent", "terminal/5"));

        assert!(SignedHeaders::from_pairs(pairs).is_ok());
    }

    #[test]
    fn missing_header_is_rejected() {
        for skip in 0..4 {
            let mut pairs = valid_pairs();
            let (name, _) = pairs.remove(skip);

            let err = SignedHeaders::from_pairs(pairs).unwrap_err();
            assert!(
                matches!(err, ProtocolError::MissingHeader(missing) if missing == name),
                "expected missing {name}, got {err:?}"
            );
        }
    }

    #[test]
    fn duplicate_header_is_rejected() {
        let mut pairs = valid_pairs();
        pairs.push(("x-nonce", "other"));

        assert_eq!(
            SignedHeaders::from_pairs(pairs),
            Err(ProtocolError::DuplicateHeader(HEADER_NONCE))
        );
    }

    #[test]
    fn newline_in_device_id_is_rejected() {
        let mut pairs = valid_pairs();
        pairs[0] = ("X-Device-Id", "dev-1\nPOST");

        assert!(matches!(
            SignedHeaders::from_pairs(pairs),
            Err(ProtocolError::InvalidHeader { name: HEADER_DEVICE_ID, .. })
        ));
    }

    #[test]
    fn empty_and_oversized_nonce_rejected() {
        let mut pairs = valid_pairs();
        pairs[2] = ("X-Nonce", "");
        assert!(SignedHeaders::from_pairs(pairs).is_err());

        let long = "n".repeat(MAX_NONCE_LEN + 1);
        let pairs = vec![
            ("X-Device-Id", "dev-1"),
            ("X-Timestamp", "1000"),
            ("X-Nonce", long.as_str()),
            ("X-Signature", "00ff"),
        ];
        assert!(SignedHeaders::from_pairs(pairs).is_err());
    }

    #[test]
    fn nonce_at_max_length_accepted() {
        let nonce = "n".repeat(MAX_NONCE_LEN);
        let pairs = vec![
            ("X-Device-Id", "dev-1"),
            ("X-Timestamp", "1000"),
            ("X-Nonce", nonce.as_str()),
            ("X-Signature", "00ff"),
        ];

        assert!(SignedHeaders::from_pairs(pairs).is_ok());
    }

    #[test]
    fn timestamp_and_signature_carried_verbatim() {
        let mut pairs = valid_pairs();
        pairs[1] = ("X-Timestamp", "not-a-number");
        pairs[3] = ("X-Signature", "ZZZ");

        let headers = SignedHeaders::from_pairs(pairs).unwrap();
        assert_eq!(headers.timestamp, "not-a-number");
        assert_eq!(headers.signature, "ZZZ");
    }

    #[test]
    fn to_pairs_round_trips_through_parser() {
        let headers = SignedHeaders::from_pairs(valid_pairs()).unwrap();
        let reparsed = SignedHeaders::from_pairs(headers.to_pairs()).unwrap();

        assert_eq!(headers, reparsed);
    }
}
