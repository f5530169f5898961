//! Device-side request signing.
//!
//! Terminals build the canonical string from exactly the bytes they send
//! and attach the four authentication headers. The server side never uses
//! this type; it exists for terminal SDKs, the operator CLI and tests.

use signalgate_crypto::{CanonicalRequest, sign};
use signalgate_proto::{RequestLine, Result, SignedHeaders};

use crate::{device::SigningSecret, env::Environment};

/// Random bytes per generated nonce.
pub const NONCE_BYTES: usize = 16;

/// Signs requests on behalf of one device.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    device_id: String,
    secret: SigningSecret,
}

impl RequestSigner {
    /// Signer for `device_id` holding its HMAC secret.
    pub fn new(device_id: impl Into<String>, secret: SigningSecret) -> Self {
        Self { device_id: device_id.into(), secret }
    }

    /// Device this signer speaks for.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Produce the authentication headers for a request.
    ///
    /// `body` must be the exact bytes that will be sent (the sealed envelope
    /// JSON when encryption is on).
    ///
    /// # Errors
    ///
    /// `InvalidRequestLine` if the method or path would be rejected by the
    /// server anyway.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        timestamp: u64,
        nonce: &str,
        body: &[u8],
    ) -> Result<SignedHeaders> {
        let line = RequestLine::new(method, path)?;
        let canonical =
            CanonicalRequest::new(line.method(), line.path(), &self.device_id, timestamp, nonce, body);

        Ok(SignedHeaders {
            device_id: self.device_id.clone(),
            timestamp: timestamp.to_string(),
            nonce: nonce.to_owned(),
            signature: sign(self.secret.expose(), &canonical.to_bytes()),
        })
    }
}

/// Fresh request nonce: 16 random bytes as 32 lowercase hex characters.
pub fn generate_nonce<E: Environment>(env: &E) -> String {
    hex::encode(env.random_array::<NONCE_BYTES>())
}

#[cfg(test)]
mod tests {
    use signalgate_crypto::verify;

    use super::*;
    use crate::env::test_env::StepEnv;

    #[test]
    fn signature_verifies_against_canonical_string() {
        let signer = RequestSigner::new("dev-1", SigningSecret::new(b"device-secret".to_vec()));
        let headers = signer.sign("GET", "/api/v1/signals", 1000, "abc123", b"").unwrap();

        assert_eq!(headers.device_id, "dev-1");
        assert_eq!(headers.timestamp, "1000");
        assert_eq!(headers.nonce, "abc123");

        let canonical = "GET\n/api/v1/signals\ndev-1\n1000\nabc123\n\
                         e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert!(verify(b"device-secret", canonical.as_bytes(), &headers.signature));
    }

    #[test]
    fn body_changes_signature() {
        let signer = RequestSigner::new("dev-1", SigningSecret::new(b"device-secret".to_vec()));

        let a = signer.sign("POST", "/api/v1/signals", 1000, "n1", b"{}").unwrap();
        let b = signer.sign("POST", "/api/v1/signals", 1000, "n1", b"{ }").unwrap();

        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn invalid_request_line_is_refused() {
        let signer = RequestSigner::new("dev-1", SigningSecret::new(b"s".to_vec()));

        assert!(signer.sign("get", "/", 1, "n", b"").is_err());
        assert!(signer.sign("GET", "no-slash", 1, "n", b"").is_err());
    }

    #[test]
    fn nonces_are_hex_and_distinct() {
        let env = StepEnv::at(0);

        let a = generate_nonce(&env);
        let b = generate_nonce(&env);

        assert_eq!(a.len(), 2 * NONCE_BYTES);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }
}
