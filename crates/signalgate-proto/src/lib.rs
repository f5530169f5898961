//! Signalgate wire contract.
//!
//! Everything a trading terminal and the server must agree on byte-for-byte,
//! without any cryptography:
//!
//! - [`SignedHeaders`]: the four authentication headers every device request
//!   carries (`X-Device-Id`, `X-Timestamp`, `X-Nonce`, `X-Signature`).
//! - [`RequestLine`]: the method and path that enter the signing string.
//! - [`EnvelopeWire`]: the JSON shape of an encrypted payload
//!   (`{ciphertext, nonce, aad}`, binary fields base64-encoded).
//!
//! Parsing here is the validation boundary. Loosely-typed input (header
//! pairs, JSON bodies) is turned into tagged structs or rejected with a
//! [`ProtocolError`]. Nothing in this crate decides whether a request is
//! authentic; that is `signalgate-core`'s job.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod headers;
pub mod request;

pub use envelope::{DecodedEnvelope, ENVELOPE_NONCE_LEN, ENVELOPE_TAG_LEN, EnvelopeWire};
pub use errors::{ProtocolError, Result};
pub use headers::{
    HEADER_DEVICE_ID, HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP, MAX_DEVICE_ID_LEN,
    MAX_NONCE_LEN, SignedHeaders,
};
pub use request::{MAX_METHOD_LEN, MAX_PATH_LEN, RequestLine};
