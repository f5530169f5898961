//! Protocol error types.

use thiserror::Error;

/// Result alias for wire parsing.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Malformed input at the wire boundary.
///
/// Every variant is a validation failure: the peer sent something that does
/// not match the contract. None of them say anything about authenticity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A required authentication header is absent
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    /// An authentication header appeared more than once
    #[error("duplicate header {0}")]
    DuplicateHeader(&'static str),

    /// A header value violates its grammar
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name
        name: &'static str,
        /// What was wrong with the value
        reason: &'static str,
    },

    /// Request method or path violates its grammar
    #[error("invalid request {field}: {reason}")]
    InvalidRequestLine {
        /// `method` or `path`
        field: &'static str,
        /// What was wrong with the value
        reason: &'static str,
    },

    /// Envelope body is not valid envelope JSON
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// An envelope field is not valid base64
    #[error("envelope field {field} is not valid base64")]
    InvalidBase64 {
        /// Field name
        field: &'static str,
    },

    /// An envelope field decoded to the wrong number of bytes
    #[error("envelope field {field}: expected {expected} bytes, got {actual}")]
    InvalidFieldLength {
        /// Field name
        field: &'static str,
        /// Minimum or exact length required
        expected: usize,
        /// Length received
        actual: usize,
    },
}
