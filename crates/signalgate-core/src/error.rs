//! Error types for the signalgate authentication core.
//!
//! Two layers:
//!
//! - [`AuthError`]: the internal taxonomy. Fine-grained, logged, never shown
//!   to a client.
//! - [`GateError`]: what the gate returns. Every externally triggerable
//!   failure collapses into [`GateError::Unauthorized`], whose `Display` is
//!   always `"unauthorized"`, so a client cannot learn which check failed.
//!
//! Contract violations (wrong key/nonce/tag length reaching the cipher) are
//! programming bugs and are never collapsed.

use signalgate_crypto::CryptoError;
use signalgate_proto::ProtocolError;
use thiserror::Error;

use crate::gate::GateState;

/// Why an authentication check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationReason {
    /// HMAC did not verify (or the signature was malformed)
    BadSignature,
    /// No device with this id exists
    UnknownDevice,
    /// Device is revoked in the registry or blocked for key derivation
    DeviceInactive,
    /// No current or grace key exists for the device
    NoValidKey,
    /// Envelope AAD does not match the expected AAD for the device
    AadMismatch,
    /// Tag verification failed under every candidate key
    DecryptionFailed,
    /// Request body was not a decodable envelope
    MalformedEnvelope,
}

/// Abstract outcome codes, for telemetry only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOutcome {
    /// Request passed every check
    Authorized,
    /// Signature missing, malformed, wrong, or device unknown
    RejectedBadSignature,
    /// Nonce already seen within its retention window
    RejectedReplay,
    /// Timestamp malformed or outside the skew window
    RejectedStaleTimestamp,
    /// Device revoked
    RejectedDeviceInactive,
    /// Encrypted body could not be decrypted
    RejectedDecryptionFailed,
}

impl AuthOutcome {
    /// Stable reason code for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authorized => "AUTHORIZED",
            Self::RejectedBadSignature => "REJECTED_BAD_SIGNATURE",
            Self::RejectedReplay => "REJECTED_REPLAY",
            Self::RejectedStaleTimestamp => "REJECTED_STALE_TIMESTAMP",
            Self::RejectedDeviceInactive => "REJECTED_DEVICE_INACTIVE",
            Self::RejectedDecryptionFailed => "REJECTED_DECRYPTION_FAILED",
        }
    }
}

/// Errors from the nonce store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NonceStoreError {
    /// Backend I/O or transaction failure
    #[error("nonce store backend error: {0}")]
    Backend(String),

    /// Stored record could not be decoded
    #[error("corrupt nonce record: {0}")]
    Corrupt(String),
}

/// Errors from the device key manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Device is revoked; no key may be derived for it
    #[error("device {0} is revoked")]
    Revoked(String),

    /// The clock is outside the range the key schedule can represent
    #[error("timestamp {0} is outside the key schedule")]
    OutOfSchedule(u64),
}

/// Internal failure taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed headers or request line
    #[error("validation failure: {0}")]
    Validation(String),

    /// Bad signature, failed decryption, inactive or unknown device
    #[error("authentication failure: {0:?}")]
    Authentication(AuthenticationReason),

    /// Nonce reuse within its retention window
    #[error("replay detected: nonce first seen at {first_seen_at}")]
    ReplayDetected {
        /// When the nonce was first accepted
        first_seen_at: u64,
    },

    /// Timestamp malformed or outside the skew window
    #[error("stale request: timestamp {timestamp:?}, now {now}")]
    StaleRequest {
        /// Parsed timestamp, `None` if malformed
        timestamp: Option<u64>,
        /// Server clock at evaluation
        now: u64,
    },

    /// Nonce store unavailable
    #[error(transparent)]
    Store(#[from] NonceStoreError),

    /// Internal bug: a fixed contract value (key/nonce/tag length) was broken
    #[error("contract violation: {0}")]
    ContractViolation(String),
}

impl AuthError {
    /// Outcome code this failure is reported under.
    ///
    /// Store failures are reported as replay rejections: the nonce could not
    /// be proven fresh.
    pub fn outcome(&self) -> AuthOutcome {
        match self {
            Self::Validation(_) | Self::ContractViolation(_) => AuthOutcome::RejectedBadSignature,
            Self::Authentication(reason) => match reason {
                AuthenticationReason::BadSignature | AuthenticationReason::UnknownDevice => {
                    AuthOutcome::RejectedBadSignature
                },
                AuthenticationReason::DeviceInactive => AuthOutcome::RejectedDeviceInactive,
                AuthenticationReason::NoValidKey
                | AuthenticationReason::AadMismatch
                | AuthenticationReason::DecryptionFailed
                | AuthenticationReason::MalformedEnvelope => AuthOutcome::RejectedDecryptionFailed,
            },
            Self::ReplayDetected { .. } | Self::Store(_) => AuthOutcome::RejectedReplay,
            Self::StaleRequest { .. } => AuthOutcome::RejectedStaleTimestamp,
        }
    }

    /// Returns true if this error indicates a bug rather than a bad request.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }
}

impl From<ProtocolError> for AuthError {
    fn from(err: ProtocolError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<KeyError> for AuthError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::Revoked(_) => Self::Authentication(AuthenticationReason::DeviceInactive),
            KeyError::OutOfSchedule(_) => Self::Authentication(AuthenticationReason::NoValidKey),
        }
    }
}

impl From<CryptoError> for AuthError {
    fn from(err: CryptoError) -> Self {
        if err.is_contract_violation() {
            Self::ContractViolation(err.to_string())
        } else {
            Self::Authentication(AuthenticationReason::DecryptionFailed)
        }
    }
}

/// Opaque rejection handed to request handlers.
///
/// `Display` never reveals which check failed. The reason code and the
/// failing state are available for internal telemetry only; do not copy
/// them into a client response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    outcome: AuthOutcome,
    state: GateState,
}

impl AuthFailure {
    pub(crate) fn new(outcome: AuthOutcome, state: GateState) -> Self {
        Self { outcome, state }
    }

    /// Internal reason code. Telemetry only.
    pub fn outcome(&self) -> AuthOutcome {
        self.outcome
    }

    /// Last state reached before rejection. Telemetry only.
    pub fn failed_in(&self) -> GateState {
        self.state
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("unauthorized")
    }
}

impl std::error::Error for AuthFailure {}

/// Errors returned by the gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Request rejected. Map to a generic 401.
    #[error("{0}")]
    Unauthorized(AuthFailure),

    /// Nonce store unreachable. The request was rejected (fail closed); map
    /// to a 503 and alert.
    #[error("authentication backend unavailable")]
    StoreUnavailable(NonceStoreError),

    /// Programming bug. Never caused by request content.
    #[error("contract violation: {0}")]
    ContractViolation(String),
}

impl GateError {
    /// Internal reason code, if this is a rejection.
    pub fn outcome(&self) -> Option<AuthOutcome> {
        match self {
            Self::Unauthorized(failure) => Some(failure.outcome()),
            Self::StoreUnavailable(_) | Self::ContractViolation(_) => None,
        }
    }
}
