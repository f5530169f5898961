//! Signalgate authentication core
//!
//! Decides whether a request from a trading terminal is authentic, fresh and
//! allowed, and seals the payloads that flow back to it. No I/O of its own:
//! time and randomness come through [`Environment`], nonce storage through
//! [`NonceStore`], device records through [`DeviceRegistry`].
//!
//! # Request Path
//!
//! ```text
//! headers + raw body
//!        │
//!        ▼
//! ReplayGuard: |now - X-Timestamp| <= skew
//!        │
//!        ▼
//! HMAC-SHA256 over canonical string == X-Signature
//!        │
//!        ▼
//! NonceStore: atomic check-and-set (device_id, nonce), TTL = skew + retention
//!        │
//!        ▼
//! Device active and not revoked
//!        │
//!        ▼
//! SignalEnvelope: AES-256-GCM open under current or grace key
//!        │
//!        ▼
//! AuthenticatedContext
//! ```
//!
//! # Security
//!
//! No Oracle:
//! - Every externally triggerable failure surfaces as the same opaque
//!   [`GateError::Unauthorized`]
//! - Reason codes exist for telemetry and logs only
//!
//! Fail Closed:
//! - Revocation wins over any cached key
//! - A nonce store outage rejects the request
//!
//! Device Isolation:
//! - Keys are derived per device and per rotation period
//! - Envelope AAD names the device, so ciphertexts do not transfer

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod device;
pub mod env;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod keys;
pub mod replay;
pub mod signer;

pub use config::{ConfigError, GateConfig, GateSettings, MasterSecret};
pub use device::{Device, DeviceRegistry, DeviceStatus, SigningSecret};
pub use env::Environment;
pub use envelope::{AAD_PREFIX, SealedSignal, SignalEnvelope, envelope_aad};
pub use error::{
    AuthError, AuthFailure, AuthOutcome, AuthenticationReason, GateError, KeyError, NonceStoreError,
};
pub use gate::{AuthenticatedContext, DeviceAuthGate, GateState, RequestParts, ResponseBody};
pub use keys::{DeviceKeyManager, EncryptionKey, key_id};
pub use replay::{NonceClaim, NonceRecord, NonceStore, ReplayGuard, parse_timestamp};
pub use signer::{NONCE_BYTES, RequestSigner, generate_nonce};
