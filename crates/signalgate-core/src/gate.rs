//! Request authentication state machine.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────┐  timestamp   ┌───────────────────┐  HMAC   ┌────────────────────┐
//! │ RECEIVED │─────────────>│ TIMESTAMP_CHECKED │────────>│ SIGNATURE_VERIFIED │
//! └──────────┘              └───────────────────┘         └─────────┬──────────┘
//!                                                                   │ nonce CAS
//!                                                                   v
//! ┌────────────┐  decrypt   ┌───────────────┐  status    ┌────────────────┐
//! │ DECRYPTED  │<───────────│ DEVICE_ACTIVE │<───────────│ NONCE_ACCEPTED │
//! └─────┬──────┘ (if sealed)└───────────────┘            └────────────────┘
//!       v
//! ┌────────────┐
//! │ AUTHORIZED │
//! └────────────┘
//! ```
//!
//! Any failed transition short-circuits to a rejection. The caller sees a
//! single opaque [`GateError::Unauthorized`]; the reason code and the state
//! that failed go to the `warn` log only.
//!
//! # Side Effects
//!
//! Exactly one nonce record is written per request that gets past
//! SIGNATURE_VERIFIED. A request rejected after that point (inactive device,
//! undecryptable body) or cancelled during the store call leaves its nonce
//! burned. Nonces are single-use, so the client retries with a fresh one.

use std::sync::Arc;

use signalgate_crypto::{CanonicalRequest, verify};
use signalgate_proto::{EnvelopeWire, RequestLine, SignedHeaders};

use crate::{
    config::GateConfig,
    device::{Device, DeviceRegistry},
    env::Environment,
    envelope::SignalEnvelope,
    error::{AuthError, AuthFailure, AuthOutcome, AuthenticationReason, GateError},
    keys::DeviceKeyManager,
    replay::{NonceStore, ReplayGuard},
};

/// Progress of a request through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GateState {
    /// Headers not yet examined
    Received,
    /// Timestamp inside the skew window
    TimestampChecked,
    /// HMAC verified against the device's secret
    SignatureVerified,
    /// Nonce claimed in the shared store
    NonceAccepted,
    /// Device active in the registry and not revoked for derivation
    DeviceActive,
    /// Sealed body opened
    Decrypted,
    /// Every check passed
    Authorized,
}

impl GateState {
    /// Stable name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::TimestampChecked => "TIMESTAMP_CHECKED",
            Self::SignatureVerified => "SIGNATURE_VERIFIED",
            Self::NonceAccepted => "NONCE_ACCEPTED",
            Self::DeviceActive => "DEVICE_ACTIVE",
            Self::Decrypted => "DECRYPTED",
            Self::Authorized => "AUTHORIZED",
        }
    }
}

/// The parts of an inbound request the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    /// HTTP method, uppercase
    pub method: &'a str,
    /// Request path including any query string, as signed
    pub path: &'a str,
    /// All request headers as `(name, value)` pairs
    pub headers: &'a [(&'a str, &'a str)],
}

/// A request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedContext {
    /// Authenticated device
    pub device_id: String,
    /// Signed request timestamp
    pub timestamp: u64,
    /// Consumed nonce
    pub nonce: String,
    /// Request body; the decrypted plaintext if the body was sealed
    pub payload: Vec<u8>,
    /// Whether the body arrived sealed
    pub encrypted: bool,
}

/// Response body produced by [`DeviceAuthGate::wrap_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Payload sealed for the device
    Sealed(EnvelopeWire),
    /// Payload passed through (encryption disabled)
    Plain(Vec<u8>),
}

impl ResponseBody {
    /// Bytes to put on the wire.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Sealed(wire) => {
                let Ok(json) = wire.to_json() else {
                    unreachable!("an envelope of three strings always serializes");
                };
                json
            },
            Self::Plain(bytes) => bytes,
        }
    }

    /// Whether the payload is sealed.
    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }
}

/// Authenticates device requests and seals responses.
///
/// Generic over the environment, the nonce store and the device registry so
/// tests can run it against a simulated clock and in-memory state.
pub struct DeviceAuthGate<E, S, R>
where
    E: Environment,
    S: NonceStore,
    R: DeviceRegistry,
{
    env: E,
    config: GateConfig,
    replay: ReplayGuard,
    envelope: SignalEnvelope<E>,
    store: S,
    registry: R,
}

impl<E, S, R> DeviceAuthGate<E, S, R>
where
    E: Environment,
    S: NonceStore,
    R: DeviceRegistry,
{
    /// Assemble a gate.
    pub fn new(env: E, config: GateConfig, keys: Arc<DeviceKeyManager>, store: S, registry: R) -> Self {
        let replay = ReplayGuard::from_config(&config);
        let envelope = SignalEnvelope::new(env.clone(), keys);
        Self { env, config, replay, envelope, store, registry }
    }

    /// Gate configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Key manager (for revocation and maintenance).
    pub fn keys(&self) -> &Arc<DeviceKeyManager> {
        self.envelope.keys()
    }

    /// Nonce store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Device registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Run a request through the state machine.
    ///
    /// `raw_body` must be the exact bytes received; the signature covers them.
    ///
    /// # Errors
    ///
    /// - `Unauthorized`: any check failed
    /// - `StoreUnavailable`: the nonce store failed, the request is rejected
    /// - `ContractViolation`: internal bug
    pub async fn authenticate(
        &self,
        request: &RequestParts<'_>,
        raw_body: &[u8],
    ) -> Result<AuthenticatedContext, GateError> {
        let headers = match SignedHeaders::from_pairs(request.headers.iter().copied()) {
            Ok(headers) => headers,
            Err(err) => return Err(self.reject(None, GateState::Received, &AuthError::from(err))),
        };

        let mut state = GateState::Received;
        match self.advance(request, &headers, raw_body, &mut state).await {
            Ok(context) => {
                tracing::debug!(
                    device_id = %context.device_id,
                    outcome = AuthOutcome::Authorized.as_str(),
                    encrypted = context.encrypted,
                    "request authorized"
                );
                Ok(context)
            },
            Err(err) => Err(self.reject(Some(&headers.device_id), state, &err)),
        }
    }

    async fn advance(
        &self,
        request: &RequestParts<'_>,
        headers: &SignedHeaders,
        raw_body: &[u8],
        state: &mut GateState,
    ) -> Result<AuthenticatedContext, AuthError> {
        let line = RequestLine::new(request.method, request.path)?;
        let device_id = headers.device_id.as_str();
        let now = self.env.wall_clock_secs();

        let timestamp = self.replay.check_timestamp(&headers.timestamp, now)?;
        *state = GateState::TimestampChecked;

        let device = self
            .registry
            .lookup(device_id)
            .ok_or(AuthError::Authentication(AuthenticationReason::UnknownDevice))?;
        let canonical =
            CanonicalRequest::new(line.method(), line.path(), device_id, timestamp, &headers.nonce, raw_body);
        if !verify(device.signing_secret.expose(), &canonical.to_bytes(), &headers.signature) {
            return Err(AuthError::Authentication(AuthenticationReason::BadSignature));
        }
        *state = GateState::SignatureVerified;

        self.replay.claim_nonce(&self.store, device_id, &headers.nonce, now).await?;
        *state = GateState::NonceAccepted;

        if !device.is_active() || self.keys().is_revoked(device_id) {
            return Err(AuthError::Authentication(AuthenticationReason::DeviceInactive));
        }
        *state = GateState::DeviceActive;

        let encrypted = self.config.encryption_enabled && !raw_body.is_empty();
        let payload = if encrypted {
            let wire = EnvelopeWire::from_json(raw_body)
                .map_err(|_| AuthError::Authentication(AuthenticationReason::MalformedEnvelope))?;
            let plaintext = self.envelope.open_wire(device_id, &wire)?;
            *state = GateState::Decrypted;
            plaintext
        } else {
            raw_body.to_vec()
        };

        *state = GateState::Authorized;
        Ok(AuthenticatedContext {
            device_id: device_id.to_owned(),
            timestamp,
            nonce: headers.nonce.clone(),
            payload,
            encrypted,
        })
    }

    /// Prepare a response payload for `device_id`.
    ///
    /// Seals under the device's current key when encryption is enabled,
    /// otherwise passes the payload through.
    ///
    /// # Errors
    ///
    /// - `Unauthorized`: device unknown, inactive or revoked
    /// - `ContractViolation`: internal bug
    pub fn wrap_response(&self, device_id: &str, payload: &[u8]) -> Result<ResponseBody, GateError> {
        if !self.config.encryption_enabled {
            return Ok(ResponseBody::Plain(payload.to_vec()));
        }

        let sealed = self
            .registry
            .lookup(device_id)
            .filter(Device::is_active)
            .ok_or(AuthError::Authentication(AuthenticationReason::DeviceInactive))
            .and_then(|_| self.envelope.encrypt(device_id, payload));

        match sealed {
            Ok(sealed) => Ok(ResponseBody::Sealed(sealed.to_wire())),
            Err(err) => Err(self.reject(Some(device_id), GateState::Authorized, &err)),
        }
    }

    /// Log a failure and collapse it to the boundary error.
    fn reject(&self, device_id: Option<&str>, state: GateState, err: &AuthError) -> GateError {
        let device_id = device_id.unwrap_or("-");
        let outcome = err.outcome();

        match err {
            AuthError::ContractViolation(detail) => {
                tracing::error!(device_id, state = state.as_str(), detail = %detail, "contract violation");
                GateError::ContractViolation(detail.clone())
            },
            AuthError::Store(store_err) => {
                tracing::error!(
                    device_id,
                    outcome = outcome.as_str(),
                    state = state.as_str(),
                    reason = %store_err,
                    "nonce store unavailable, request rejected"
                );
                GateError::StoreUnavailable(store_err.clone())
            },
            _ => {
                tracing::warn!(
                    device_id,
                    outcome = outcome.as_str(),
                    state = state.as_str(),
                    reason = %err,
                    "request rejected"
                );
                GateError::Unauthorized(AuthFailure::new(outcome, state))
            },
        }
    }
}
