//! Replay prevention: timestamp freshness and nonce uniqueness.
//!
//! The two checks are independent. The timestamp bound is what caps nonce
//! retention: a request older than the skew window is rejected before its
//! nonce is looked at, so a nonce record never needs to outlive
//! `skew + retention`.
//!
//! # Invariants
//!
//! - A `(device_id, nonce)` pair is accepted at most once while its record
//!   is live (`now < expires_at`)
//! - Records are never removed before `expires_at`
//! - Check-and-set is a single atomic store operation, never a lookup
//!   followed by an insert

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::GateConfig,
    error::{AuthError, NonceStoreError},
};

/// A claimed `(device_id, nonce)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    /// Device that asserted the nonce
    pub device_id: String,
    /// Nonce as sent in `X-Nonce`
    pub nonce: String,
    /// Unix seconds when the pair was first accepted
    pub first_seen_at: u64,
    /// Unix seconds after which the pair may be accepted again
    pub expires_at: u64,
}

impl NonceRecord {
    /// Whether the record still blocks reuse at `now`.
    pub fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// Result of an atomic check-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceClaim {
    /// Pair was unused (or its previous record had expired); now recorded
    Accepted,
    /// Pair is already recorded and live
    Replayed {
        /// When the live record was created
        first_seen_at: u64,
    },
}

/// Shared storage for nonce records.
///
/// Implementations share state across clones and tasks. The only suspension
/// point in authentication is [`NonceStore::check_and_set`].
#[async_trait]
pub trait NonceStore: Send + Sync + 'static {
    /// Atomically record `record` unless a live record for the same
    /// `(device_id, nonce)` exists at `record.first_seen_at`.
    ///
    /// An expired record for the same pair is replaced.
    ///
    /// # Errors
    ///
    /// `NonceStoreError` if the backend is unavailable. Callers must treat
    /// this as a rejection.
    async fn check_and_set(&self, record: NonceRecord) -> Result<NonceClaim, NonceStoreError>;
}

#[async_trait]
impl<T: NonceStore + ?Sized> NonceStore for Arc<T> {
    async fn check_and_set(&self, record: NonceRecord) -> Result<NonceClaim, NonceStoreError> {
        (**self).check_and_set(record).await
    }
}

/// Timestamp-freshness and nonce-uniqueness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayGuard {
    skew_secs: u64,
    retention_secs: u64,
}

impl ReplayGuard {
    /// Guard with explicit windows.
    pub fn new(skew_secs: u64, retention_secs: u64) -> Self {
        Self { skew_secs, retention_secs }
    }

    /// Guard using the configured skew and retention windows.
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.timestamp_skew_secs, config.nonce_retention_secs)
    }

    /// Maximum accepted `|now - timestamp|`.
    pub fn skew_secs(&self) -> u64 {
        self.skew_secs
    }

    /// Lifetime of a nonce record.
    pub fn nonce_ttl_secs(&self) -> u64 {
        self.skew_secs.saturating_add(self.retention_secs)
    }

    /// Parse and check an `X-Timestamp` value against `now`.
    ///
    /// Returns the parsed timestamp.
    ///
    /// # Errors
    ///
    /// `StaleRequest` if the value is malformed (see [`parse_timestamp`]) or
    /// `|now - timestamp| > skew`. The boundary itself is accepted.
    pub fn check_timestamp(&self, raw: &str, now: u64) -> Result<u64, AuthError> {
        let Some(timestamp) = parse_timestamp(raw) else {
            return Err(AuthError::StaleRequest { timestamp: None, now });
        };

        if timestamp.abs_diff(now) > self.skew_secs {
            return Err(AuthError::StaleRequest { timestamp: Some(timestamp), now });
        }

        Ok(timestamp)
    }

    /// Atomically claim `(device_id, nonce)` at `now`.
    ///
    /// # Errors
    ///
    /// - `ReplayDetected` if a live record exists
    /// - `Store` if the backend failed; the claim may or may not have been
    ///   recorded, so the nonce must be considered burned
    pub async fn claim_nonce<S>(
        &self,
        store: &S,
        device_id: &str,
        nonce: &str,
        now: u64,
    ) -> Result<(), AuthError>
    where
        S: NonceStore + ?Sized,
    {
        let record = NonceRecord {
            device_id: device_id.to_owned(),
            nonce: nonce.to_owned(),
            first_seen_at: now,
            expires_at: now.saturating_add(self.nonce_ttl_secs()),
        };

        match store.check_and_set(record).await? {
            NonceClaim::Accepted => Ok(()),
            NonceClaim::Replayed { first_seen_at } => Err(AuthError::ReplayDetected { first_seen_at }),
        }
    }
}

/// Strict `X-Timestamp` grammar: ASCII digits only, no sign, no leading
/// zeros except `"0"` itself, value fits in `u64`.
pub fn parse_timestamp(raw: &str) -> Option<u64> {
    let bytes = raw.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    raw.parse().ok()
}
