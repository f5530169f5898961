//! Per-device key derivation, rotation and revocation.
//!
//! Keys are never stored: both sides derive them from the master secret,
//! the device id and a date tag. Derived keys are cached in a concurrent
//! arena keyed by `(device_id, date_tag)` so PBKDF2 runs once per device per
//! rotation period.
//!
//! # Key schedule
//!
//! ```text
//!   epoch                       period n                   period n+1
//!     |  ...  |---------------------------------------|------------------
//!             ^ start(n)         date tag = start(n)  ^ start(n+1)
//!                                                     |<- grace ->|
//!                                                     key n decrypt-only
//! ```
//!
//! Periods are `rotate_days` long, counted from the Unix epoch. The date tag
//! of a period is the UTC date of its first day. During the first
//! `grace_days` of period `n+1`, key `n` may still decrypt but never
//! encrypts. Keys from earlier periods are never used.
//!
//! # Eviction
//!
//! Cached keys are swept on the cache miss that follows an eviction instant
//! (the end of a grace window or a period boundary), so the cache holds at
//! most the current and the grace key per device in steady state.
//!
//! # Revocation
//!
//! [`DeviceKeyManager::revoke`] sets the revocation flag before evicting
//! cached keys, and every read checks the flag after touching the cache. A
//! revoked device therefore never gets a key back, even from a cache entry
//! that raced with the revocation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::DateTime;
use dashmap::DashMap;
use signalgate_crypto::{AeadKey, KdfIterations, derive_device_key};

use crate::{
    config::{GateConfig, MasterSecret},
    error::KeyError,
};

const SECS_PER_DAY: u64 = 86_400;

/// A derived AES-256-GCM key and its validity window.
#[derive(Debug, Clone)]
pub struct EncryptionKey {
    /// `"{device_id}@{date_tag}"`
    pub key_id: String,
    /// Owning device
    pub device_id: String,
    /// UTC date of the first day of the key's rotation period
    pub date_tag: String,
    /// Key material
    pub key: AeadKey,
    /// Start of the rotation period (Unix seconds)
    pub created_at: u64,
    /// End of the rotation period (Unix seconds, exclusive)
    pub expires_at: u64,
    /// `true` for the current key, `false` for the decrypt-only grace key
    pub is_active: bool,
}

/// Cached key plus the period it belongs to.
#[derive(Clone)]
struct CachedKey {
    key: AeadKey,
    period_start: u64,
}

/// Rotation arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeySchedule {
    period_secs: u64,
    grace_secs: u64,
}

impl KeySchedule {
    fn new(rotate_days: u32, grace_days: u32) -> Self {
        let rotate_days = u64::from(rotate_days.max(1));
        let grace_days = u64::from(grace_days).min(rotate_days);
        Self { period_secs: rotate_days * SECS_PER_DAY, grace_secs: grace_days * SECS_PER_DAY }
    }

    fn period_start(&self, now: u64) -> u64 {
        now - now % self.period_secs
    }

    /// Start of the previous period, if `now` is inside its grace window.
    fn grace_period_start(&self, now: u64) -> Option<u64> {
        let current = self.period_start(now);
        if now - current >= self.grace_secs {
            return None;
        }
        current.checked_sub(self.period_secs)
    }

    /// Cached keys for a period may be dropped once this instant passes.
    fn evict_after(&self, period_start: u64) -> u64 {
        period_start.saturating_add(self.period_secs).saturating_add(self.grace_secs)
    }

    /// First eviction instant strictly after `now`.
    fn next_eviction(&self, now: u64) -> u64 {
        let start = self.period_start(now);
        let grace_end = start.saturating_add(self.grace_secs);
        if now < grace_end {
            return grace_end;
        }
        start.saturating_add(self.period_secs)
    }

    fn date_tag(&self, period_start: u64) -> Result<String, KeyError> {
        let secs = i64::try_from(period_start).map_err(|_| KeyError::OutOfSchedule(period_start))?;
        let date = DateTime::from_timestamp(secs, 0).ok_or(KeyError::OutOfSchedule(period_start))?;
        Ok(date.format("%Y-%m-%d").to_string())
    }
}

/// Key id for a device and date tag.
pub fn key_id(device_id: &str, date_tag: &str) -> String {
    format!("{device_id}@{date_tag}")
}

/// Derives, caches, rotates and revokes per-device keys.
///
/// Construct one per process and share it (e.g. behind an `Arc`). Tests build
/// isolated instances with fixed secrets.
pub struct DeviceKeyManager {
    master_secret: MasterSecret,
    iterations: KdfIterations,
    schedule: KeySchedule,
    cache: DashMap<(String, String), CachedKey>,
    revoked: DashMap<String, u64>,
    next_sweep_at: AtomicU64,
}

impl std::fmt::Debug for DeviceKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceKeyManager")
            .field("iterations", &self.iterations)
            .field("schedule", &self.schedule)
            .field("cached_keys", &self.cache.len())
            .field("revoked_devices", &self.revoked.len())
            .finish_non_exhaustive()
    }
}

impl DeviceKeyManager {
    /// Create a manager from the master secret and rotation settings.
    pub fn new(master_secret: MasterSecret, config: &GateConfig) -> Self {
        Self {
            master_secret,
            iterations: config.kdf_iterations,
            schedule: KeySchedule::new(config.rotate_days, config.key_grace_days),
            cache: DashMap::new(),
            revoked: DashMap::new(),
            next_sweep_at: AtomicU64::new(0),
        }
    }

    /// Derive the key for `(device_id, date_tag)` without touching the cache.
    ///
    /// # Errors
    ///
    /// `Revoked` if the device is blocked for derivation.
    pub fn derive_key(&self, device_id: &str, date_tag: &str) -> Result<AeadKey, KeyError> {
        self.ensure_not_revoked(device_id)?;
        Ok(derive_device_key(self.master_secret.expose(), device_id, date_tag, self.iterations))
    }

    /// Date tag of the rotation period containing `now`.
    ///
    /// # Errors
    ///
    /// `OutOfSchedule` if `now` is beyond what a calendar date can express.
    pub fn date_tag_for(&self, now: u64) -> Result<String, KeyError> {
        self.schedule.date_tag(self.schedule.period_start(now))
    }

    /// The current encryption key for `device_id`.
    ///
    /// # Errors
    ///
    /// - `Revoked` if the device is revoked, even if a key is cached
    /// - `OutOfSchedule` if `now` cannot be mapped to a date tag
    pub fn active_key(&self, device_id: &str, now: u64) -> Result<EncryptionKey, KeyError> {
        self.key_for_period(device_id, self.schedule.period_start(now), true, now)
    }

    /// The current key, or `None` if the device is revoked.
    ///
    /// Revocation never falls back to a fresh key.
    pub fn get_active_key(&self, device_id: &str, now: u64) -> Option<EncryptionKey> {
        self.active_key(device_id, now).ok()
    }

    /// The previous period's key while `now` is inside its grace window.
    ///
    /// `None` outside the grace window or if the device is revoked.
    pub fn get_grace_key(&self, device_id: &str, now: u64) -> Option<EncryptionKey> {
        let start = self.schedule.grace_period_start(now)?;
        self.key_for_period(device_id, start, false, now).ok()
    }

    /// Keys to try when decrypting, current first.
    ///
    /// # Errors
    ///
    /// `Revoked` or `OutOfSchedule` as for [`Self::active_key`].
    pub fn decryption_keys(&self, device_id: &str, now: u64) -> Result<Vec<EncryptionKey>, KeyError> {
        let mut keys = vec![self.active_key(device_id, now)?];
        if let Some(start) = self.schedule.grace_period_start(now) {
            keys.push(self.key_for_period(device_id, start, false, now)?);
        }
        Ok(keys)
    }

    /// Block all further derivation for `device_id` and drop its cached keys.
    ///
    /// Takes effect for every subsequent read, independent of cache state.
    pub fn revoke(&self, device_id: &str, now: u64) {
        self.revoked.insert(device_id.to_owned(), now);
        self.cache.retain(|(cached_device, _), _| cached_device != device_id);
        tracing::info!(device_id, "device revoked for key derivation");
    }

    /// Lift a revocation made with [`Self::revoke`].
    ///
    /// Returns `false` if the device was not revoked. Keys are derived
    /// afresh on the next read.
    pub fn reinstate(&self, device_id: &str) -> bool {
        let reinstated = self.revoked.remove(device_id).is_some();
        if reinstated {
            tracing::info!(device_id, "device reinstated for key derivation");
        }
        reinstated
    }

    /// Whether `device_id` is blocked for key derivation.
    pub fn is_revoked(&self, device_id: &str) -> bool {
        self.revoked.contains_key(device_id)
    }

    /// Drop cached keys whose grace window has passed.
    ///
    /// Returns the number of evicted entries.
    pub fn purge_expired(&self, now: u64) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, cached| now < self.schedule.evict_after(cached.period_start));
        let purged = before.saturating_sub(self.cache.len());
        if purged > 0 {
            tracing::debug!(purged, "evicted expired device keys");
        }
        purged
    }

    /// Number of cached derived keys.
    pub fn cached_key_count(&self) -> usize {
        self.cache.len()
    }

    fn ensure_not_revoked(&self, device_id: &str) -> Result<(), KeyError> {
        if self.is_revoked(device_id) {
            return Err(KeyError::Revoked(device_id.to_owned()));
        }
        Ok(())
    }

    /// Purge once per eviction instant. Only the caller that wins the
    /// exchange sweeps.
    fn sweep_if_due(&self, now: u64) {
        let due = self.next_sweep_at.load(Ordering::Acquire);
        if now < due {
            return;
        }
        let next = self.schedule.next_eviction(now);
        if self.next_sweep_at.compare_exchange(due, next, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            self.purge_expired(now);
        }
    }

    fn key_for_period(
        &self,
        device_id: &str,
        period_start: u64,
        is_active: bool,
        now: u64,
    ) -> Result<EncryptionKey, KeyError> {
        self.ensure_not_revoked(device_id)?;

        let date_tag = self.schedule.date_tag(period_start)?;
        let cache_key = (device_id.to_owned(), date_tag);

        // The shard guard must not be held across PBKDF2.
        let cached = self.cache.get(&cache_key).map(|entry| entry.key.clone());
        let key = match cached {
            Some(key) => key,
            None => {
                self.sweep_if_due(now);
                let key = self.derive_key(device_id, &cache_key.1)?;
                tracing::debug!(device_id, date_tag = %cache_key.1, "derived device key");
                self.cache
                    .entry(cache_key.clone())
                    .or_insert_with(|| CachedKey { key: key.clone(), period_start });
                key
            },
        };

        // A revocation may have landed while we derived; its eviction can run
        // before our insert, so the flag is the source of truth.
        if self.is_revoked(device_id) {
            self.cache.remove(&cache_key);
            return Err(KeyError::Revoked(device_id.to_owned()));
        }

        let (device_id, date_tag) = cache_key;
        Ok(EncryptionKey {
            key_id: key_id(&device_id, &date_tag),
            device_id,
            date_tag,
            key,
            created_at: period_start,
            expires_at: period_start.saturating_add(self.schedule.period_secs),
            is_active,
        })
    }
}
