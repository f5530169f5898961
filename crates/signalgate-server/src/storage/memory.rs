//! In-process nonce store backed by a sharded concurrent map.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

use super::{NonceClaim, NonceRecord, NonceStore, NonceStoreError, SweepSchedule};

/// In-memory nonce store.
///
/// Check-and-set runs under the shard lock of the pair's entry, so two
/// identical concurrent requests can never both be accepted. Clones share
/// the same map.
///
/// Expired records are swept during claims (see [`super::SWEEP_INTERVAL_SECS`]),
/// so the map holds roughly one TTL worth of traffic.
#[derive(Clone, Default)]
pub struct MemoryNonceStore {
    records: Arc<DashMap<(String, String), NonceRecord>>,
    sweep: SweepSchedule,
}

impl MemoryNonceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove records with `expires_at <= now`.
    ///
    /// Returns the number of records removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.is_live(now));
        before.saturating_sub(self.records.len())
    }

    /// Number of stored records, live or not yet purged.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored record for a pair, if any.
    pub fn get(&self, device_id: &str, nonce: &str) -> Option<NonceRecord> {
        self.records.get(&(device_id.to_owned(), nonce.to_owned())).map(|r| r.value().clone())
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn check_and_set(&self, record: NonceRecord) -> Result<NonceClaim, NonceStoreError> {
        let now = record.first_seen_at;
        let key = (record.device_id.clone(), record.nonce.clone());

        // Sweep before taking the entry guard; retain locks every shard.
        if self.sweep.claim(now) {
            let purged = self.purge_expired(now);
            if purged > 0 {
                tracing::debug!(purged, "swept expired nonce records");
            }
        }

        match self.records.entry(key) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_live(now) {
                    return Ok(NonceClaim::Replayed { first_seen_at: existing.get().first_seen_at });
                }
                existing.insert(record);
            },
            Entry::Vacant(slot) => {
                slot.insert(record);
            },
        }

        Ok(NonceClaim::Accepted)
    }
}
