//! Nonce store implementations.
//!
//! Every implementation honors the [`NonceStore`] contract: a
//! `(device_id, nonce)` pair is claimed by one atomic check-and-set, and a
//! record is only removed once `now >= expires_at`.
//!
//! Expired records are swept by the claims themselves, at most once per
//! [`SWEEP_INTERVAL_SECS`] of request time, so a store stays bounded
//! without an external purge job.
//!
//! - [`MemoryNonceStore`]: single-process, sharded concurrent map
//! - [`RedbNonceStore`]: durable, survives restarts
//! - [`ChaoticNonceStore`]: fault injection wrapper for tests

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

mod chaotic;
mod memory;
mod redb;

pub use chaotic::ChaoticNonceStore;
pub use memory::MemoryNonceStore;
pub use signalgate_core::{NonceClaim, NonceRecord, NonceStore, NonceStoreError};

pub use self::redb::RedbNonceStore;

/// Minimum request-time gap between two sweeps of expired records.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Decides which claim sweeps expired records. Clones share the schedule.
#[derive(Debug, Clone, Default)]
pub(crate) struct SweepSchedule {
    next_at: Arc<AtomicU64>,
}

impl SweepSchedule {
    /// Whether the caller should sweep at `now`. At most one concurrent
    /// caller wins per interval.
    pub(crate) fn claim(&self, now: u64) -> bool {
        let due = self.next_at.load(Ordering::Acquire);
        now >= due
            && self
                .next_at
                .compare_exchange(due, now.saturating_add(SWEEP_INTERVAL_SECS), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_claimed_once_per_interval() {
        let schedule = SweepSchedule::default();
        let shared = schedule.clone();

        assert!(schedule.claim(1000));
        assert!(!shared.claim(1000));
        assert!(!schedule.claim(1000 + SWEEP_INTERVAL_SECS - 1));
        assert!(shared.claim(1000 + SWEEP_INTERVAL_SECS));
    }
}
