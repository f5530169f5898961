//! Simulated environment: settable wall clock and seeded RNG.
//!
//! Every test run with the same seed draws the same nonces and AEAD nonces,
//! so failures reproduce exactly.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use signalgate_core::Environment;

/// 2025-01-01T00:00:00Z, a day boundary.
pub const SIM_EPOCH: u64 = 1_735_689_600;

/// Deterministic [`Environment`] for tests.
///
/// Clones share the clock and the RNG, so advancing time in a test is seen
/// by the gate it built.
#[derive(Clone)]
pub struct SimEnv {
    clock: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Environment at [`SIM_EPOCH`] with the given RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::at(SIM_EPOCH, seed)
    }

    /// Environment at `now` with the given RNG seed.
    pub fn at(now: u64, seed: u64) -> Self {
        Self {
            clock: Arc::new(AtomicU64::new(now)),
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }

    /// Jump the clock to `now` (may go backwards).
    pub fn set_time(&self, now: u64) {
        self.clock.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.clock.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    fn wall_clock_secs(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        #[allow(clippy::expect_used)]
        self.rng.lock().expect("SimEnv RNG mutex poisoned").fill_bytes(buffer);
    }
}
