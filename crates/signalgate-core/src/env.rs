//! Environment abstraction for deterministic testing.
//!
//! Decouples authentication logic from system resources (wall clock,
//! randomness). Enables deterministic tests (settable clock, seeded RNG) and
//! production use with real system resources.

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production;
///   AEAD nonces are drawn from it
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in Unix seconds.
    ///
    /// Request timestamps, nonce expiry and key rotation are all measured
    /// against this clock. Unlike a monotonic clock it can jump; the replay
    /// guard's skew window absorbs small corrections.
    fn wall_clock_secs(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random fixed-size array.
    ///
    /// Convenience for AEAD nonces and request nonces.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::Environment;

    /// Settable clock and a counter-based byte stream. Not random, but never
    /// repeats within a test.
    #[derive(Clone, Default)]
    pub(crate) struct StepEnv {
        now: Arc<AtomicU64>,
        counter: Arc<AtomicU64>,
    }

    impl StepEnv {
        pub(crate) fn at(now: u64) -> Self {
            let env = Self::default();
            env.set_time(now);
            env
        }

        pub(crate) fn set_time(&self, now: u64) {
            self.now.store(now, Ordering::SeqCst);
        }
    }

    impl Environment for StepEnv {
        fn wall_clock_secs(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for chunk in buffer.chunks_mut(8) {
                let next = self.counter.fetch_add(1, Ordering::SeqCst).to_le_bytes();
                chunk.copy_from_slice(&next[..chunk.len()]);
            }
        }
    }
}
