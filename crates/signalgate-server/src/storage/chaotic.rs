//! Chaotic nonce store wrapper for fault injection testing
//!
//! Randomly fails check-and-set calls so tests can prove the gate rejects
//! requests (fails closed) whenever the store cannot vouch for a nonce.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use super::{NonceClaim, NonceRecord, NonceStore, NonceStoreError};

/// Nonce store wrapper that randomly injects backend failures.
///
/// A failed call never reaches the inner store, so an injected failure
/// leaves no record behind. Clones share the RNG and counters.
#[derive(Clone)]
pub struct ChaoticNonceStore<S: NonceStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
    failure_count: Arc<AtomicUsize>,
}

/// Linear congruential generator, reproducible from its seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: NonceStore> ChaoticNonceStore<S> {
    /// Wrap `inner` with a fixed default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x5167_4a7e_0000_0001)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
            failure_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total check-and-set calls attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Calls that were failed by injection.
    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::Relaxed)
    }

    fn should_fail(&self) -> bool {
        #[allow(clippy::expect_used)]
        let roll = self.rng.lock().expect("ChaoticRng mutex poisoned").next();
        roll < self.failure_rate
    }
}

#[async_trait]
impl<S: NonceStore> NonceStore for ChaoticNonceStore<S> {
    async fn check_and_set(&self, record: NonceRecord) -> Result<NonceClaim, NonceStoreError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        if self.should_fail() {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
            return Err(NonceStoreError::Backend("chaotic failure injection".to_string()));
        }
        self.inner.check_and_set(record).await
    }
}
