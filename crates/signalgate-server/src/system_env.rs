//! Production environment: system wall clock and OS randomness.

use signalgate_core::Environment;

/// Production environment using the system clock and the OS CSPRNG.
///
/// # Security
///
/// Randomness comes from getrandom (e.g. `getrandom(2)` on Linux,
/// `BCryptGenRandom` on Windows). AEAD nonces and request nonces are drawn
/// from it.
///
/// # Panics
///
/// Panics if the OS RNG fails. A server without working randomness would
/// reuse AEAD nonces, so there is nothing safe to fall back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used, clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }

    #[allow(clippy::expect_used, clippy::disallowed_methods)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - server cannot operate securely");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_is_recent() {
        // 2024-01-01T00:00:00Z
        assert!(SystemEnv::new().wall_clock_secs() > 1_704_067_200);
    }

    #[test]
    fn random_bytes_differ() {
        let env = SystemEnv::new();

        let a: [u8; 32] = env.random_array();
        let b: [u8; 32] = env.random_array();

        assert_ne!(a, b, "Random bytes should differ");
    }

    #[test]
    fn random_bytes_fill_buffer() {
        let env = SystemEnv::new();

        let mut bytes = [0u8; 64];
        env.random_bytes(&mut bytes);

        let non_zero_count = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero_count > 32, "Most bytes should be non-zero");
    }
}
