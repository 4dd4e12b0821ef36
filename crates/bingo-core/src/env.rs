//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples session logic from system resources
//! (time, randomness). This enables:
//!
//! - Deterministic Simulation: the harness provides a virtual clock and a
//!   seeded RNG, so a failing interleaving replays exactly.
//!
//! - Production Runtime: the server uses system time and OS entropy without
//!   any change to the session logic.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::{ops::Sub, time::Duration};

/// Abstract environment providing time and randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Point in time as seen by this environment.
    ///
    /// Simulations use a virtual instant; production uses
    /// `std::time::Instant`.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + Sub<Output = Duration>;

    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Fills the provided buffer with random bytes.
    ///
    /// Simulation implementations MUST derive these from a logged seed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a uniformly distributed index in `0..bound`.
    ///
    /// Uses rejection sampling so small bounds carry no modulo bias.
    /// Returns 0 when `bound` is 0.
    fn random_index(&self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        let bound = bound as u64;
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let value = self.random_u64();
            if value < zone {
                #[allow(clippy::cast_possible_truncation)]
                return (value % bound) as usize;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, sync::atomic::AtomicU64, sync::atomic::Ordering, time::Instant};

    use super::*;

    #[derive(Clone)]
    struct CountingEnv {
        counter: Arc<AtomicU64>,
    }

    impl Environment for CountingEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let value = self.counter.fetch_add(1, Ordering::Relaxed);
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = value.to_be_bytes()[i % 8];
            }
        }
    }

    #[test]
    fn random_index_stays_in_bounds() {
        let env = CountingEnv { counter: Arc::new(AtomicU64::new(0)) };
        for bound in 1..50 {
            assert!(env.random_index(bound) < bound);
        }
    }

    #[test]
    fn random_index_zero_bound() {
        let env = CountingEnv { counter: Arc::new(AtomicU64::new(7)) };
        assert_eq!(env.random_index(0), 0);
    }
}
