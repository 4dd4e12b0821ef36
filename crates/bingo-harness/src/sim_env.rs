//! Simulated environment.
//!
//! Virtual clock plus a seeded ChaCha RNG. Clones share both, so every engine
//! and the coordinator in one simulation observe the same time and draw from
//! the same deterministic stream.

use std::{
    ops::Sub,
    sync::{Arc, Mutex},
    time::Duration,
};

use bingo_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Point on the virtual clock, measured from simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time since simulation start.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

#[derive(Debug)]
struct SimState {
    now: Duration,
    rng: ChaCha8Rng,
}

/// Deterministic environment for simulation.
#[derive(Debug, Clone)]
pub struct SimEnv {
    seed: u64,
    state: Arc<Mutex<SimState>>,
}

impl SimEnv {
    /// Create an environment whose randomness derives from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let state = SimState { now: Duration::ZERO, rng: ChaCha8Rng::seed_from_u64(seed) };
        Self { seed, state: Arc::new(Mutex::new(state)) }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        self.with_state(|s| s.now += by);
    }

    /// Bernoulli draw with probability `p`.
    pub fn chance(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        // 53 random bits give a uniform float in [0, 1).
        #[allow(clippy::cast_precision_loss)]
        let sample = (self.random_u64() >> 11) as f64 / (1u64 << 53) as f64;
        sample < p
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        // A poisoned lock only means another simulated task panicked; the
        // state itself is still consistent.
        let mut guard = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.with_state(|s| s.now))
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.with_state(|s| s.rng.fill_bytes(buffer));
    }
}
