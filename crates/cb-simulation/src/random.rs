//! Randomness shared by every replica.
//!
//! The stream is a ChaCha8 generator seeded from the session seed. ChaCha's
//! output is specified independently of platform and crate version, and its
//! word position can be captured and restored, so a resynchronized replica
//! continues the exact same sequence.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::snapshot::RandomState;

/// Deterministic random source seeded through the replication substrate.
#[derive(Debug, Clone)]
pub struct SharedRandom {
    seed: u64,
    rng: ChaCha8Rng,
}

impl SharedRandom {
    /// Start the stream for `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Resume a stream captured by [`state`](Self::state).
    pub fn resume(state: RandomState) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(state.seed);
        rng.set_word_pos(state.position);
        Self {
            seed: state.seed,
            rng,
        }
    }

    /// Seed and position, enough to resume the stream elsewhere.
    pub fn state(&self) -> RandomState {
        RandomState {
            seed: self.seed,
            position: self.rng.get_word_pos(),
        }
    }

    /// A uniform value in `0..bound`. `bound` must be positive.
    pub fn below(&mut self, bound: u32) -> u32 {
        self.rng.random_range(0..bound)
    }
}
