//! Injectable randomness for civilization assignment.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniformly distributed indices.
pub trait RandomSource {
    /// Uniform index in `[0, max_inclusive]`.
    fn index_up_to(&mut self, max_inclusive: usize) -> usize;
}

/// Production source backed by `StdRng`.
pub struct StdRandom(StdRng);

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for StdRandom {
    fn index_up_to(&mut self, max_inclusive: usize) -> usize {
        self.0.gen_range(0..=max_inclusive)
    }
}

/// Replays a fixed list of picks, clamped to the requested range. Yields 0
/// once the script runs out.
#[derive(Debug, Default, Clone)]
pub struct ScriptedRandom {
    picks: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn new(picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            picks: picks.into_iter().collect(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn index_up_to(&mut self, max_inclusive: usize) -> usize {
        self.picks.pop_front().unwrap_or(0).min(max_inclusive)
    }
}
