//! Process-wide randomness owned by the server.
//!
//! The seed is published to every joining client in `InitialState` so that
//! clients can replay the same random sequences (hazard selection) locally.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct RandomService {
    seed: u32,
    rng: StdRng,
}

impl RandomService {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(u64::from(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// True with probability `1 / n`. `n` of 0 or 1 always succeeds.
    pub fn one_in(&mut self, n: u32) -> bool {
        n <= 1 || self.rng.gen_range(0..n) == 0
    }

    /// Uniform value in `0..n`, or 0 when `n` is 0.
    pub fn below(&mut self, n: u8) -> u8 {
        if n == 0 {
            0
        } else {
            self.rng.gen_range(0..n)
        }
    }
}
