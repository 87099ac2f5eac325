//! Deterministic pseudo-randomness for feature subsampling
//!
//! Every run with the same `random_state` draws the same feature subsets,
//! independent of platform.

use std::num::Wrapping;

/// Linear congruential generator (glibc constants)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 1103515245;
    const INCREMENT: u64 = 12345;
    const MODULUS: u64 = 1 << 31;

    pub fn new(seed: i64) -> Self {
        Self {
            state: Wrapping(seed.unsigned_abs() % Self::MODULUS),
        }
    }

    /// Next value in `[0, 2^31)`
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Uniform value in `[0, max)`; zero when `max` is zero
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as usize
    }

    /// Uniform value in `[0.0, 1.0)`
    pub fn next_f64(&mut self) -> f64 {
        self.next_u64() as f64 / Self::MODULUS as f64
    }

    /// Draw `k` distinct indices out of `0..n`, returned in ascending order.
    ///
    /// Uses a partial Fisher-Yates shuffle so the draw only depends on the
    /// generator state.
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        let k = k.min(n);
        let mut pool: Vec<usize> = (0..n).collect();
        for i in 0..k {
            let j = i + self.next_range(n - i);
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool.sort_unstable();
        pool
    }
}
