//! Injectable randomness.
//!
//! Simulated latency, filler step durations, the planning estimate, and the
//! criteria heuristic all draw from a `RandomSource` so tests can pin them.

use std::sync::{Mutex, PoisonError};

use rand::{rngs::StdRng, Rng, SeedableRng};

pub trait RandomSource: Send + Sync {
    /// A uniform draw in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// A draw in `[min, max]`, inclusive. Returns `min` when `max <= min`.
    fn range_u64(&self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f64;
        (min + (self.next_f64() * span).floor() as u64).min(max)
    }
}

/// `StdRng` behind a mutex; reproducible when built from a seed.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random::<f64>()
    }
}

/// Always returns the same value. For tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let a = SeededRandom::new(7);
        let b = SeededRandom::new(7);
        for _ in 0..5 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }

    #[test]
    fn range_is_inclusive_and_clamped() {
        assert_eq!(FixedRandom(0.0).range_u64(800, 1399), 800);
        assert_eq!(FixedRandom(0.999_999).range_u64(800, 1399), 1399);
        assert_eq!(FixedRandom(0.5).range_u64(10, 10), 10);
        assert_eq!(FixedRandom(0.5).range_u64(10, 3), 10);
    }

    #[test]
    fn seeded_draws_stay_in_unit_interval() {
        let rng = SeededRandom::new(42);
        for _ in 0..1000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }
}
