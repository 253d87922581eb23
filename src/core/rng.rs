//! Per-entity deterministic random streams
//!
//! Every person owns one `EntityRng`. All of them share the run seed but each
//! selects its own ChaCha stream from the entity seed, so draw sequences do not
//! depend on how entities are distributed over worker threads.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
pub struct EntityRng {
    inner: ChaCha8Rng,
    draws: u64,
}

impl EntityRng {
    pub fn new(run_seed: u64, entity_seed: u64) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(run_seed);
        inner.set_stream(entity_seed);
        Self { inner, draws: 0 }
    }

    /// Uniform draw in [0, 1)
    pub fn uniform(&mut self) -> f64 {
        self.draws += 1;
        self.inner.gen::<f64>()
    }

    /// Uniform integer in [0, bound); always 0 for an empty bound
    pub fn below(&mut self, bound: u64) -> u64 {
        self.draws += 1;
        if bound == 0 {
            return 0;
        }
        self.inner.gen_range(0..bound)
    }

    /// Uniform draw in [low, high)
    pub fn range(&mut self, low: f64, high: f64) -> f64 {
        low + self.uniform() * (high - low)
    }

    /// Normal draw (Box-Muller); counts as a single draw
    pub fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        self.draws += 1;
        // 1 - u keeps the log argument in (0, 1]
        let u1 = 1.0 - self.inner.gen::<f64>();
        let u2 = self.inner.gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + z * std_dev
    }

    /// Number of draws taken from this stream so far
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seeds_same_sequence() {
        let mut a = EntityRng::new(42, 7);
        let mut b = EntityRng::new(42, 7);
        for _ in 0..100 {
            assert_eq!(a.uniform(), b.uniform());
        }
    }

    #[test]
    fn test_entities_get_independent_streams() {
        let mut a = EntityRng::new(42, 1);
        let mut b = EntityRng::new(42, 2);
        let xs: Vec<f64> = (0..8).map(|_| a.uniform()).collect();
        let ys: Vec<f64> = (0..8).map(|_| b.uniform()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_run_seed_changes_sequence() {
        let mut a = EntityRng::new(1, 5);
        let mut b = EntityRng::new(2, 5);
        assert_ne!(a.uniform(), b.uniform());
    }

    #[test]
    fn test_uniform_bounds() {
        let mut rng = EntityRng::new(3, 3);
        for _ in 0..10_000 {
            let u = rng.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_below_and_range() {
        let mut rng = EntityRng::new(9, 0);
        for _ in 0..1_000 {
            assert!(rng.below(6) < 6);
            let x = rng.range(2.0, 4.0);
            assert!((2.0..4.0).contains(&x));
        }
        assert_eq!(rng.below(0), 0);
    }

    #[test]
    fn test_draw_counter() {
        let mut rng = EntityRng::new(0, 0);
        rng.uniform();
        rng.below(10);
        rng.range(0.0, 1.0);
        rng.gaussian(0.0, 1.0);
        assert_eq!(rng.draws(), 4);
    }

    #[test]
    fn test_gaussian_mean() {
        let mut rng = EntityRng::new(11, 11);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| rng.gaussian(10.0, 2.0)).sum::<f64>() / n as f64;
        assert!((mean - 10.0).abs() < 0.1, "mean was {}", mean);
    }
}
