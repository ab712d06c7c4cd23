//! Seeded noise for simulated channel readings

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Noise generator with configurable seed for reproducibility
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// If seed is 0, uses random entropy; otherwise results are reproducible.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Gaussian noise with given standard deviation
    #[inline]
    pub fn gaussian(&mut self, stddev: f32) -> f32 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f32 = self.rng.sample(StandardNormal);
        n * stddev
    }

    /// Perturb a channel count, clamped to `0..=max`
    pub fn perturb_count(&mut self, value: u16, stddev: f32, max: u16) -> u16 {
        let noisy = value as f32 + self.gaussian(stddev);
        noisy.round().clamp(0.0, max as f32) as u16
    }

    /// Returns true with given probability
    #[inline]
    pub fn chance(&mut self, probability: f32) -> bool {
        if probability <= 0.0 {
            return false;
        }
        Uniform::new(0.0f32, 1.0).sample(&mut self.rng) < probability
    }
}
