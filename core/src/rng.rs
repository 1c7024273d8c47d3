//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! All randomness flows through SampleRng instances derived
//! from the single master seed supplied with a probabilistic run.
//!
//! Each Monte Carlo sample gets its own stream, seeded from
//! (master_seed XOR sample_index * golden-ratio). This means:
//!   - Samples can be drawn on any worker thread in any order.
//!   - Sample i is fully reproducible in isolation.

use rand::SeedableRng;
use rand_distr::Distribution;
use rand_pcg::Pcg64Mcg;

const STREAM_SPREAD: u64 = 0x9e37_79b9_7f4a_7c15;

/// A deterministic RNG for a single probabilistic sample.
pub struct SampleRng {
    inner: Pcg64Mcg,
}

impl SampleRng {
    /// Create the stream for `sample_index` under `master_seed`.
    /// The derivation must never change once published: audited runs
    /// are replayed from their seed.
    pub fn new(master_seed: u64, sample_index: u64) -> Self {
        let derived_seed = master_seed ^ sample_index.wrapping_mul(STREAM_SPREAD);
        Self { inner: Pcg64Mcg::seed_from_u64(derived_seed) }
    }

    /// Draw one value from a `rand_distr` distribution on this stream.
    pub fn draw<D: Distribution<f64>>(&mut self, dist: &D) -> f64 {
        dist.sample(&mut self.inner)
    }
}

/// Hands out per-sample streams for one probabilistic run.
#[derive(Debug, Clone, Copy)]
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_sample(&self, sample_index: u64) -> SampleRng {
        SampleRng::new(self.master_seed, sample_index)
    }
}
