//! Randomness seam for the forecast noise terms.
//!
//! The two noise terms in the forecast are the only intentionally
//! non-reproducible values in the pipeline; everything else is a pure
//! function of cached inputs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform samples in `[0, 1)`.
pub trait EntropySource: Send {
    fn next_unit(&mut self) -> f64;
}

/// Adapter from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngEntropy<R>(pub R);

impl RngEntropy<StdRng> {
    /// OS-seeded generator for production use.
    pub fn from_os() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> EntropySource for RngEntropy<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Always returns the same sample. `ConstantEntropy(0.5)` zeroes the noise.
#[derive(Debug, Clone, Copy)]
pub struct ConstantEntropy(pub f64);

impl EntropySource for ConstantEntropy {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}
