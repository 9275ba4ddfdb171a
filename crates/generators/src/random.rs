//! Injectable randomness
//!
//! Each generator owns exactly one source and draws from it for every patient,
//! so aggregate population statistics follow a single stream.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform randomness capability used by generators
pub trait RandomSource {
    /// Uniform draw in `[0, 1)`
    fn next_unit(&mut self) -> f64;

    /// Uniform integer in `[0, n)`; returns 0 when `n == 0`
    fn next_below(&mut self, n: u32) -> u32;
}

/// Production source backed by `StdRng`
#[derive(Debug, Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Seed from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible stream
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when a seed is given, otherwise from entropy
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn next_below(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.rng.random_range(0..n)
    }
}

/// Deterministic source replaying fixed draws, cycling when exhausted.
///
/// Unit draws are clamped into `[0, 1)`; integer draws are reduced modulo `n`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    units: Vec<f64>,
    unit_pos: usize,
    indices: Vec<u32>,
    index_pos: usize,
}

impl ScriptedRandom {
    /// Script both unit and integer draws
    pub fn new(units: impl Into<Vec<f64>>, indices: impl Into<Vec<u32>>) -> Self {
        Self {
            units: units.into(),
            unit_pos: 0,
            indices: indices.into(),
            index_pos: 0,
        }
    }

    /// Script only unit draws
    pub fn units(units: impl Into<Vec<f64>>) -> Self {
        Self::new(units, Vec::new())
    }

    /// Script only integer draws
    pub fn indices(indices: impl Into<Vec<u32>>) -> Self {
        Self::new(Vec::new(), indices)
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        if self.units.is_empty() {
            return 0.0;
        }
        let value = self.units[self.unit_pos % self.units.len()];
        self.unit_pos += 1;
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }

    fn next_below(&mut self, n: u32) -> u32 {
        if n == 0 || self.indices.is_empty() {
            return 0;
        }
        let value = self.indices[self.index_pos % self.indices.len()];
        self.index_pos += 1;
        value % n
    }
}
