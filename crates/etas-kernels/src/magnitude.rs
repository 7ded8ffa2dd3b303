//! Magnitude sampling.
//!
//! The simulator treats magnitude sampling as a pluggable primitive: any
//! [`MagnitudeSampler`] can be injected. The default is the
//! Gutenberg–Richter law, an exponential distribution above the
//! completeness magnitude.

use rand::{Rng, RngCore};

use crate::error::KernelError;

/// Draws event magnitudes above a completeness threshold.
pub trait MagnitudeSampler {
    /// Draw `n` magnitudes, each at least `mc`.
    fn sample(&self, n: usize, mc: f64, rng: &mut dyn RngCore) -> Vec<f64>;
}

/// Gutenberg–Richter magnitudes `mc − ln(1 − u)/β`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GutenbergRichter {
    beta: f64,
}

impl GutenbergRichter {
    /// Create a sampler with decay rate `beta` (`b·ln 10`). Must be positive.
    pub fn new(beta: f64) -> Result<Self, KernelError> {
        if !beta.is_finite() {
            return Err(KernelError::NonFinite { name: "beta" });
        }
        if beta <= 0.0 {
            return Err(KernelError::InvalidParameter {
                name: "beta",
                reason: format!("must be positive, got {beta}"),
            });
        }
        Ok(Self { beta })
    }

    /// Create a sampler from a Gutenberg–Richter b-value.
    pub fn from_b_value(b: f64) -> Result<Self, KernelError> {
        Self::new(b * core::f64::consts::LN_10)
    }

    /// The decay rate β.
    pub const fn beta(&self) -> f64 {
        self.beta
    }
}

impl MagnitudeSampler for GutenbergRichter {
    fn sample(&self, n: usize, mc: f64, rng: &mut dyn RngCore) -> Vec<f64> {
        (0..n)
            .map(|_| mc - (1.0 - rng.random::<f64>()).ln() / self.beta)
            .collect()
    }
}
