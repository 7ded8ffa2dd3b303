//! Model mathematics of the ETAS catalog simulator.
//!
//! Each triggering kernel of the Epidemic-Type Aftershock Sequence model is
//! exposed as a small sampler that draws from its distribution given an
//! explicit random number generator. No state is shared between calls.
//!
//! # Modules
//!
//! - [`special`] -- Gamma, incomplete gamma and exponential integral functions
//! - [`solve`] -- Bracketing inversion and Nelder–Mead minimisation
//! - [`temporal`] -- Tapered Omori-law delay sampling (exact and approximate)
//! - [`spatial`] -- Power-law distance sampling and degree conversions
//! - [`magnitude`] -- Pluggable magnitude sampling, Gutenberg–Richter default
//! - [`productivity`] -- Expected offspring counts and branching ratio
//! - [`geometry`] -- Target polygon, bounding rectangle and area
//! - [`error`] -- Kernel error type

pub mod error;
pub mod geometry;
pub mod magnitude;
pub mod productivity;
pub mod solve;
pub mod spatial;
pub mod special;
pub mod temporal;

pub use error::KernelError;
pub use geometry::{AreaMetric, Bounds, Region};
pub use magnitude::{GutenbergRichter, MagnitudeSampler};
pub use productivity::{branching_ratio, expected_aftershocks};
pub use spatial::{EARTH_RADIUS_KM, SpatialKernel, degree_lengths, displace, haversine};
pub use temporal::{TemporalKernel, TimeSampling};
