//! Error types for the `etas-core` crate.
//!
//! All fallible simulation operations return [`SimulationError`]. Kernel
//! failures abort the realization being simulated and, through the chunk
//! iterator, the whole stream.

use etas_kernels::KernelError;

use crate::config::ConfigError;

/// Errors that can occur while preparing or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A kernel could not be evaluated or sampled.
    #[error("kernel error: {source}")]
    Kernel {
        /// The underlying kernel error.
        #[from]
        source: KernelError,
    },

    /// The parameter file could not be loaded or is invalid.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// Real-catalog inputs disagree with each other.
    #[error("inconsistent inputs: {reason}")]
    Consistency {
        /// What does not match.
        reason: String,
    },

    /// A safety cap on iterations was hit.
    #[error("{what} exceeded the limit of {limit}")]
    BoundsExceeded {
        /// The capped quantity.
        what: &'static str,
        /// The configured cap.
        limit: u32,
    },

    /// `simulate` was called before `prepare`.
    #[error("simulation has not been prepared")]
    NotPrepared,

    /// The simulation request is malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected.
        reason: String,
    },

    /// Writing simulation output failed.
    #[error("output error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
