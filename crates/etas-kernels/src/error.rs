//! Error types for the `etas-kernels` crate.
//!
//! All fallible kernel operations return [`KernelError`].

/// Errors raised while evaluating or sampling a model kernel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// The inverse of the tapered Omori CDF could not be resolved.
    #[error("temporal inversion failed for target {target} (a = {a}, x0 = {x0})")]
    NumericalInversion {
        /// CDF target value that could not be inverted.
        target: f64,
        /// Shape parameter of the extended incomplete gamma function (−ω).
        a: f64,
        /// Lower integration bound c/τ.
        x0: f64,
    },

    /// A polygon needs at least three vertices.
    #[error("polygon has {count} vertices, at least 3 are required")]
    DegeneratePolygon {
        /// Number of vertices supplied.
        count: usize,
    },

    /// A coordinate or kernel argument is NaN or infinite.
    #[error("non-finite value for {name}")]
    NonFinite {
        /// Name of the offending quantity.
        name: &'static str,
    },

    /// A kernel parameter lies outside its valid domain.
    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        /// Name of the parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
