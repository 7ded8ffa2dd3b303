//! ETAS model coefficients.
//!
//! All scale parameters are stored in log-10 form exactly as the inversion
//! reports them. The accessors return the linear values used by the
//! kernels.

use serde::{Deserialize, Serialize};

/// The fitted ETAS parameter set θ.
///
/// The set is immutable for the duration of a simulation run. Field names
/// match the keys written by the parameter inversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EtasParameters {
    /// Background rate per day per unit area (log-10).
    pub log10_mu: f64,
    /// Productivity constant (log-10).
    pub log10_k0: f64,
    /// Productivity exponent with respect to magnitude.
    pub a: f64,
    /// Omori-law time offset in days (log-10).
    pub log10_c: f64,
    /// Omori-law decay exponent.
    pub omega: f64,
    /// Exponential taper time scale in days (log-10).
    pub log10_tau: f64,
    /// Spatial kernel scale in km² (log-10).
    pub log10_d: f64,
    /// Magnitude scaling of the spatial kernel.
    pub gamma: f64,
    /// Spatial kernel tail exponent.
    pub rho: f64,
}

impl EtasParameters {
    /// Names of the coefficients in canonical order.
    pub const NAMES: [&'static str; 9] = [
        "log10_mu",
        "log10_k0",
        "a",
        "log10_c",
        "omega",
        "log10_tau",
        "log10_d",
        "gamma",
        "rho",
    ];

    /// Background rate `mu`.
    pub fn mu(&self) -> f64 {
        10_f64.powf(self.log10_mu)
    }

    /// Productivity constant `k0`.
    pub fn k0(&self) -> f64 {
        10_f64.powf(self.log10_k0)
    }

    /// Omori-law offset `c` in days.
    pub fn c(&self) -> f64 {
        10_f64.powf(self.log10_c)
    }

    /// Taper time scale `tau` in days.
    pub fn tau(&self) -> f64 {
        10_f64.powf(self.log10_tau)
    }

    /// Spatial kernel scale `d` in km².
    pub fn d(&self) -> f64 {
        10_f64.powf(self.log10_d)
    }

    /// Coefficients in canonical order (see [`Self::NAMES`]).
    pub const fn to_array(&self) -> [f64; 9] {
        [
            self.log10_mu,
            self.log10_k0,
            self.a,
            self.log10_c,
            self.omega,
            self.log10_tau,
            self.log10_d,
            self.gamma,
            self.rho,
        ]
    }

    /// Name of the first coefficient that is NaN or infinite, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .zip(self.to_array())
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EtasParameters {
        EtasParameters {
            log10_mu: -3.0,
            log10_k0: -2.5,
            a: 1.8,
            log10_c: -2.0,
            omega: 0.5,
            log10_tau: 2.0,
            log10_d: -1.0,
            gamma: 1.0,
            rho: 0.6,
        }
    }

    #[test]
    fn linear_accessors() {
        let theta = sample();
        assert!((theta.mu() - 1e-3).abs() < 1e-15);
        assert!((theta.c() - 0.01).abs() < 1e-15);
        assert!((theta.tau() - 100.0).abs() < 1e-9);
        assert!((theta.d() - 0.1).abs() < 1e-15);
    }

    #[test]
    fn detects_non_finite_coefficient() {
        let mut theta = sample();
        assert_eq!(theta.first_non_finite(), None);
        theta.omega = f64::NAN;
        assert_eq!(theta.first_non_finite(), Some("omega"));
    }

    #[test]
    fn deserializes_inversion_keys() {
        let json = r#"{
            "log10_mu": -6.1, "log10_k0": -2.4, "a": 1.9, "log10_c": -2.7,
            "omega": -0.03, "log10_tau": 3.6, "log10_d": -0.6, "gamma": 1.2,
            "rho": 0.6
        }"#;
        let theta: Result<EtasParameters, _> = serde_json::from_str(json);
        assert!(theta.is_ok());
        let theta = theta.ok().unwrap_or_else(sample);
        assert!((theta.omega + 0.03).abs() < 1e-12);
    }
}
