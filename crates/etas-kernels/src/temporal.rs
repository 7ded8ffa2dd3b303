//! Tapered Omori-law delay sampling.
//!
//! The aftershock rate of an event decays as `(t + c)^-(1+ω) · e^{-t/τ}`
//! with time `t` (days) after the event. Its survival function is
//! `Γ(−ω, (t + c)/τ) / Γ(−ω, c/τ)`, so a delay is drawn by inverting the
//! extended upper incomplete gamma function at a uniformly distributed
//! target. An approximate closed-form inverse is available as an opt-in.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use etas_types::EtasParameters;

use crate::error::KernelError;
use crate::solve::{NelderMead, invert_decreasing};
use crate::special::{gamma, inverse_gamma_q, upper_gamma_ext};

/// Exponents below this magnitude use the logarithmic limit in the
/// approximate inverse.
const OMEGA_ZERO: f64 = 1e-9;

/// How aftershock delays are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSampling {
    /// Invert the exact tapered Omori CDF.
    #[default]
    Exact,
    /// Use the power-law-then-exponential closed-form approximation.
    Approximate,
}

/// The temporal part of the triggering kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalKernel {
    c: f64,
    omega: f64,
    tau: f64,
}

impl TemporalKernel {
    /// Build from linear parameters. `c` and `tau` must be positive.
    pub fn new(c: f64, omega: f64, tau: f64) -> Result<Self, KernelError> {
        if !c.is_finite() || !omega.is_finite() || !tau.is_finite() {
            return Err(KernelError::NonFinite {
                name: "temporal kernel parameter",
            });
        }
        if c <= 0.0 || tau <= 0.0 {
            return Err(KernelError::InvalidParameter {
                name: "c/tau",
                reason: format!("must be positive, got c = {c}, tau = {tau}"),
            });
        }
        Ok(Self { c, omega, tau })
    }

    /// Build from the model parameter set.
    pub fn from_params(theta: &EtasParameters) -> Result<Self, KernelError> {
        Self::new(theta.c(), theta.omega, theta.tau())
    }

    /// Shape of the incomplete gamma function, `−ω`.
    const fn shape(&self) -> f64 {
        -self.omega
    }

    /// Lower integration bound `c/τ`.
    pub fn x0(&self) -> f64 {
        self.c / self.tau
    }

    /// `Γ(−ω, c/τ)`, proportional to the total mass of the kernel.
    pub fn total_mass(&self) -> f64 {
        upper_gamma_ext(self.shape(), self.x0())
    }

    /// Probability that a delay does not exceed `t` days.
    pub fn cdf(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        1.0 - upper_gamma_ext(self.shape(), (t + self.c) / self.tau) / self.total_mass()
    }

    // -----------------------------------------------------------------------
    // Exact inverse
    // -----------------------------------------------------------------------

    /// Delays (days) for uniform variates `ys ∈ [0, 1)` via the exact inverse.
    ///
    /// For `−ω > 0` the inverse is analytic. Otherwise the whole batch goes
    /// through a bracketing solver first and the entries it could not
    /// resolve are retried with a Nelder–Mead minimisation started at 1.
    pub fn inverse_exact(&self, ys: &[f64]) -> Result<Vec<f64>, KernelError> {
        let a = self.shape();
        let x0 = self.x0();
        let mass = self.total_mass();
        let targets: Vec<f64> = ys.iter().map(|y| (1.0 - y) * mass).collect();

        let xs: Vec<f64> = if a > 0.0 {
            let norm = gamma(a);
            targets
                .iter()
                .map(|target| inverse_gamma_q(a, target / norm))
                .collect()
        } else {
            let f = |x: f64| upper_gamma_ext(a, x);
            let mut xs: Vec<f64> = targets
                .iter()
                .map(|&target| invert_decreasing(f, target, x0))
                .collect();
            let unresolved = xs.iter().filter(|x| x.is_nan()).count();
            if unresolved > 0 {
                debug!(unresolved, a, "falling back to Nelder-Mead inversion");
                for (x, &target) in xs.iter_mut().zip(&targets) {
                    if x.is_nan() {
                        *x = self.minimize_residual(target);
                    }
                }
            }
            xs
        };

        xs.into_iter()
            .zip(targets)
            .map(|(x, target)| {
                let delay = x * self.tau - self.c;
                if delay.is_finite() {
                    Ok(delay)
                } else {
                    Err(KernelError::NumericalInversion { target, a, x0 })
                }
            })
            .collect()
    }

    /// `x` with `Γ(−ω, x) ≈ target`, found by minimising the squared residual
    /// from `x = 1`.
    fn minimize_residual(&self, target: f64) -> f64 {
        let a = self.shape();
        NelderMead::default().minimize(|v| (upper_gamma_ext(a, v) - target).powi(2), 1.0)
    }

    // -----------------------------------------------------------------------
    // Approximate inverse
    // -----------------------------------------------------------------------

    /// Delay (days) for a uniform variate `p ∈ [0, 1)` under the approximation
    /// `k1 (t + c)^-(1+ω)` for `t < τ` and `k2 e^{-t/τ}` beyond.
    ///
    /// The two pieces are joined continuously at `t = τ`; the inverse switches
    /// branch at the probability mass accumulated up to `τ`.
    pub fn inverse_approx(&self, p: f64) -> f64 {
        let (c, omega, tau) = (self.c, self.omega, self.tau);
        let e = core::f64::consts::E;
        let near_zero = omega.abs() < OMEGA_ZERO;

        let part_a = if near_zero {
            ((tau + c) / c).ln()
        } else {
            -((tau + c).powf(-omega) - c.powf(-omega)) / omega
        };
        let part_b = tau * (tau + c).powf(-(1.0 + omega));
        let k1 = 1.0 / (part_a + part_b);
        let k2 = k1 * e / (tau + c).powf(1.0 + omega);
        let split = part_a / (part_a + part_b);

        if p < split {
            if near_zero {
                c * (p / k1).exp() - c
            } else {
                (c.powf(-omega) - omega * p / k1).powf(-1.0 / omega) - c
            }
        } else {
            -tau * (-(p - split) / (tau * k2) + e.recip()).ln()
        }
    }

    // -----------------------------------------------------------------------
    // Sampling
    // -----------------------------------------------------------------------

    /// Draw `n` delays in days.
    pub fn sample<R: Rng>(
        &self,
        n: usize,
        method: TimeSampling,
        rng: &mut R,
    ) -> Result<Vec<f64>, KernelError> {
        let ys: Vec<f64> = (0..n).map(|_| rng.random::<f64>()).collect();
        match method {
            TimeSampling::Exact => self.inverse_exact(&ys),
            TimeSampling::Approximate => Ok(ys.iter().map(|&p| self.inverse_approx(p)).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn kernel(omega: f64) -> TemporalKernel {
        TemporalKernel {
            c: 10_f64.powf(-2.5),
            omega,
            tau: 10_f64.powf(3.5),
        }
    }

    fn round_trips(kernel: &TemporalKernel) {
        let ys = [0.0, 0.05, 0.3, 0.5, 0.77, 0.95, 0.999];
        let delays = kernel.inverse_exact(&ys);
        assert!(delays.is_ok());
        for (y, delay) in ys.iter().zip(delays.unwrap_or_default()) {
            assert!(delay >= -1e-9, "negative delay {delay}");
            assert!((kernel.cdf(delay) - y).abs() < 1e-6, "y={y} delay={delay}");
        }
    }

    #[test]
    fn exact_inverse_closed_form_branch() {
        // omega < 0 gives a positive gamma shape.
        round_trips(&kernel(-0.2));
    }

    #[test]
    fn exact_inverse_solver_branch() {
        round_trips(&kernel(0.3));
        round_trips(&kernel(0.0));
        round_trips(&kernel(1.2));
    }

    #[test]
    fn exact_inverse_minimizer_branch() {
        for omega in [0.3, 1.2] {
            let kernel = kernel(omega);
            let mass = kernel.total_mass();
            for y in [0.05, 0.3, 0.5, 0.77, 0.95] {
                let x = kernel.minimize_residual((1.0 - y) * mass);
                let delay = x * kernel.tau - kernel.c;
                assert!(delay > 0.0, "omega={omega} y={y} delay={delay}");
                assert!((kernel.cdf(delay) - y).abs() < 5e-6, "omega={omega} y={y}");
            }
        }
    }

    #[test]
    fn zero_variate_gives_zero_delay() {
        let delays = kernel(0.1).inverse_exact(&[0.0]).unwrap_or_default();
        assert_eq!(delays.len(), 1);
        assert!(delays.iter().all(|d| d.abs() < 1e-9));
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(TemporalKernel::new(0.0, 0.1, 1.0).is_err());
        assert!(TemporalKernel::new(1.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn approximate_inverse_is_monotone_and_continuous() {
        for omega in [-0.1, 0.0, 0.4] {
            let kernel = kernel(omega);
            let mut prev = -1.0;
            for i in 0..1000 {
                let p = f64::from(i) / 1000.0;
                let t = kernel.inverse_approx(p);
                assert!(t.is_finite());
                assert!(t >= prev - 1e-9, "omega={omega} p={p}");
                prev = t;
            }
            assert!(kernel.inverse_approx(0.0).abs() < 1e-12);
        }
    }

    #[test]
    fn approximate_split_sits_at_tau() {
        let kernel = kernel(0.2);
        let (c, omega, tau) = (kernel.c, kernel.omega, kernel.tau);
        let part_a = -((tau + c).powf(-omega) - c.powf(-omega)) / omega;
        let part_b = tau * (tau + c).powf(-(1.0 + omega));
        let split = part_a / (part_a + part_b);
        let below = kernel.inverse_approx(split - 1e-9);
        let above = kernel.inverse_approx(split + 1e-9);
        assert!((below - tau).abs() / tau < 1e-4);
        assert!((above - tau).abs() / tau < 1e-4);
    }

    #[test]
    fn sampling_is_reproducible() {
        let kernel = kernel(0.1);
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let first = kernel.sample(50, TimeSampling::Exact, &mut a);
        let second = kernel.sample(50, TimeSampling::Exact, &mut b);
        assert!(first.is_ok());
        assert_eq!(first, second);
        assert!(first.unwrap_or_default().iter().all(|d| *d >= -1e-9));
    }
}
