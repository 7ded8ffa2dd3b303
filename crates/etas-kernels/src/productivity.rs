//! Aftershock productivity law.

use etas_types::EtasParameters;

use crate::special::upper_gamma_ext;

/// Expected number of direct aftershocks of an event of magnitude `m`
/// above `mc`, integrated over unlimited time and space.
///
/// `k0·e^{a(m−mc)} · π(d·e^{γ(m−mc)})^{−ρ}/ρ · e^{c/τ}·τ^{−ω}·Γ(−ω, c/τ)`
pub fn expected_aftershocks(magnitude: f64, theta: &EtasParameters, mc: f64) -> f64 {
    let excess = magnitude - mc;
    let (c, tau) = (theta.c(), theta.tau());
    let number_factor = theta.k0() * (theta.a * excess).exp();
    let area_factor =
        core::f64::consts::PI * (theta.d() * (theta.gamma * excess).exp()).powf(-theta.rho) / theta.rho;
    let time_factor =
        (c / tau).exp() * tau.powf(-theta.omega) * upper_gamma_ext(-theta.omega, c / tau);
    number_factor * area_factor * time_factor
}

/// Mean number of direct aftershocks per event, averaged over the
/// Gutenberg–Richter magnitude distribution with decay rate `beta`.
///
/// A value at or above 1 means the cascade is supercritical and
/// simulations may not terminate.
pub fn branching_ratio(theta: &EtasParameters, beta: f64) -> f64 {
    let (c, tau) = (theta.c(), theta.tau());
    beta * theta.k0()
        * core::f64::consts::PI
        * theta.d().powf(-theta.rho)
        * tau.powf(-theta.omega)
        * (c / tau).exp()
        * upper_gamma_ext(-theta.omega, c / tau)
        / (theta.rho * (-theta.a + beta + theta.gamma * theta.rho))
}
