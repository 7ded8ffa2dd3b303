//! Spatial kernel sampling and great-circle helpers.
//!
//! Aftershocks are placed at a distance `r` from their parent drawn from the
//! power-law density `(r² + d·e^{γ(m − mc)})^-(1+ρ)`, in a uniformly random
//! direction. Kilometre offsets are converted to degrees using the lengths
//! of one degree of latitude and longitude at the parent's latitude.

use core::f64::consts::TAU;

use rand::Rng;

use etas_types::EtasParameters;

use crate::error::KernelError;

/// Earth radius in kilometres used for all distance computations.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

/// Great-circle distance in km between two points given in degrees.
pub fn haversine(lat_1: f64, lat_2: f64, lon_1: f64, lon_2: f64) -> f64 {
    let hav = |theta: f64| (theta / 2.0).sin().powi(2);
    let (phi_1, phi_2) = (lat_1.to_radians(), lat_2.to_radians());
    let inner = hav(phi_1 - phi_2)
        + phi_1.cos() * phi_2.cos() * hav(lon_1.to_radians() - lon_2.to_radians());
    2.0 * EARTH_RADIUS_KM * inner.sqrt().asin()
}

/// Length in km of one degree of latitude and of longitude at `latitude`.
pub fn degree_lengths(latitude: f64) -> (f64, f64) {
    let lat_degree = haversine(latitude - 0.5, latitude + 0.5, 0.0, 0.0);
    let lon_degree = haversine(latitude, latitude, 0.0, 1.0);
    (lat_degree, lon_degree)
}

/// Move a point by `radius_km` in direction `azimuth` (radians from north).
pub fn displace(latitude: f64, longitude: f64, radius_km: f64, azimuth: f64) -> (f64, f64) {
    let (lat_degree, lon_degree) = degree_lengths(latitude);
    (
        latitude + radius_km * azimuth.cos() / lat_degree,
        longitude + radius_km * azimuth.sin() / lon_degree,
    )
}

/// The spatial part of the triggering kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialKernel {
    d: f64,
    gamma: f64,
    rho: f64,
}

impl SpatialKernel {
    /// Build from linear parameters. `d` and `rho` must be positive.
    pub fn new(d: f64, gamma: f64, rho: f64) -> Result<Self, KernelError> {
        if !d.is_finite() || !gamma.is_finite() || !rho.is_finite() {
            return Err(KernelError::NonFinite {
                name: "spatial kernel parameter",
            });
        }
        if d <= 0.0 || rho <= 0.0 {
            return Err(KernelError::InvalidParameter {
                name: "d/rho",
                reason: format!("must be positive, got d = {d}, rho = {rho}"),
            });
        }
        Ok(Self { d, gamma, rho })
    }

    /// Build from the model parameter set.
    pub fn from_params(theta: &EtasParameters) -> Result<Self, KernelError> {
        Self::new(theta.d(), theta.gamma, theta.rho)
    }

    /// Magnitude-scaled kernel width `d·e^{γ(m − mc)}` in km².
    pub fn scaled_width(&self, magnitude: f64, mc: f64) -> f64 {
        self.d * (self.gamma * (magnitude - mc)).exp()
    }

    /// Distance in km at which the radial CDF reaches `u ∈ [0, 1)`.
    pub fn radius(&self, magnitude: f64, mc: f64, u: f64) -> f64 {
        let d_g = self.scaled_width(magnitude, mc);
        ((1.0 - u).powf(-1.0 / self.rho) * d_g - d_g).sqrt()
    }

    /// Draw a distance (km) and azimuth (radians) for one aftershock.
    pub fn sample_offset<R: Rng>(&self, magnitude: f64, mc: f64, rng: &mut R) -> (f64, f64) {
        let radius = self.radius(magnitude, mc, rng.random::<f64>());
        let azimuth = rng.random_range(0.0..TAU);
        (radius, azimuth)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn degree_lengths_shrink_towards_pole() {
        let (lat_eq, lon_eq) = degree_lengths(0.0);
        assert!((lat_eq - 111.32).abs() < 0.05);
        assert!((lon_eq - 111.32).abs() < 0.05);
        let (lat_60, lon_60) = degree_lengths(60.0);
        assert!((lat_60 - lat_eq).abs() < 1e-6);
        assert!((lon_60 - lon_eq / 2.0).abs() < 0.05);
    }

    #[test]
    fn displacement_round_trips_distance() {
        let (lat, lon) = displace(46.0, 8.0, 10.0, 0.7);
        let distance = haversine(46.0, lat, 8.0, lon);
        assert!((distance - 10.0).abs() < 0.05);
    }

    #[test]
    fn northward_displacement_keeps_longitude() {
        let (lat, lon) = displace(10.0, 20.0, 50.0, 0.0);
        assert!(lat > 10.0);
        assert!((lon - 20.0).abs() < 1e-12);
    }

    #[test]
    fn radius_grows_with_quantile_and_magnitude() {
        let kernel = SpatialKernel::new(0.3, 1.2, 0.6).ok();
        assert!(kernel.is_some());
        if let Some(kernel) = kernel {
            assert!(kernel.radius(3.0, 2.0, 0.0).abs() < 1e-12);
            assert!(kernel.radius(3.0, 2.0, 0.5) < kernel.radius(3.0, 2.0, 0.9));
            assert!(kernel.radius(3.0, 2.0, 0.5) < kernel.radius(5.0, 2.0, 0.5));
            // Median of the radial law: r² = d_g (2^{1/ρ} − 1).
            let d_g = kernel.scaled_width(3.0, 2.0);
            let median = (d_g * (2_f64.powf(1.0 / 0.6) - 1.0)).sqrt();
            assert!((kernel.radius(3.0, 2.0, 0.5) - median).abs() < 1e-12);
        }
    }

    #[test]
    fn sampled_azimuth_in_range() {
        let kernel = SpatialKernel::new(1.0, 1.0, 0.5).ok();
        let mut rng = StdRng::seed_from_u64(3);
        if let Some(kernel) = kernel {
            for _ in 0..100 {
                let (r, phi) = kernel.sample_offset(2.5, 2.0, &mut rng);
                assert!(r >= 0.0);
                assert!((0.0..TAU).contains(&phi));
            }
        }
    }

    #[test]
    fn rejects_non_positive_width() {
        assert!(SpatialKernel::new(0.0, 1.0, 0.5).is_err());
        assert!(SpatialKernel::new(1.0, 1.0, -0.5).is_err());
    }
}
