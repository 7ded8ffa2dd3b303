//! Offspring counts for freshly created events.

use rand::Rng;
use rand_distr::{Distribution, Poisson};

use etas_kernels::expected_aftershocks;
use etas_types::{EtasParameters, Event};

use crate::error::SimulationError;

/// Draw a Poisson count with mean `lambda`; non-positive means give 0.
pub fn poisson_count<R: Rng>(lambda: f64, rng: &mut R) -> Result<u64, SimulationError> {
    if lambda <= 0.0 {
        return Ok(0);
    }
    let poisson = Poisson::new(lambda).map_err(|e| SimulationError::InvalidRequest {
        reason: format!("cannot draw Poisson count with mean {lambda}: {e}"),
    })?;
    Ok(poisson.sample(rng) as u64)
}

/// Set expected and realized offspring counts of `events` in place.
///
/// The expected count follows the productivity law at reference magnitude
/// `mc`, scaled by each event's `xi_plus_1`.
pub fn assign_offspring<R: Rng>(
    events: &mut [Event],
    theta: &EtasParameters,
    mc: f64,
    rng: &mut R,
) -> Result<(), SimulationError> {
    for event in events {
        event.expected_n_aftershocks =
            expected_aftershocks(event.magnitude, theta, mc) * event.xi_plus_1;
        event.n_aftershocks = poisson_count(event.expected_n_aftershocks, rng)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn zero_mean_gives_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(poisson_count(0.0, &mut rng).unwrap(), 0);
        assert_eq!(poisson_count(-3.0, &mut rng).unwrap(), 0);
    }

    #[test]
    fn mean_is_respected() {
        let mut rng = StdRng::seed_from_u64(2);
        let total: u64 = (0..5_000).map(|_| poisson_count(2.5, &mut rng).unwrap()).sum();
        let mean = total as f64 / 5_000.0;
        assert!((mean - 2.5).abs() < 0.1);
    }

    #[test]
    fn nan_mean_is_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(poisson_count(f64::NAN, &mut rng).is_err());
    }
}
