//! Background event generation.
//!
//! Background events form a homogeneous Poisson process in time. Their
//! number is Poisson with mean `μ · area · window_days`. Locations are
//! either uniform over the target polygon (rejection sampling in the
//! bounding rectangle) or drawn from an empirical density built from the
//! observed events the inversion classified as likely background.

use chrono::NaiveDateTime;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use etas_kernels::{AreaMetric, MagnitudeSampler, Region};
use etas_types::{EtasParameters, Event, EventId, TargetEvent, from_days, to_days};

use crate::error::SimulationError;
use crate::offspring::{assign_offspring, poisson_count};

// ---------------------------------------------------------------------------
// Empirical density
// ---------------------------------------------------------------------------

/// How resampled background locations are smeared around their seed point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LocationJitter {
    /// Independent Gaussian offsets in latitude and longitude (degrees).
    Gaussian {
        /// Standard deviation in degrees.
        scale: f64,
    },
    /// Uniform offset within a grid cell centred on the seed point.
    GridCell {
        /// Cell height in degrees of latitude.
        lat_size: f64,
        /// Cell width in degrees of longitude.
        lon_size: f64,
    },
}

impl Default for LocationJitter {
    fn default() -> Self {
        Self::Gaussian { scale: 0.1 }
    }
}

/// Candidate background locations with independence weights in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundDensity {
    points: Vec<[f64; 2]>,
    weights: Vec<f64>,
    jitter: LocationJitter,
}

impl BackgroundDensity {
    /// Build from `[latitude, longitude]` points and weights.
    ///
    /// Every weight must lie in `[0, 1]`.
    pub fn new(
        points: Vec<[f64; 2]>,
        weights: Vec<f64>,
        jitter: LocationJitter,
    ) -> Result<Self, SimulationError> {
        if points.len() != weights.len() {
            return Err(SimulationError::InvalidRequest {
                reason: format!("{} points but {} weights", points.len(), weights.len()),
            });
        }
        if let Some(w) = weights.iter().find(|w| !(0.0..=1.0).contains(*w)) {
            return Err(SimulationError::InvalidRequest {
                reason: format!("background weight {w} outside [0, 1]"),
            });
        }
        match jitter {
            LocationJitter::Gaussian { scale } if !(scale.is_finite() && scale >= 0.0) => {
                return Err(SimulationError::InvalidRequest {
                    reason: format!("gaussian scale must be non-negative, got {scale}"),
                });
            }
            LocationJitter::GridCell { lat_size, lon_size }
                if !(lat_size.is_finite() && lat_size > 0.0 && lon_size.is_finite() && lon_size > 0.0) =>
            {
                return Err(SimulationError::InvalidRequest {
                    reason: format!("grid cell must be positive, got {lat_size} x {lon_size}"),
                });
            }
            _ => {}
        }
        Ok(Self {
            points,
            weights,
            jitter,
        })
    }

    /// Density from target events, weighted `P_background · ζ / max ζ`.
    ///
    /// Returns `None` when there are no target events.
    pub fn from_targets(
        targets: &[TargetEvent],
        jitter: LocationJitter,
    ) -> Result<Option<Self>, SimulationError> {
        if targets.is_empty() {
            return Ok(None);
        }
        let max_zeta = targets
            .iter()
            .map(|t| t.zeta_plus_1)
            .fold(f64::NEG_INFINITY, f64::max);
        let points = targets.iter().map(|t| [t.latitude, t.longitude]).collect();
        let weights = targets
            .iter()
            .map(|t| t.p_background * t.zeta_plus_1 / max_zeta)
            .collect();
        Self::new(points, weights, jitter).map(Some)
    }

    /// Number of candidate points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the density has no candidate points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Draw `n` locations: thin by weight, resample survivors, then jitter.
    ///
    /// Returns fewer than `n` points (possibly none) only if thinning
    /// removes every candidate.
    pub fn sample_locations<R: Rng>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<[f64; 2]>, SimulationError> {
        let survivors: Vec<[f64; 2]> = self
            .points
            .iter()
            .zip(&self.weights)
            .filter(|&(_, w)| *w >= rng.random::<f64>())
            .map(|(p, _)| *p)
            .collect();
        if survivors.is_empty() {
            return Ok(Vec::new());
        }

        let normal = match self.jitter {
            LocationJitter::Gaussian { scale } => Some(Normal::new(0.0, scale).map_err(|e| {
                SimulationError::InvalidRequest {
                    reason: format!("invalid gaussian scale {scale}: {e}"),
                }
            })?),
            LocationJitter::GridCell { .. } => None,
        };

        let mut locations = Vec::with_capacity(n);
        for _ in 0..n {
            let Some(&[lat, lon]) = survivors.get(rng.random_range(0..survivors.len())) else {
                continue;
            };
            let (d_lat, d_lon) = match (self.jitter, &normal) {
                (LocationJitter::GridCell { lat_size, lon_size }, _) => (
                    rng.random::<f64>() * lat_size - lat_size / 2.0,
                    rng.random::<f64>() * lon_size - lon_size / 2.0,
                ),
                (LocationJitter::Gaussian { .. }, Some(normal)) => {
                    (normal.sample(rng), normal.sample(rng))
                }
                (LocationJitter::Gaussian { .. }, None) => (0.0, 0.0),
            };
            locations.push([lat + d_lat, lon + d_lon]);
        }
        Ok(locations)
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Inputs of one background draw.
pub struct BackgroundGenerator<'a> {
    /// Fitted coefficients.
    pub theta: &'a EtasParameters,
    /// Target polygon.
    pub region: &'a Region,
    /// How the polygon area is measured.
    pub area_metric: AreaMetric,
    /// Start of the background period.
    pub start: NaiveDateTime,
    /// End of the background period.
    pub end: NaiveDateTime,
    /// Reference magnitude of the productivity law.
    pub mc: f64,
    /// Magnitude bin width; magnitudes are drawn above `mc − delta_m/2`.
    pub delta_m: f64,
    /// Magnitude sampler for background events.
    pub magnitudes: &'a dyn MagnitudeSampler,
    /// Optional empirical location density.
    pub density: Option<&'a BackgroundDensity>,
    /// Candidate surplus factor of each rejection round.
    pub oversampling: f64,
    /// Maximum number of rejection rounds.
    pub max_rounds: u32,
}

impl BackgroundGenerator<'_> {
    /// Expected number of background events in the window.
    pub fn expected_count(&self) -> f64 {
        self.theta.mu()
            * self.region.area(self.area_metric)
            * to_days(self.end.signed_duration_since(self.start))
    }

    /// Draw the background catalog, numbered `first_id, first_id + 1, …` by time.
    pub fn generate<R: Rng>(&self, first_id: EventId, rng: &mut R) -> Result<Vec<Event>, SimulationError> {
        let expected = self.expected_count();
        let n = usize::try_from(poisson_count(expected, rng)?).map_err(|e| {
            SimulationError::InvalidRequest {
                reason: format!("background count with mean {expected}: {e}"),
            }
        })?;
        debug!(expected, n, "background events needed");
        if n == 0 {
            return Ok(Vec::new());
        }

        let locations = self.locations(n, rng)?;
        let length = to_days(self.end.signed_duration_since(self.start));
        let mut times = Vec::with_capacity(n);
        for _ in 0..n {
            let offset = from_days(rng.random::<f64>() * length).ok_or_else(|| {
                SimulationError::InvalidRequest {
                    reason: format!("background window of {length} days is not representable"),
                }
            })?;
            times.push(self.start + offset);
        }
        let magnitudes = self
            .magnitudes
            .sample(n, self.mc - self.delta_m / 2.0, rng);

        let mut events: Vec<Event> = locations
            .into_iter()
            .zip(times)
            .zip(magnitudes)
            .map(|(([latitude, longitude], time), magnitude)| Event {
                id: EventId::NONE,
                time,
                latitude,
                longitude,
                magnitude,
                generation: 0,
                parent: EventId::NONE,
                gen_0_parent: EventId::NONE,
                is_background: true,
                xi_plus_1: 1.0,
                expected_n_aftershocks: 0.0,
                n_aftershocks: 0,
                origin_id: None,
            })
            .collect();
        events.sort_by_key(|e| e.time);

        let mut id = first_id;
        for event in &mut events {
            event.id = id;
            event.gen_0_parent = id;
            id = id.next();
        }
        assign_offspring(&mut events, self.theta, self.mc - self.delta_m / 2.0, rng)?;
        Ok(events)
    }

    /// Exactly `n` locations inside the polygon.
    fn locations<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Vec<[f64; 2]>, SimulationError> {
        let bounds = self.region.bounds();
        let area = self.region.area(self.area_metric);
        let rect_area = bounds.to_region()?.area(self.area_metric);
        let ratio = if area > 0.0 { rect_area / area } else { 1.0 };
        let n_generate = ((n as f64) * ratio * self.oversampling).round().max(1.0) as usize;

        for round in 0..self.max_rounds {
            if round > 0 {
                warn!(round, n, n_generate, "not enough background events inside region, retrying");
            }
            let candidates = match self.density {
                Some(density) => density.sample_locations(n_generate, rng)?,
                None => (0..n_generate)
                    .map(|_| {
                        [
                            uniform(rng, bounds.min_lat, bounds.max_lat),
                            uniform(rng, bounds.min_lon, bounds.max_lon),
                        ]
                    })
                    .collect(),
            };
            let inside: Vec<[f64; 2]> = candidates
                .into_iter()
                .filter(|&[lat, lon]| self.region.contains(lat, lon))
                .take(n)
                .collect();
            if inside.len() == n {
                return Ok(inside);
            }
        }
        Err(SimulationError::BoundsExceeded {
            what: "background rejection rounds",
            limit: self.max_rounds,
        })
    }
}

/// Uniform draw in `[low, high)`, or `low` for an empty interval.
fn uniform<R: Rng>(rng: &mut R, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.random::<f64>()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use etas_kernels::GutenbergRichter;

    use super::*;

    fn theta(log10_mu: f64) -> EtasParameters {
        EtasParameters {
            log10_mu,
            log10_k0: -2.5,
            a: 1.8,
            log10_c: -2.5,
            omega: -0.02,
            log10_tau: 3.5,
            log10_d: -0.8,
            gamma: 1.2,
            rho: 0.6,
        }
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn triangle() -> Region {
        Region::new(vec![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0]]).unwrap()
    }

    #[test]
    fn background_events_fill_the_region() {
        let theta = theta(0.0);
        let region = triangle();
        let gr = GutenbergRichter::new(core::f64::consts::LN_10).unwrap();
        let generator = BackgroundGenerator {
            theta: &theta,
            region: &region,
            area_metric: AreaMetric::Planar,
            start: day(1),
            end: day(21),
            mc: 2.0,
            delta_m: 0.1,
            magnitudes: &gr,
            density: None,
            oversampling: 1.2,
            max_rounds: 100,
        };
        assert!((generator.expected_count() - 40.0).abs() < 1e-9);

        let mut rng = StdRng::seed_from_u64(5);
        let events = generator.generate(EventId::new(11), &mut rng).unwrap();
        assert!(!events.is_empty());
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.id, EventId::new(11 + i as u64));
            assert_eq!(event.gen_0_parent, event.id);
            assert_eq!(event.parent, EventId::NONE);
            assert!(event.is_background);
            assert!(region.contains(event.latitude, event.longitude));
            assert!(event.time >= day(1) && event.time < day(21));
            assert!(event.magnitude >= 1.95);
        }
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn zero_rate_gives_no_events() {
        let theta = theta(f64::NEG_INFINITY);
        let region = triangle();
        let gr = GutenbergRichter::new(2.0).unwrap();
        let generator = BackgroundGenerator {
            theta: &theta,
            region: &region,
            area_metric: AreaMetric::Geodesic,
            start: day(1),
            end: day(2),
            mc: 2.0,
            delta_m: 0.0,
            magnitudes: &gr,
            density: None,
            oversampling: 1.2,
            max_rounds: 10,
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generator.generate(EventId::new(1), &mut rng).unwrap().is_empty());
    }

    #[test]
    fn density_rejects_weights_above_one() {
        let result = BackgroundDensity::new(vec![[0.0, 0.0]], vec![1.5], LocationJitter::default());
        assert!(matches!(result, Err(SimulationError::InvalidRequest { .. })));
    }

    #[test]
    fn density_weights_scale_by_max_zeta() {
        let target = |p, zeta| TargetEvent {
            latitude: 0.5,
            longitude: 0.5,
            time: day(1),
            magnitude: 2.0,
            p_background: p,
            zeta_plus_1: zeta,
        };
        let density = BackgroundDensity::from_targets(
            &[target(0.5, 2.0), target(1.0, 4.0)],
            LocationJitter::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(density.weights, vec![0.25, 1.0]);
        assert!(BackgroundDensity::from_targets(&[], LocationJitter::default()).unwrap().is_none());
    }

    #[test]
    fn grid_jitter_stays_within_cell() {
        let density = BackgroundDensity::new(
            vec![[1.0, 1.0]],
            vec![1.0],
            LocationJitter::GridCell {
                lat_size: 0.1,
                lon_size: 0.2,
            },
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let points = density.sample_locations(200, &mut rng).unwrap();
        assert_eq!(points.len(), 200);
        assert!(
            points
                .iter()
                .all(|[lat, lon]| (lat - 1.0).abs() <= 0.05 + 1e-9 && (lon - 1.0).abs() <= 0.1 + 1e-9)
        );
    }

    #[test]
    fn density_locations_stay_inside_region() {
        let theta = theta(0.0);
        let region = triangle();
        let density = BackgroundDensity::new(
            vec![[0.3, 0.3], [1.6, 0.2]],
            vec![1.0, 1.0],
            LocationJitter::Gaussian { scale: 0.05 },
        )
        .unwrap();
        let gr = GutenbergRichter::new(2.0).unwrap();
        let generator = BackgroundGenerator {
            theta: &theta,
            region: &region,
            area_metric: AreaMetric::Planar,
            start: day(1),
            end: day(3),
            mc: 2.0,
            delta_m: 0.0,
            magnitudes: &gr,
            density: Some(&density),
            oversampling: 1.2,
            max_rounds: 1000,
        };
        let mut rng = StdRng::seed_from_u64(21);
        let events = generator.generate(EventId::new(1), &mut rng).unwrap();
        assert!(events.iter().all(|e| region.contains(e.latitude, e.longitude)));
    }
}
