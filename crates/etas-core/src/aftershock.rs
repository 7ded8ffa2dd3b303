//! Aftershock generation for one generation of sources.
//!
//! Every source event spawns exactly its realized offspring count of
//! candidate aftershocks. Candidates receive a delay from the temporal
//! kernel and an offset from the spatial kernel; those that land outside
//! the time window (or, optionally, the polygon) are discarded before
//! magnitudes and their own offspring counts are drawn.

use chrono::{NaiveDateTime, TimeDelta};
use rand::Rng;
use tracing::trace;

use etas_kernels::{MagnitudeSampler, Region, SpatialKernel, TemporalKernel, TimeSampling, displace};
use etas_types::{EtasParameters, Event, EventId, from_days};

use crate::error::SimulationError;
use crate::offspring::assign_offspring;

/// Smallest delay between an event and its aftershock.
fn min_delay() -> TimeDelta {
    TimeDelta::microseconds(1)
}

/// Fixed inputs of aftershock generation within one realization.
pub struct AftershockGenerator<'a> {
    /// Fitted coefficients.
    pub theta: &'a EtasParameters,
    /// Temporal kernel built from `theta`.
    pub temporal: TemporalKernel,
    /// Spatial kernel built from `theta`.
    pub spatial: SpatialKernel,
    /// Exact or approximate delay sampling.
    pub time_sampling: TimeSampling,
    /// Magnitude sampler for aftershocks.
    pub magnitudes: &'a dyn MagnitudeSampler,
    /// Reference magnitude of the kernels.
    pub mc: f64,
    /// Magnitude bin width; magnitudes are drawn above `mc − delta_m/2`.
    pub delta_m: f64,
    /// Latest admissible aftershock time.
    pub window_end: NaiveDateTime,
    /// Longest admissible delay in days.
    pub window_length_days: f64,
    /// Aftershocks at or before this time are discarded.
    pub cutoff: Option<NaiveDateTime>,
    /// Aftershocks outside this polygon are discarded.
    pub region: Option<&'a Region>,
}

/// A candidate aftershock before magnitudes are drawn.
struct Candidate {
    time: NaiveDateTime,
    latitude: f64,
    longitude: f64,
    parent: EventId,
    gen_0_parent: EventId,
}

impl AftershockGenerator<'_> {
    /// Generate the direct aftershocks of `sources` (all of generation `generation`).
    ///
    /// Returned events carry [`EventId::NONE`]; the caller assigns ids.
    pub fn generate<R: Rng>(
        &self,
        sources: &[Event],
        generation: u32,
        rng: &mut R,
    ) -> Result<Vec<Event>, SimulationError> {
        let total: u64 = sources.iter().map(|s| s.n_aftershocks).sum();
        let total = usize::try_from(total).map_err(|e| SimulationError::InvalidRequest {
            reason: format!("{total} aftershocks in one generation: {e}"),
        })?;
        let delays = self.temporal.sample(total, self.time_sampling, rng)?;

        let parents = sources.iter().flat_map(|source| {
            let count = usize::try_from(source.n_aftershocks).unwrap_or(usize::MAX);
            core::iter::repeat_n(source, count)
        });

        let mut candidates = Vec::with_capacity(total);
        for (parent, delay) in parents.zip(delays) {
            if !(delay <= self.window_length_days) {
                continue;
            }
            let Some(offset) = from_days(delay) else {
                continue;
            };
            let time = parent.time + offset.max(min_delay());
            if time > self.window_end || self.cutoff.is_some_and(|cutoff| time <= cutoff) {
                continue;
            }

            let (radius, azimuth) = self.spatial.sample_offset(parent.magnitude, self.mc, rng);
            let (latitude, longitude) = displace(parent.latitude, parent.longitude, radius, azimuth);
            if self.region.is_some_and(|region| !region.contains(latitude, longitude)) {
                continue;
            }
            candidates.push(Candidate {
                time,
                latitude,
                longitude,
                parent: parent.id,
                gen_0_parent: parent.gen_0_parent,
            });
        }
        trace!(generation, total, kept = candidates.len(), "aftershock candidates filtered");

        let magnitude_floor = self.mc - self.delta_m / 2.0;
        let magnitudes = self.magnitudes.sample(candidates.len(), magnitude_floor, rng);
        let next_generation = generation.saturating_add(1);
        let mut events: Vec<Event> = candidates
            .into_iter()
            .zip(magnitudes)
            .map(|(c, magnitude)| Event {
                id: EventId::NONE,
                time: c.time,
                latitude: c.latitude,
                longitude: c.longitude,
                magnitude,
                generation: next_generation,
                parent: c.parent,
                gen_0_parent: c.gen_0_parent,
                is_background: false,
                xi_plus_1: 1.0,
                expected_n_aftershocks: 0.0,
                n_aftershocks: 0,
                origin_id: None,
            })
            .collect();
        assign_offspring(&mut events, self.theta, magnitude_floor, rng)?;
        Ok(events)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use etas_kernels::GutenbergRichter;

    use super::*;

    fn theta() -> EtasParameters {
        EtasParameters {
            log10_mu: -6.0,
            log10_k0: -2.0,
            a: 1.8,
            log10_c: -2.5,
            omega: -0.02,
            log10_tau: 3.5,
            log10_d: -0.8,
            gamma: 1.2,
            rho: 0.6,
        }
    }

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn source(id: u64, n_aftershocks: u64) -> Event {
        Event {
            id: EventId::new(id),
            time: at(2),
            latitude: 46.0,
            longitude: 8.0,
            magnitude: 4.0,
            generation: 1,
            parent: EventId::new(1),
            gen_0_parent: EventId::new(1),
            is_background: false,
            xi_plus_1: 1.0,
            expected_n_aftershocks: 3.0,
            n_aftershocks,
            origin_id: None,
        }
    }

    fn generator<'a>(
        theta: &'a EtasParameters,
        gr: &'a GutenbergRichter,
        region: Option<&'a Region>,
    ) -> AftershockGenerator<'a> {
        AftershockGenerator {
            theta,
            temporal: TemporalKernel::from_params(theta).unwrap(),
            spatial: SpatialKernel::from_params(theta).unwrap(),
            time_sampling: TimeSampling::Exact,
            magnitudes: gr,
            mc: 2.0,
            delta_m: 0.1,
            window_end: at(30),
            window_length_days: 29.0,
            cutoff: Some(at(1)),
            region,
        }
    }

    #[test]
    fn children_inherit_lineage_and_follow_parents() {
        let theta = theta();
        let gr = GutenbergRichter::new(core::f64::consts::LN_10).unwrap();
        let generator = generator(&theta, &gr, None);
        let sources = vec![source(5, 40), source(6, 25)];
        let mut rng = StdRng::seed_from_u64(17);
        let children = generator.generate(&sources, 1, &mut rng).unwrap();

        assert!(!children.is_empty());
        assert!(children.len() <= 65);
        for child in &children {
            assert_eq!(child.generation, 2);
            assert!(child.parent == EventId::new(5) || child.parent == EventId::new(6));
            assert_eq!(child.gen_0_parent, EventId::new(1));
            assert!(child.time > at(2));
            assert!(child.time <= at(30));
            assert!(child.magnitude >= 1.95);
            assert!(!child.is_background);
            assert_eq!(child.id, EventId::NONE);
        }
    }

    #[test]
    fn polygon_filter_drops_outside_children() {
        let theta = theta();
        let gr = GutenbergRichter::new(core::f64::consts::LN_10).unwrap();
        let region = Region::new(vec![[45.99, 7.99], [46.01, 7.99], [46.01, 8.01], [45.99, 8.01]]).unwrap();
        let generator = generator(&theta, &gr, Some(&region));
        let mut rng = StdRng::seed_from_u64(4);
        let children = generator.generate(&[source(5, 200)], 1, &mut rng).unwrap();
        assert!(children.iter().all(|c| region.contains(c.latitude, c.longitude)));
        assert!(children.len() < 200);
    }

    #[test]
    fn no_offspring_means_no_children() {
        let theta = theta();
        let gr = GutenbergRichter::new(2.0).unwrap();
        let generator = generator(&theta, &gr, None);
        let mut rng = StdRng::seed_from_u64(4);
        assert!(generator.generate(&[source(1, 0)], 0, &mut rng).unwrap().is_empty());
    }
}
