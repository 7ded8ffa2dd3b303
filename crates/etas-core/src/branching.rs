//! One realization of the branching process.
//!
//! Generation 0 holds the background events and, when simulating a
//! continuation, the real auxiliary events. Each further generation is
//! produced by the aftershock generator from the previous generation's
//! sources, until a generation has no offspring left to produce.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use etas_kernels::{
    AreaMetric, MagnitudeSampler, Region, SpatialKernel, TemporalKernel, TimeSampling,
    branching_ratio,
};
use etas_types::{Catalog, CatalogEvent, EtasParameters, Event, EventId, TimeWindow};

use crate::aftershock::AftershockGenerator;
use crate::background::{BackgroundDensity, BackgroundGenerator};
use crate::error::SimulationError;
use crate::offspring::assign_offspring;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Default cap on the number of aftershock generations.
const fn default_max_generations() -> u32 {
    100
}

/// Default cap on the number of events in one realization.
const fn default_max_events() -> u32 {
    1_000_000
}

/// Default cap on background rejection rounds.
const fn default_max_rejection_rounds() -> u32 {
    1_000
}

/// Default candidate surplus of each background rejection round.
const fn default_oversampling() -> f64 {
    1.2
}

/// Safety caps on the iterative parts of a realization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationLimits {
    /// Maximum number of aftershock generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,
    /// Maximum number of events one realization may hold, counting the
    /// offspring of the generation about to be expanded.
    #[serde(default = "default_max_events")]
    pub max_events: u32,
    /// Maximum number of background rejection rounds.
    #[serde(default = "default_max_rejection_rounds")]
    pub max_rejection_rounds: u32,
    /// Candidate surplus factor of each rejection round.
    #[serde(default = "default_oversampling")]
    pub oversampling: f64,
}

impl Default for SimulationLimits {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
            max_events: default_max_events(),
            max_rejection_rounds: default_max_rejection_rounds(),
            oversampling: default_oversampling(),
        }
    }
}

// ---------------------------------------------------------------------------
// Auxiliary events
// ---------------------------------------------------------------------------

/// A real event that seeds generation 0 of a continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryEvent {
    /// The observed event.
    pub origin: CatalogEvent,
    /// Productivity correction from the inversion.
    pub xi_plus_1: f64,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Everything one realization needs; shared read-only across realizations.
pub struct CatalogSimulator<'a> {
    /// Fitted coefficients.
    pub theta: &'a EtasParameters,
    /// Target polygon.
    pub region: &'a Region,
    /// How the polygon area is measured.
    pub area_metric: AreaMetric,
    /// Auxiliary start, primary start and end of the simulation.
    pub window: TimeWindow,
    /// Reference magnitude of the kernels.
    pub mc: f64,
    /// Magnitude bin width.
    pub delta_m: f64,
    /// Magnitude sampler for background events.
    pub magnitudes: &'a dyn MagnitudeSampler,
    /// Magnitude sampler for aftershocks.
    pub aftershock_magnitudes: &'a dyn MagnitudeSampler,
    /// Optional empirical background density.
    pub density: Option<&'a BackgroundDensity>,
    /// Real events of the auxiliary period; empty for unconditional runs.
    pub auxiliary: &'a [AuxiliaryEvent],
    /// Exact or approximate delay sampling.
    pub time_sampling: TimeSampling,
    /// Iteration caps.
    pub limits: SimulationLimits,
    /// Drop reported events outside the polygon.
    pub filter_polygon: bool,
}

impl CatalogSimulator<'_> {
    /// Expected number of direct aftershocks per event, averaged over magnitudes.
    pub fn branching_ratio(&self, beta: f64) -> f64 {
        branching_ratio(self.theta, beta)
    }

    /// Simulate one catalog of the primary period.
    pub fn run<R: Rng>(&self, rng: &mut R) -> Result<Catalog, SimulationError> {
        let temporal = TemporalKernel::from_params(self.theta)?;
        let spatial = SpatialKernel::from_params(self.theta)?;

        let auxiliary = self.auxiliary_events(rng)?;
        let sim_start = if auxiliary.is_empty() {
            self.window.auxiliary_start
        } else {
            self.window.primary_start
        };
        let first_background_id = EventId::new(auxiliary.len() as u64).next();

        let background = BackgroundGenerator {
            theta: self.theta,
            region: self.region,
            area_metric: self.area_metric,
            start: sim_start,
            end: self.window.end,
            mc: self.mc,
            delta_m: self.delta_m,
            magnitudes: self.magnitudes,
            density: self.density,
            oversampling: self.limits.oversampling,
            max_rounds: self.limits.max_rejection_rounds,
        }
        .generate(first_background_id, rng)?;
        debug!(
            background = background.len(),
            auxiliary = auxiliary.len(),
            "generation 0 seeded"
        );

        let mut catalog = Catalog::from_events(auxiliary);
        catalog.extend(background);

        let aftershocks = AftershockGenerator {
            theta: self.theta,
            temporal,
            spatial,
            time_sampling: self.time_sampling,
            magnitudes: self.aftershock_magnitudes,
            mc: self.mc,
            delta_m: self.delta_m,
            window_end: self.window.end,
            window_length_days: self.window.length_days(),
            cutoff: Some(self.window.primary_start),
            region: None,
        };

        let mut generation = 0_u32;
        loop {
            let sources = catalog.sources(generation);
            debug!(generation, sources = sources.len(), "expanding generation");
            if sources.is_empty() {
                break;
            }
            if generation >= self.limits.max_generations {
                return Err(SimulationError::BoundsExceeded {
                    what: "aftershock generations",
                    limit: self.limits.max_generations,
                });
            }
            let pending = sources
                .iter()
                .map(|s| s.n_aftershocks)
                .fold(catalog.len() as u64, u64::saturating_add);
            if pending > u64::from(self.limits.max_events) {
                return Err(SimulationError::BoundsExceeded {
                    what: "catalog events",
                    limit: self.limits.max_events,
                });
            }

            let mut children = aftershocks.generate(&sources, generation, rng)?;
            children.retain(|child| child.time > sim_start);
            let mut id = catalog.max_id().next();
            for child in &mut children {
                child.id = id;
                id = id.next();
            }
            generation = generation.saturating_add(1);
            debug!(
                generation,
                events = children.len(),
                offspring = children.iter().map(|c| c.n_aftershocks).sum::<u64>(),
                "generation added"
            );
            catalog.extend(children);
        }

        let primary_start = self.window.primary_start;
        catalog.retain(|event| event.time > primary_start);
        if self.filter_polygon {
            catalog.retain(|event| self.region.contains(event.latitude, event.longitude));
        }
        Ok(catalog)
    }

    /// Auxiliary events as generation 0, numbered `1..=k` by time.
    fn auxiliary_events<R: Rng>(&self, rng: &mut R) -> Result<Vec<Event>, SimulationError> {
        let mut sorted: Vec<&AuxiliaryEvent> = self.auxiliary.iter().collect();
        sorted.sort_by_key(|aux| aux.origin.time);

        let mut id = EventId::new(1);
        let mut events = Vec::with_capacity(sorted.len());
        for aux in sorted {
            events.push(Event {
                id,
                time: aux.origin.time,
                latitude: aux.origin.latitude,
                longitude: aux.origin.longitude,
                magnitude: aux.origin.magnitude,
                generation: 0,
                parent: EventId::NONE,
                gen_0_parent: id,
                is_background: false,
                xi_plus_1: aux.xi_plus_1,
                expected_n_aftershocks: 0.0,
                n_aftershocks: 0,
                origin_id: Some(aux.origin.id),
            });
            id = id.next();
        }
        assign_offspring(&mut events, self.theta, self.mc - self.delta_m / 2.0, rng)?;
        Ok(events)
    }
}
