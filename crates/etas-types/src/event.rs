//! Simulated and real earthquake events.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ids::{EventId, RealizationId};

/// One earthquake occurrence inside a single realization.
///
/// Background events and real auxiliary events form generation 0. Every
/// other event is an aftershock whose `parent` belongs to the previous
/// generation and occurred strictly earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Catalog-local identifier, unique within the realization.
    pub id: EventId,
    /// Origin time.
    pub time: NaiveDateTime,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Magnitude (unrounded while simulating).
    pub magnitude: f64,
    /// Branching depth; 0 for background and real events.
    pub generation: u32,
    /// Triggering event, or [`EventId::NONE`] for generation 0.
    pub parent: EventId,
    /// Generation-0 ancestor of the cascade this event belongs to.
    pub gen_0_parent: EventId,
    /// Whether the event was drawn from the background process.
    pub is_background: bool,
    /// Productivity inflation factor ξ+1 (1 unless supplied by the inversion).
    pub xi_plus_1: f64,
    /// Expected number of direct aftershocks.
    pub expected_n_aftershocks: f64,
    /// Realized number of direct aftershocks (Poisson draw).
    pub n_aftershocks: u64,
    /// Identifier in the originating real catalog, for auxiliary events.
    #[serde(default)]
    pub origin_id: Option<u64>,
}

impl Event {
    /// Whether this event still has to be expanded into aftershocks.
    pub const fn is_source(&self) -> bool {
        self.n_aftershocks > 0
    }
}

/// An event tagged with the realization it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedEvent {
    /// Realization (catalog) the event was simulated in.
    pub catalog_id: RealizationId,
    /// The event itself.
    pub event: Event,
}

/// One row of the real earthquake catalog the inversion was run on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEvent {
    /// Identifier of the event in the real catalog.
    pub id: u64,
    /// Origin time.
    pub time: NaiveDateTime,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Magnitude.
    pub magnitude: f64,
}

/// A real event selected by the inversion as a potential aftershock source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Identifier of the event in the real catalog.
    pub id: u64,
    /// Productivity inflation factor ξ+1.
    #[serde(default = "default_inflation")]
    pub xi_plus_1: f64,
}

/// A real event from the primary period with its background probability.
///
/// Target events define the empirical background density used to place
/// background events near observed seismicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEvent {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Origin time.
    pub time: NaiveDateTime,
    /// Magnitude.
    pub magnitude: f64,
    /// Probability that the event is a background event.
    pub p_background: f64,
    /// Observation factor ζ+1 compensating for local incompleteness.
    #[serde(default = "default_inflation")]
    pub zeta_plus_1: f64,
}

const fn default_inflation() -> f64 {
    1.0
}
