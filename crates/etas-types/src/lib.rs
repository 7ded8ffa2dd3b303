//! Shared type definitions for the ETAS catalog simulator.
//!
//! Every crate in the workspace speaks in these types: the kernels produce
//! raw numbers, the core assembles them into [`Event`]s and [`Catalog`]s,
//! and the CLI writes them out.
//!
//! # Modules
//!
//! - [`ids`] -- Catalog-local event and realization identifiers
//! - [`params`] -- The fitted ETAS parameter set θ
//! - [`event`] -- Simulated events and real catalog rows
//! - [`catalog`] -- Append-only event collection of one realization
//! - [`window`] -- Simulation time window and day arithmetic
//! - [`output`] -- Output format and info-column enumerations

pub mod catalog;
pub mod event;
pub mod ids;
pub mod output;
pub mod params;
pub mod window;

pub use catalog::Catalog;
pub use event::{CatalogEvent, Event, SimulatedEvent, SourceEvent, TargetEvent};
pub use ids::{EventId, RealizationId};
pub use output::{InfoColumn, OutputFormat, UnknownInfoColumn};
pub use params::EtasParameters;
pub use window::{TimeWindow, from_days, to_days};
