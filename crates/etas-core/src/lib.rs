//! Catalog generation and orchestration for ETAS simulations.
//!
//! This crate turns fitted ETAS parameters into synthetic earthquake
//! catalogs: it draws background events, expands them generation by
//! generation into aftershock cascades, and streams many independent
//! realizations to memory, CSV files or gridded rate tables.
//!
//! # Modules
//!
//! - [`config`] -- Parameter files (JSON or YAML) and catalog table paths,
//!   resolved into validated [`SimulationParameters`].
//! - [`table`] -- Minimal CSV reader for catalog, source, target and grid tables.
//! - [`rng`] -- Per-realization seeded random streams.
//! - [`offspring`] -- Poisson offspring counts from the productivity law.
//! - [`background`] -- Background events, uniform or from an empirical density.
//! - [`aftershock`] -- One generation of aftershocks.
//! - [`branching`] -- One full realization of the branching process.
//! - [`simulation`] -- [`EtasSimulation`]: prepare once, stream chunks.
//! - [`output`] -- Chunked CSV writer (plain and csep layouts).
//! - [`grid`] -- Gridded expected rates and the `.dat` format.
//! - [`error`] -- [`SimulationError`].
//!
//! [`SimulationParameters`]: config::SimulationParameters
//! [`EtasSimulation`]: simulation::EtasSimulation
//! [`SimulationError`]: error::SimulationError

pub mod aftershock;
pub mod background;
pub mod branching;
pub mod config;
pub mod error;
pub mod grid;
pub mod offspring;
pub mod output;
pub mod rng;
pub mod simulation;
pub mod table;

pub use background::{BackgroundDensity, LocationJitter};
pub use branching::{AuxiliaryEvent, CatalogSimulator, SimulationLimits};
pub use config::{ConfigError, ParameterFile, SimulationParameters};
pub use error::SimulationError;
pub use grid::{GridSpec, GriddedRates, MagnitudeBins};
pub use output::ChunkWriter;
pub use simulation::{CatalogChunk, CatalogChunks, EtasSimulation, SimulationOptions, SimulationRequest};
