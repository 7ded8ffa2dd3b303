//! Simulation orchestrator.
//!
//! [`EtasSimulation`] owns the loaded parameters, reconciles the real
//! catalog inputs in [`EtasSimulation::prepare`], and then streams any
//! number of independent realizations as bounded [`CatalogChunk`]s. Each
//! realization draws from its own seeded generator, so chunking never
//! changes the simulated catalogs.

use std::collections::HashMap;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use etas_kernels::{GutenbergRichter, MagnitudeSampler, Region, TimeSampling};
use etas_types::{
    CatalogEvent, Event, InfoColumn, OutputFormat, RealizationId, SimulatedEvent, TargetEvent,
    TimeWindow, from_days,
};

use crate::background::{BackgroundDensity, LocationJitter};
use crate::branching::{AuxiliaryEvent, CatalogSimulator, SimulationLimits};
use crate::config::SimulationParameters;
use crate::error::SimulationError;
use crate::grid::{GridSpec, GriddedRates, MagnitudeBins};
use crate::output::ChunkWriter;
use crate::rng::{entropy_seed, realization_rng};

/// Relative tolerance between the smallest source magnitude and `m_ref`.
const M_REF_RTOL: f64 = 1e-7;

// ---------------------------------------------------------------------------
// Options and requests
// ---------------------------------------------------------------------------

/// Runtime knobs that are not part of the fitted model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOptions {
    /// Smearing of resampled background locations.
    #[serde(default)]
    pub location_jitter: LocationJitter,
    /// Exact or approximate aftershock delays.
    #[serde(default)]
    pub time_sampling: TimeSampling,
    /// Iteration caps.
    #[serde(default)]
    pub limits: SimulationLimits,
}

/// One call to [`EtasSimulation::simulate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Number of independent catalogs.
    pub n_realizations: u32,
    /// Forecast length in days; only used when the parameters set no end.
    pub forecast_days: Option<f64>,
    /// Reporting threshold; defaults to `m_ref`.
    pub m_threshold: Option<f64>,
    /// Realizations per emitted chunk.
    pub chunk_size: u32,
    /// Extra columns of plain output.
    pub info_columns: Vec<InfoColumn>,
    /// Master seed; drawn from entropy (and logged) when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationRequest {
    fn default() -> Self {
        Self {
            n_realizations: 1,
            forecast_days: None,
            m_threshold: None,
            chunk_size: 100,
            info_columns: vec![InfoColumn::IsBackground],
            seed: None,
        }
    }
}

/// Simulated events of consecutive realizations.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogChunk {
    /// Id of the first realization in the chunk.
    pub first_realization: RealizationId,
    /// Number of realizations in the chunk.
    pub n_realizations: u32,
    /// Reported events, realization by realization.
    pub events: Vec<SimulatedEvent>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Real-catalog inputs reconciled by `prepare`.
struct Prepared {
    auxiliary: Vec<AuxiliaryEvent>,
    density: Option<BackgroundDensity>,
}

/// Loads parameters once and simulates catalogs from them.
pub struct EtasSimulation {
    run_id: Uuid,
    parameters: SimulationParameters,
    options: SimulationOptions,
    magnitudes: Box<dyn MagnitudeSampler>,
    aftershock_magnitudes: Box<dyn MagnitudeSampler>,
    prepared: Option<Prepared>,
}

impl EtasSimulation {
    /// Create from in-memory parameters, with Gutenberg–Richter magnitudes.
    pub fn new(
        parameters: SimulationParameters,
        options: SimulationOptions,
    ) -> Result<Self, SimulationError> {
        parameters.validate()?;
        let magnitudes = GutenbergRichter::new(parameters.beta)?;
        let aftershock_magnitudes = GutenbergRichter::new(parameters.aftershock_beta())?;
        let run_id = Uuid::now_v7();
        debug!(
            run_id = %run_id,
            m_ref = parameters.m_ref,
            delta_m = parameters.delta_m,
            vertices = parameters.region.vertices().len(),
            "simulation created"
        );
        Ok(Self {
            run_id,
            parameters,
            options,
            magnitudes: Box::new(magnitudes),
            aftershock_magnitudes: Box::new(aftershock_magnitudes),
            prepared: None,
        })
    }

    /// Create from a JSON or YAML parameter file.
    pub fn from_file(path: &Path, options: SimulationOptions) -> Result<Self, SimulationError> {
        let parameters = SimulationParameters::from_file(path)?;
        info!(path = %path.display(), "parameters loaded");
        Self::new(parameters, options)
    }

    /// Replace the magnitude samplers for background and aftershock events.
    #[must_use]
    pub fn with_magnitude_samplers(
        mut self,
        magnitudes: Box<dyn MagnitudeSampler>,
        aftershock_magnitudes: Box<dyn MagnitudeSampler>,
    ) -> Self {
        self.magnitudes = magnitudes;
        self.aftershock_magnitudes = aftershock_magnitudes;
        self
    }

    /// Identifier attached to every log line of this simulation.
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The loaded parameters.
    pub const fn parameters(&self) -> &SimulationParameters {
        &self.parameters
    }

    /// Whether [`Self::prepare`] has succeeded.
    pub const fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Reconcile source events with the catalog and build the background density.
    pub fn prepare(&mut self) -> Result<(), SimulationError> {
        let params = &self.parameters;
        let auxiliary = merge_sources(params)?;

        let m_min = params.m_ref - params.delta_m / 2.0;
        let targets: Vec<TargetEvent> = params
            .target_events
            .iter()
            .filter(|t| t.magnitude >= m_min && params.region.contains(t.latitude, t.longitude))
            .cloned()
            .collect();
        let density = BackgroundDensity::from_targets(&targets, self.options.location_jitter)?;

        let ratio = etas_kernels::branching_ratio(&params.theta, params.aftershock_beta());
        if ratio >= 1.0 {
            warn!(run_id = %self.run_id, branching_ratio = ratio, "parameters are supercritical");
        }
        info!(
            run_id = %self.run_id,
            sources = auxiliary.len(),
            targets = targets.len(),
            branching_ratio = ratio,
            "simulation prepared"
        );
        self.prepared = Some(Prepared { auxiliary, density });
        Ok(())
    }

    /// Start a lazy stream of catalog chunks.
    pub fn simulate(&self, request: &SimulationRequest) -> Result<CatalogChunks<'_>, SimulationError> {
        let prepared = self.prepared.as_ref().ok_or(SimulationError::NotPrepared)?;
        if request.chunk_size == 0 {
            return Err(SimulationError::InvalidRequest {
                reason: "chunk_size must be at least 1".to_owned(),
            });
        }
        let params = &self.parameters;
        let end = self.end_time(request.forecast_days)?;
        let window = TimeWindow::new(params.auxiliary_start, params.primary_start, end).ok_or_else(|| {
            SimulationError::InvalidRequest {
                reason: format!(
                    "simulation end {end} is not after primary start {}",
                    params.primary_start
                ),
            }
        })?;
        let seed = request.seed.unwrap_or_else(entropy_seed);
        let m_threshold = request.m_threshold.unwrap_or(params.m_ref);

        info!(
            run_id = %self.run_id,
            n_realizations = request.n_realizations,
            seed,
            auxiliary_start = %window.auxiliary_start,
            primary_start = %window.primary_start,
            end = %window.end,
            "simulating catalogs"
        );

        let simulator = CatalogSimulator {
            theta: &params.theta,
            region: &params.region,
            area_metric: params.area_metric,
            window,
            mc: params.m_ref - params.delta_m / 2.0,
            delta_m: 0.0,
            magnitudes: self.magnitudes.as_ref(),
            aftershock_magnitudes: self.aftershock_magnitudes.as_ref(),
            density: prepared.density.as_ref(),
            auxiliary: &prepared.auxiliary,
            time_sampling: self.options.time_sampling,
            limits: self.options.limits,
            filter_polygon: false,
        };
        let filter = ChunkFilter {
            window,
            magnitude_cut: m_threshold - params.delta_m / 2.0,
            region: &params.region,
            decimals: magnitude_decimals(params.delta_m),
        };
        Ok(CatalogChunks {
            run_id: self.run_id,
            simulator,
            filter,
            seed,
            n_realizations: request.n_realizations,
            chunk_size: request.chunk_size,
            next_realization: 0,
            failed: false,
        })
    }

    /// Simulate every chunk into memory.
    pub fn simulate_to_vec(&self, request: &SimulationRequest) -> Result<Vec<SimulatedEvent>, SimulationError> {
        let mut events = Vec::new();
        for chunk in self.simulate(request)? {
            events.extend(chunk?.events);
        }
        Ok(events)
    }

    /// Stream every chunk into a CSV file; returns the number of event rows.
    pub fn simulate_to_csv(
        &self,
        path: &Path,
        request: &SimulationRequest,
        format: OutputFormat,
    ) -> Result<usize, SimulationError> {
        let mut writer = self.writer(path, request, format);
        let mut wrote_any = false;
        for chunk in self.simulate(request)? {
            writer.write_chunk(&chunk?.events)?;
            wrote_any = true;
        }
        if !wrote_any {
            writer.write_chunk(&[])?;
        }
        info!(
            run_id = %self.run_id,
            path = %path.display(),
            rows = writer.rows_written(),
            "catalogs written"
        );
        Ok(writer.rows_written())
    }

    /// Stream csep-formatted catalogs to `path` and write the gridded
    /// expected rates next to it with a `.dat` extension.
    ///
    /// Returns the path of the rate file.
    pub fn simulate_to_dat(
        &self,
        path: &Path,
        request: &SimulationRequest,
        grid: &GridSpec,
    ) -> Result<PathBuf, SimulationError> {
        let params = &self.parameters;
        let mut writer = self.writer(path, request, OutputFormat::Csep);
        let mut rates = GriddedRates::new(grid, MagnitudeBins::new(params.m_ref, params.delta_m));
        let mut wrote_any = false;
        for chunk in self.simulate(request)? {
            let chunk = chunk?;
            writer.write_chunk(&chunk.events)?;
            for row in &chunk.events {
                rates.add(row.event.latitude, row.event.longitude, row.event.magnitude);
            }
            wrote_any = true;
        }
        if !wrote_any {
            writer.write_chunk(&[])?;
        }

        let dat_path = path.with_extension("dat");
        rates.write_dat(&dat_path, request.n_realizations)?;
        info!(
            run_id = %self.run_id,
            path = %dat_path.display(),
            cells = grid.len(),
            gridded_events = rates.total(),
            "gridded rates written"
        );
        Ok(dat_path)
    }

    fn writer(&self, path: &Path, request: &SimulationRequest, format: OutputFormat) -> ChunkWriter {
        ChunkWriter::new(
            path,
            format,
            request.info_columns.clone(),
            request.n_realizations,
            magnitude_decimals(self.parameters.delta_m) as usize,
        )
    }

    /// Parameter end time, else `primary_start + forecast_days`.
    fn end_time(&self, forecast_days: Option<f64>) -> Result<chrono::NaiveDateTime, SimulationError> {
        let params = &self.parameters;
        if let Some(end) = params.end {
            return Ok(end);
        }
        let days = forecast_days.ok_or_else(|| SimulationError::InvalidRequest {
            reason: "parameters set no end and no forecast length was given".to_owned(),
        })?;
        from_days(days)
            .and_then(|delta| params.primary_start.checked_add_signed(delta))
            .ok_or_else(|| SimulationError::InvalidRequest {
                reason: format!("forecast length of {days} days is not representable"),
            })
    }
}

/// Join source events to their catalog rows by id.
fn merge_sources(params: &SimulationParameters) -> Result<Vec<AuxiliaryEvent>, SimulationError> {
    if params.source_events.is_empty() {
        return Ok(Vec::new());
    }
    let mut rows: HashMap<u64, Vec<&CatalogEvent>> = HashMap::with_capacity(params.catalog.len());
    for row in &params.catalog {
        rows.entry(row.id).or_default().push(row);
    }

    let mut auxiliary = Vec::with_capacity(params.source_events.len());
    for source in &params.source_events {
        match rows.get(&source.id).map(Vec::as_slice) {
            Some([row]) => auxiliary.push(AuxiliaryEvent {
                origin: (*row).clone(),
                xi_plus_1: source.xi_plus_1,
            }),
            Some(matches) if matches.len() > 1 => {
                return Err(SimulationError::Consistency {
                    reason: format!(
                        "source event {} matches {} catalog rows",
                        source.id,
                        matches.len()
                    ),
                });
            }
            _ => {
                return Err(SimulationError::Consistency {
                    reason: format!("source event {} has no catalog row", source.id),
                });
            }
        }
    }

    let min_magnitude = auxiliary
        .iter()
        .map(|a| a.origin.magnitude)
        .fold(f64::INFINITY, f64::min);
    if (min_magnitude - params.m_ref).abs() > M_REF_RTOL * params.m_ref.abs() {
        return Err(SimulationError::Consistency {
            reason: format!(
                "smallest source magnitude is {min_magnitude} but m_ref is {}",
                params.m_ref
            ),
        });
    }
    Ok(auxiliary)
}

// ---------------------------------------------------------------------------
// Chunk stream
// ---------------------------------------------------------------------------

/// Decimal places of magnitudes binned with width `delta_m`.
fn magnitude_decimals(delta_m: f64) -> i32 {
    if delta_m > 0.0 {
        (-delta_m.log10() - 1e-9).ceil().max(0.0) as i32
    } else {
        1
    }
}

/// Round to `decimals` places with ties going up.
pub fn round_half_up(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale + 0.5).floor() / scale
}

/// Reporting filter applied to every chunk.
struct ChunkFilter<'a> {
    window: TimeWindow,
    magnitude_cut: f64,
    region: &'a Region,
    decimals: i32,
}

impl ChunkFilter<'_> {
    fn apply(&self, mut event: Event) -> Option<Event> {
        let keep = self.window.contains_primary(event.time)
            && event.magnitude >= self.magnitude_cut
            && self.region.contains(event.latitude, event.longitude);
        keep.then(|| {
            event.magnitude = round_half_up(event.magnitude, self.decimals);
            event
        })
    }
}

/// Lazy iterator over catalog chunks.
///
/// Yields `Err` at most once; the stream ends after an error.
pub struct CatalogChunks<'a> {
    run_id: Uuid,
    simulator: CatalogSimulator<'a>,
    filter: ChunkFilter<'a>,
    seed: u64,
    n_realizations: u32,
    chunk_size: u32,
    next_realization: u32,
    failed: bool,
}

impl CatalogChunks<'_> {
    /// Master seed of the stream.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Realizations not yet simulated.
    pub const fn remaining(&self) -> u32 {
        if self.failed {
            0
        } else {
            self.n_realizations.saturating_sub(self.next_realization)
        }
    }
}

impl Iterator for CatalogChunks<'_> {
    type Item = Result<CatalogChunk, SimulationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let count = self.chunk_size.min(self.remaining());
        if count == 0 {
            return None;
        }
        let first = self.next_realization;
        let mut events = Vec::new();
        for r in first..first.saturating_add(count) {
            let realization = RealizationId::new(r);
            let mut rng = realization_rng(self.seed, realization);
            match self.simulator.run(&mut rng) {
                Ok(catalog) => events.extend(
                    catalog
                        .into_iter()
                        .filter_map(|event| self.filter.apply(event))
                        .map(|event| SimulatedEvent {
                            catalog_id: realization,
                            event,
                        }),
                ),
                Err(e) => {
                    self.failed = true;
                    warn!(run_id = %self.run_id, realization = r, error = %e, "realization failed");
                    return Some(Err(e));
                }
            }
        }
        self.next_realization = first.saturating_add(count);
        debug!(
            run_id = %self.run_id,
            first_realization = first,
            realizations = count,
            events = events.len(),
            "chunk simulated"
        );
        if self.remaining() == 0 {
            info!(run_id = %self.run_id, n_realizations = self.n_realizations, "simulation finished");
        }
        Some(Ok(CatalogChunk {
            first_realization: RealizationId::new(first),
            n_realizations: count,
            events,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let chunks = self.remaining().div_ceil(self.chunk_size) as usize;
        (0, Some(chunks))
    }
}

impl FusedIterator for CatalogChunks<'_> {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rounding_goes_half_up() {
        assert!((round_half_up(2.25, 1) - 2.3).abs() < 1e-12);
        assert!((round_half_up(2.249, 1) - 2.2).abs() < 1e-12);
        assert!((round_half_up(3.0, 1) - 3.0).abs() < 1e-12);
        assert!((round_half_up(4.125, 2) - 4.13).abs() < 1e-12);
    }

    #[test]
    fn decimals_follow_bin_width() {
        assert_eq!(magnitude_decimals(0.1), 1);
        assert_eq!(magnitude_decimals(0.05), 2);
        assert_eq!(magnitude_decimals(0.01), 2);
        assert_eq!(magnitude_decimals(1.0), 0);
        assert_eq!(magnitude_decimals(0.0), 1);
    }

    #[test]
    fn request_defaults() {
        let request = SimulationRequest::default();
        assert_eq!(request.n_realizations, 1);
        assert_eq!(request.chunk_size, 100);
        assert_eq!(request.info_columns, vec![InfoColumn::IsBackground]);
        assert!(request.seed.is_none());
    }
}
