//! `etas-simulate`: synthetic earthquake catalogs from fitted ETAS parameters.
//!
//! Loads a parameter file written by the inversion, reconciles its real
//! catalog tables, and streams the requested number of simulated catalogs
//! to a CSV file (plain or csep layout), optionally with gridded rates.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load and validate the parameter file
//! 3. Reconcile source and target events
//! 4. Stream realizations to the output file
//! 5. Log the result

mod error;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use etas_core::{
    EtasSimulation, GridSpec, LocationJitter, SimulationLimits, SimulationOptions,
    SimulationRequest,
};
use etas_kernels::TimeSampling;
use etas_types::{InfoColumn, OutputFormat};

use crate::error::CliError;

/// Output layout selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Plain catalog CSV with optional info columns.
    Plain,
    /// pyCSEP catalog CSV.
    Csep,
    /// pyCSEP catalog CSV plus a gridded `.dat` rate file.
    Dat,
}

#[derive(Parser, Debug)]
#[command(name = "etas-simulate")]
#[command(version, about = "Simulate earthquake catalogs from fitted ETAS parameters")]
struct Args {
    /// Parameter file (JSON, or YAML by extension)
    config: PathBuf,

    /// Output CSV path; defaults to `fn_store` of the parameter file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of catalogs to simulate
    #[arg(short = 'n', long = "realizations", default_value_t = 1)]
    realizations: u32,

    /// Forecast length in days, used when the parameter file sets no end
    #[arg(short = 'd', long = "days")]
    forecast_days: Option<f64>,

    /// Master seed; drawn at random and logged when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Output layout
    #[arg(long, value_enum, default_value_t = Format::Plain)]
    format: Format,

    /// Realizations simulated per written chunk
    #[arg(long, default_value_t = 100)]
    chunk_size: u32,

    /// Smallest reported magnitude; defaults to `m_ref`
    #[arg(long)]
    m_threshold: Option<f64>,

    /// Comma-separated extra columns of plain output
    #[arg(long, value_delimiter = ',', default_value = "is_background")]
    info_columns: Vec<InfoColumn>,

    /// Draw aftershock delays from the closed-form approximation
    #[arg(long)]
    approx_times: bool,

    /// Gaussian smoothing of resampled background locations, in degrees
    #[arg(long, default_value_t = 0.1)]
    gaussian_scale: f64,

    /// Smooth background locations uniformly within cells of this size instead
    #[arg(long)]
    jitter_cell_size: Option<f64>,

    /// Cell size of the `.dat` grid, in degrees
    #[arg(long, default_value_t = 0.1)]
    grid_cell_size: f64,

    /// CSV of lower-left `lon,lat` cell corners for the `.dat` grid
    #[arg(long)]
    grid_origins: Option<PathBuf>,

    /// Cap on aftershock generations per realization
    #[arg(long, default_value_t = SimulationLimits::default().max_generations)]
    max_generations: u32,

    /// Cap on events per realization; supercritical runs fail once exceeded
    #[arg(long, default_value_t = SimulationLimits::default().max_events)]
    max_events: u32,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if loading, preparing or writing the simulation fails.
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!("etas-simulate starting");
    let config = args.config.clone();
    run(args).with_context(|| format!("simulating from {}", config.display()))?;
    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn run(args: Args) -> Result<(), CliError> {
    if args.realizations == 0 || args.chunk_size == 0 {
        return Err(CliError::Arguments {
            reason: "--realizations and --chunk-size must be at least 1".to_owned(),
        });
    }

    let options = SimulationOptions {
        location_jitter: args.jitter_cell_size.map_or(
            LocationJitter::Gaussian {
                scale: args.gaussian_scale,
            },
            |size| LocationJitter::GridCell {
                lat_size: size,
                lon_size: size,
            },
        ),
        time_sampling: if args.approx_times {
            TimeSampling::Approximate
        } else {
            TimeSampling::Exact
        },
        limits: SimulationLimits {
            max_generations: args.max_generations,
            max_events: args.max_events,
            ..SimulationLimits::default()
        },
    };

    let mut simulation = EtasSimulation::from_file(&args.config, options)?;
    let output = args
        .output
        .or_else(|| simulation.parameters().output.clone())
        .ok_or(CliError::MissingOutput)?;
    info!(
        run_id = %simulation.run_id(),
        output = %output.display(),
        realizations = args.realizations,
        format = ?args.format,
        "configuration loaded"
    );

    simulation.prepare()?;

    let request = SimulationRequest {
        n_realizations: args.realizations,
        forecast_days: args.forecast_days,
        m_threshold: args.m_threshold,
        chunk_size: args.chunk_size,
        info_columns: args.info_columns,
        seed: args.seed,
    };

    match args.format {
        Format::Plain | Format::Csep => {
            let layout = if args.format == Format::Csep {
                OutputFormat::Csep
            } else {
                OutputFormat::Plain
            };
            let rows = simulation.simulate_to_csv(&output, &request, layout)?;
            info!(rows, output = %output.display(), "etas-simulate finished");
        }
        Format::Dat => {
            let grid = match &args.grid_origins {
                Some(path) => GridSpec::from_file(path, args.grid_cell_size)?,
                None => GridSpec::covering(&simulation.parameters().region, args.grid_cell_size)?,
            };
            let dat = simulation.simulate_to_dat(&output, &request, &grid)?;
            info!(
                cells = grid.len(),
                catalogs = %output.display(),
                rates = %dat.display(),
                "etas-simulate finished"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_short_flags_and_info_columns() {
        let args = Args::try_parse_from([
            "etas-simulate",
            "params.json",
            "-n",
            "25",
            "-d",
            "30",
            "--format",
            "csep",
            "--info-columns",
            "is_background,generation",
            "--approx-times",
            "--max-events",
            "2000",
        ])
        .ok();
        let args = args.as_ref();
        assert_eq!(args.map(|a| a.realizations), Some(25));
        assert_eq!(args.and_then(|a| a.forecast_days), Some(30.0));
        assert_eq!(args.map(|a| a.format), Some(Format::Csep));
        assert_eq!(
            args.map(|a| a.info_columns.clone()),
            Some(vec![InfoColumn::IsBackground, InfoColumn::Generation])
        );
        assert_eq!(args.map(|a| a.approx_times), Some(true));
        assert_eq!(args.map(|a| a.max_events), Some(2000));
    }

    #[test]
    fn rejects_unknown_info_column() {
        assert!(Args::try_parse_from(["etas-simulate", "p.json", "--info-columns", "depth"]).is_err());
    }
}
