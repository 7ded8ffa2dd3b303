//! Gridded expected rates of simulated catalogs.
//!
//! Events are binned by spatial cell and magnitude; dividing the counts by
//! the number of realizations gives the expected number of events per cell
//! and bin over the forecast period.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use etas_kernels::Region;

use crate::config::ConfigError;
use crate::error::SimulationError;
use crate::table::{self, CsvTable};

/// Upper end of the magnitude bins.
const MAX_MAGNITUDE: f64 = 8.0;

/// Bin width used when the catalog magnitudes are continuous.
const DEFAULT_BIN_WIDTH: f64 = 0.1;

/// Depth range written for every cell, in km.
const DEPTH_RANGE: (f64, f64) = (0.0, 40.0);

/// Slack for floating-point bin edges.
const EDGE_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Spatial grid
// ---------------------------------------------------------------------------

/// Square cells given by their lower-left corners.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    origins: Vec<(f64, f64)>,
    cell_size: f64,
    index: HashMap<(i64, i64), usize>,
}

impl GridSpec {
    /// Build from `(longitude, latitude)` lower-left corners.
    pub fn from_origins(origins: Vec<(f64, f64)>, cell_size: f64) -> Result<Self, SimulationError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SimulationError::InvalidRequest {
                reason: format!("grid cell size must be positive, got {cell_size}"),
            });
        }
        let mut index = HashMap::with_capacity(origins.len());
        for (i, &(lon, lat)) in origins.iter().enumerate() {
            let key = ((lon / cell_size).round() as i64, (lat / cell_size).round() as i64);
            if index.insert(key, i).is_some() {
                return Err(SimulationError::InvalidRequest {
                    reason: format!("duplicate grid origin ({lon}, {lat})"),
                });
            }
        }
        Ok(Self {
            origins,
            cell_size,
            index,
        })
    }

    /// Read origins from a CSV file with `lon`/`lat` columns.
    pub fn from_file(path: &Path, cell_size: f64) -> Result<Self, SimulationError> {
        let origins = CsvTable::read(path)
            .and_then(|t| table::grid_origins(&t))
            .map_err(|source| ConfigError::Table {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_origins(origins, cell_size)
    }

    /// Regular grid aligned to multiples of `cell_size`, keeping the cells
    /// whose centre lies inside `region`.
    pub fn covering(region: &Region, cell_size: f64) -> Result<Self, SimulationError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SimulationError::InvalidRequest {
                reason: format!("grid cell size must be positive, got {cell_size}"),
            });
        }
        let bounds = region.bounds();
        let first_lon = (bounds.min_lon / cell_size).floor() as i64;
        let last_lon = (bounds.max_lon / cell_size).ceil() as i64;
        let first_lat = (bounds.min_lat / cell_size).floor() as i64;
        let last_lat = (bounds.max_lat / cell_size).ceil() as i64;

        let mut origins = Vec::new();
        for i in first_lat..last_lat {
            for j in first_lon..last_lon {
                let lon = j as f64 * cell_size;
                let lat = i as f64 * cell_size;
                if region.contains(lat + cell_size / 2.0, lon + cell_size / 2.0) {
                    origins.push((lon, lat));
                }
            }
        }
        Self::from_origins(origins, cell_size)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    /// Whether the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Cell edge length in degrees.
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Index of the cell containing a point.
    pub fn cell_of(&self, latitude: f64, longitude: f64) -> Option<usize> {
        let key = (
            (longitude / self.cell_size + EDGE_TOLERANCE).floor() as i64,
            (latitude / self.cell_size + EDGE_TOLERANCE).floor() as i64,
        );
        self.index.get(&key).copied()
    }
}

// ---------------------------------------------------------------------------
// Magnitude bins
// ---------------------------------------------------------------------------

/// Magnitude bins from a lower bound up to M8 with fixed width; the last
/// bin is open-ended.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeBins {
    lower_edges: Vec<f64>,
    width: f64,
}

impl MagnitudeBins {
    /// Bins starting at `m_min`; a non-positive `delta_m` uses width 0.1.
    pub fn new(m_min: f64, delta_m: f64) -> Self {
        let width = if delta_m > 0.0 { delta_m } else { DEFAULT_BIN_WIDTH };
        let steps = ((MAX_MAGNITUDE - m_min) / width + EDGE_TOLERANCE).floor().max(0.0) as usize;
        let lower_edges = (0..=steps).map(|i| m_min + i as f64 * width).collect();
        Self { lower_edges, width }
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.lower_edges.len()
    }

    /// Whether there are no bins.
    pub fn is_empty(&self) -> bool {
        self.lower_edges.is_empty()
    }

    /// Lower bin edges.
    pub fn lower_edges(&self) -> &[f64] {
        &self.lower_edges
    }

    /// Index of the bin holding `magnitude`, or `None` below the first edge.
    pub fn bin_of(&self, magnitude: f64) -> Option<usize> {
        let first = *self.lower_edges.first()?;
        let offset = (magnitude - first) / self.width + EDGE_TOLERANCE;
        if !(offset >= 0.0) {
            return None;
        }
        Some((offset.floor() as usize).min(self.lower_edges.len().saturating_sub(1)))
    }
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Streaming event counts per cell and magnitude bin.
#[derive(Debug, Clone)]
pub struct GriddedRates<'a> {
    grid: &'a GridSpec,
    bins: MagnitudeBins,
    counts: Vec<u64>,
}

impl<'a> GriddedRates<'a> {
    /// Zero counts over `grid` × `bins`.
    pub fn new(grid: &'a GridSpec, bins: MagnitudeBins) -> Self {
        let counts = vec![0; grid.len().saturating_mul(bins.len())];
        Self { grid, bins, counts }
    }

    /// Count one event; events outside the grid or below the bins are ignored.
    pub fn add(&mut self, latitude: f64, longitude: f64, magnitude: f64) -> bool {
        let (Some(cell), Some(bin)) = (self.grid.cell_of(latitude, longitude), self.bins.bin_of(magnitude))
        else {
            return false;
        };
        let slot = cell.saturating_mul(self.bins.len()).saturating_add(bin);
        match self.counts.get_mut(slot) {
            Some(count) => {
                *count = count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Total number of counted events.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Count for one cell and bin.
    pub fn count(&self, cell: usize, bin: usize) -> u64 {
        self.counts
            .get(cell.saturating_mul(self.bins.len()).saturating_add(bin))
            .copied()
            .unwrap_or(0)
    }

    /// Write the rate table, one line per cell and magnitude bin.
    ///
    /// Columns: `min_lon max_lon min_lat max_lat min_depth max_depth min_mag
    /// max_mag rate 1`, tab separated.
    ///
    /// Bounds are labelled as `origin ± dh/2` and `m ± dm/2` around each
    /// cell's lower-left corner and each bin's lower edge, the layout
    /// existing `.dat` consumers read. Counting still uses
    /// `[origin, origin + dh)` and `[m, m + dm)`.
    pub fn write_dat(&self, path: &Path, n_realizations: u32) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        let n = f64::from(n_realizations.max(1));
        let half_dh = self.grid.cell_size / 2.0;
        let half_dm = self.bins.width / 2.0;
        for (cell, &(lon, lat)) in self.grid.origins.iter().enumerate() {
            for (bin, &m) in self.bins.lower_edges.iter().enumerate() {
                let rate = self.count(cell, bin) as f64 / n;
                writeln!(
                    out,
                    "{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{}\t1",
                    lon - half_dh,
                    lon + half_dh,
                    lat - half_dh,
                    lat + half_dh,
                    DEPTH_RANGE.0,
                    DEPTH_RANGE.1,
                    m - half_dm,
                    m + half_dm,
                    scientific(rate),
                )?;
            }
        }
        out.flush()
    }
}

/// `%.8e` with a signed, at least two-digit exponent (`1.25000000e-03`).
pub fn scientific(value: f64) -> String {
    let formatted = format!("{value:.8e}");
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return formatted;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return formatted;
    };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn scientific_matches_printf() {
        assert_eq!(scientific(0.0), "0.00000000e+00");
        assert_eq!(scientific(0.00125), "1.25000000e-03");
        assert_eq!(scientific(12.5), "1.25000000e+01");
        assert_eq!(scientific(3.0e-120), "3.00000000e-120");
    }

    #[test]
    fn magnitude_bins_run_to_eight() {
        let bins = MagnitudeBins::new(3.0, 0.1);
        assert_eq!(bins.len(), 51);
        assert_eq!(bins.bin_of(2.9), None);
        assert_eq!(bins.bin_of(3.0), Some(0));
        assert_eq!(bins.bin_of(3.1), Some(1));
        assert_eq!(bins.bin_of(9.3), Some(50));

        let continuous = MagnitudeBins::new(7.5, 0.0);
        assert_eq!(continuous.len(), 6);
        assert_eq!(MagnitudeBins::new(8.5, 0.1).len(), 1);
    }

    #[test]
    fn cells_are_found_by_lower_left_corner() {
        let grid = GridSpec::from_origins(vec![(8.0, 46.0), (8.1, 46.0), (8.0, 46.1)], 0.1).unwrap();
        assert_eq!(grid.cell_of(46.05, 8.05), Some(0));
        assert_eq!(grid.cell_of(46.05, 8.15), Some(1));
        assert_eq!(grid.cell_of(46.15, 8.05), Some(2));
        assert_eq!(grid.cell_of(46.15, 8.15), None);
        assert!(GridSpec::from_origins(vec![(0.0, 0.0), (0.0, 0.0)], 0.1).is_err());
        assert!(GridSpec::from_origins(Vec::new(), 0.0).is_err());
    }

    #[test]
    fn covering_grid_spans_the_region() {
        let region = Region::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).unwrap();
        let grid = GridSpec::covering(&region, 0.5).unwrap();
        assert_eq!(grid.len(), 4);
        assert!(grid.cell_of(0.75, 0.25).is_some());
    }

    #[test]
    fn rates_are_divided_by_realizations() {
        let grid = GridSpec::from_origins(vec![(0.0, 0.0)], 1.0).unwrap();
        let mut rates = GriddedRates::new(&grid, MagnitudeBins::new(7.8, 0.1));
        assert!(rates.add(0.5, 0.5, 7.8));
        assert!(rates.add(0.5, 0.5, 7.9));
        assert!(rates.add(0.5, 0.5, 7.9));
        assert!(!rates.add(2.5, 0.5, 7.9));
        assert!(!rates.add(0.5, 0.5, 7.0));
        assert_eq!(rates.total(), 3);

        let dir = std::env::temp_dir().join(format!("etas-grid-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("forecast.dat");
        rates.write_dat(&path, 4).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines.first().copied(),
            Some("-0.50\t0.50\t-0.50\t0.50\t0.00\t40.00\t7.75\t7.85\t2.50000000e-01\t1")
        );
        assert_eq!(
            lines.get(1).copied(),
            Some("-0.50\t0.50\t-0.50\t0.50\t0.00\t40.00\t7.85\t7.95\t5.00000000e-01\t1")
        );
        fs::remove_dir_all(&dir).unwrap();
    }
}
