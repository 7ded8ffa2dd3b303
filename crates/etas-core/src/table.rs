//! Reading real-catalog tables from CSV files.
//!
//! The inversion stores its catalogs as comma-separated files with a header
//! row. The first column holds the event identifier (often with an empty
//! or `id`-like header); every other column is looked up by name.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use etas_types::{CatalogEvent, SourceEvent, TargetEvent};

/// Errors raised while reading a CSV table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the table.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The table has no header row.
    #[error("table is empty")]
    Empty,

    /// A required column is missing from the header.
    #[error("missing column `{column}`")]
    MissingColumn {
        /// Name of the column.
        column: String,
    },

    /// A cell could not be parsed.
    #[error("line {line}, column `{column}`: cannot parse {value:?}")]
    InvalidValue {
        /// One-based line number in the file.
        line: usize,
        /// Column name.
        column: String,
        /// Offending cell content.
        value: String,
    },

    /// A row has fewer cells than the header.
    #[error("line {line}: expected {expected} fields, found {found}")]
    ShortRow {
        /// One-based line number in the file.
        line: usize,
        /// Number of header fields.
        expected: usize,
        /// Number of fields found.
        found: usize,
    },
}

/// Parse a timestamp in any of the layouts the inversion writes.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.ffffff]`, the same with a `T` separator,
/// and a bare date (midnight).
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_matches('"');
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// An in-memory CSV table with a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Read a table from disk.
    pub fn read(path: &Path) -> Result<Self, TableError> {
        let text = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse a table from CSV text. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let (_, header) = lines.next().ok_or(TableError::Empty)?;
        let headers = split_fields(header);

        let mut rows = Vec::new();
        for (index, line) in lines {
            let fields = split_fields(line);
            if fields.len() < headers.len() {
                return Err(TableError::ShortRow {
                    line: index.saturating_add(1),
                    expected: headers.len(),
                    found: fields.len(),
                });
            }
            rows.push(fields);
        }
        Ok(Self { headers, rows })
    }

    /// Header names in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column whose header matches one of `names`.
    pub fn find_column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.headers.iter().position(|h| h == name))
    }

    fn require_column(&self, names: &[&str]) -> Result<usize, TableError> {
        self.find_column(names).ok_or_else(|| TableError::MissingColumn {
            column: names.first().copied().unwrap_or_default().to_owned(),
        })
    }

    /// Index of the identifier column: a known id header, else the first column.
    fn id_column(&self) -> usize {
        self.find_column(&["id", "event_id", "source_id", "evt_id", ""])
            .unwrap_or(0)
    }

    /// Parse every cell of column `index` with `parse`.
    fn parse_column<T>(
        &self,
        index: usize,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Vec<T>, TableError> {
        let column = self.headers.get(index).cloned().unwrap_or_default();
        self.rows
            .iter()
            .enumerate()
            .map(|(row, fields)| {
                let value = fields.get(index).map_or("", String::as_str);
                parse(value).ok_or_else(|| TableError::InvalidValue {
                    line: row.saturating_add(2),
                    column: column.clone(),
                    value: value.to_owned(),
                })
            })
            .collect()
    }

    /// A numeric column looked up by any of `names`.
    pub fn f64_column(&self, names: &[&str]) -> Result<Vec<f64>, TableError> {
        let index = self.require_column(names)?;
        self.parse_column(index, |v| v.parse::<f64>().ok())
    }

    /// A numeric column, or `default` for every row when absent.
    pub fn f64_column_or(&self, names: &[&str], default: f64) -> Result<Vec<f64>, TableError> {
        match self.find_column(names) {
            Some(index) => self.parse_column(index, |v| v.parse::<f64>().ok()),
            None => Ok(vec![default; self.len()]),
        }
    }

    /// A timestamp column looked up by any of `names`.
    pub fn datetime_column(&self, names: &[&str]) -> Result<Vec<NaiveDateTime>, TableError> {
        let index = self.require_column(names)?;
        self.parse_column(index, parse_datetime)
    }

    /// The identifier column as unsigned integers.
    pub fn id_column_values(&self) -> Result<Vec<u64>, TableError> {
        self.parse_column(self.id_column(), parse_id)
    }
}

/// Integer ids, tolerating a trailing `.0` from float-typed exports.
fn parse_id(value: &str) -> Option<u64> {
    value.parse::<u64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.fract().abs() < f64::EPSILON && *v >= 0.0)
            .map(|v| v as u64)
    })
}

fn split_fields(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.trim().trim_matches('"').to_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Typed readers
// ---------------------------------------------------------------------------

/// Real catalog rows: id, time, latitude, longitude, magnitude.
pub fn catalog_events(table: &CsvTable) -> Result<Vec<CatalogEvent>, TableError> {
    let ids = table.id_column_values()?;
    let times = table.datetime_column(&["time"])?;
    let lats = table.f64_column(&["latitude", "lat"])?;
    let lons = table.f64_column(&["longitude", "lon"])?;
    let mags = table.f64_column(&["magnitude", "mag", "m"])?;
    Ok(ids
        .into_iter()
        .zip(times)
        .zip(lats.into_iter().zip(lons))
        .zip(mags)
        .map(|(((id, time), (latitude, longitude)), magnitude)| CatalogEvent {
            id,
            time,
            latitude,
            longitude,
            magnitude,
        })
        .collect())
}

/// Source events: id and optional `xi_plus_1` (defaults to 1).
pub fn source_events(table: &CsvTable) -> Result<Vec<SourceEvent>, TableError> {
    let ids = table.id_column_values()?;
    let xi = table.f64_column_or(&["xi_plus_1"], 1.0)?;
    Ok(ids
        .into_iter()
        .zip(xi)
        .map(|(id, xi_plus_1)| SourceEvent { id, xi_plus_1 })
        .collect())
}

/// Target events with background probability and optional `zeta_plus_1`.
pub fn target_events(table: &CsvTable) -> Result<Vec<TargetEvent>, TableError> {
    let lats = table.f64_column(&["latitude", "lat"])?;
    let lons = table.f64_column(&["longitude", "lon"])?;
    let times = table.datetime_column(&["time"])?;
    let mags = table.f64_column(&["magnitude", "mag", "m"])?;
    let probs = table.f64_column(&["P_background", "p_background"])?;
    let zeta = table.f64_column_or(&["zeta_plus_1"], 1.0)?;
    Ok(lats
        .into_iter()
        .zip(lons)
        .zip(times.into_iter().zip(mags))
        .zip(probs.into_iter().zip(zeta))
        .map(
            |(((latitude, longitude), (time, magnitude)), (p_background, zeta_plus_1))| {
                TargetEvent {
                    latitude,
                    longitude,
                    time,
                    magnitude,
                    p_background,
                    zeta_plus_1,
                }
            },
        )
        .collect())
}

/// Lower-left cell corners as `(longitude, latitude)` pairs.
///
/// Uses `lon`/`lat` columns when named, else the first two columns.
pub fn grid_origins(table: &CsvTable) -> Result<Vec<(f64, f64)>, TableError> {
    let lon_index = table.find_column(&["lon", "longitude"]).unwrap_or(0);
    let lat_index = table.find_column(&["lat", "latitude"]).unwrap_or(1);
    let parse = |v: &str| v.parse::<f64>().ok();
    let lons = table.parse_column(lon_index, parse)?;
    let lats = table.parse_column(lat_index, parse)?;
    Ok(lons.into_iter().zip(lats).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_time_layouts() {
        let full = parse_datetime("2021-03-04 05:06:07.250000").unwrap();
        assert_eq!(full.to_string(), "2021-03-04 05:06:07.250");
        assert!(parse_datetime("2021-03-04T05:06:07").is_some());
        assert_eq!(
            parse_datetime("2021-03-04").unwrap().to_string(),
            "2021-03-04 00:00:00"
        );
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn reads_catalog_with_unnamed_index() {
        let table = CsvTable::parse(
            ",latitude,longitude,time,magnitude\n\
             7,46.1,8.2,2020-01-01 00:00:00,2.4\n\
             9,46.3,8.0,2020-01-02 12:00:00,3.1\n",
        )
        .unwrap();
        let events = catalog_events(&table).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].id, 9);
        assert!((events[1].magnitude - 3.1).abs() < 1e-12);
    }

    #[test]
    fn sources_default_inflation_to_one() {
        let table = CsvTable::parse("source_id\n3\n5.0\n").unwrap();
        let sources = source_events(&table).unwrap();
        assert_eq!(sources.iter().map(|s| s.id).collect::<Vec<_>>(), vec![3, 5]);
        assert!(sources.iter().all(|s| (s.xi_plus_1 - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn reports_bad_cells_with_line_numbers() {
        let table = CsvTable::parse("id,latitude,longitude,time,magnitude\n1,x,0,2020-01-01,2\n")
            .unwrap();
        let err = catalog_events(&table).unwrap_err();
        assert!(matches!(err, TableError::InvalidValue { line: 2, .. }));
    }

    #[test]
    fn missing_column_is_an_error() {
        let table = CsvTable::parse("latitude,longitude,time,magnitude\n1,2,2020-01-01,3\n").unwrap();
        let err = target_events(&table).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn { .. }));
    }

    #[test]
    fn grid_origins_fall_back_to_positions() {
        let table = CsvTable::parse("a,b\n8.0,46.0\n8.1,46.0\n").unwrap();
        let origins = grid_origins(&table).unwrap();
        assert_eq!(origins, vec![(8.0, 46.0), (8.1, 46.0)]);
    }
}
