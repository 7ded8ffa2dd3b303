//! Parameter-file loading and typed simulation parameters.
//!
//! The inversion writes its result as a JSON (or YAML) parameter file. This
//! module mirrors that file in [`ParameterFile`], resolves relative paths
//! and coordinate encodings against the file's directory, loads the real
//! catalog tables it references and validates everything into
//! [`SimulationParameters`].

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

use etas_kernels::{AreaMetric, KernelError, Region};
use etas_types::{CatalogEvent, EtasParameters, SourceEvent, TargetEvent};

use crate::table::{self, CsvTable, TableError};

/// Errors that can occur when loading or validating parameters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the parameter file from disk.
    #[error("failed to read parameter file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse parameter JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        source: serde_json::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse parameter YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A referenced catalog table could not be read.
    #[error("failed to load table {}: {source}", path.display())]
    Table {
        /// Path of the table.
        path: PathBuf,
        /// The underlying table error.
        source: TableError,
    },

    /// The target polygon is invalid.
    #[error("invalid shape_coords: {source}")]
    Region {
        /// The underlying geometry error.
        #[from]
        source: KernelError,
    },

    /// A field holds a value outside its valid range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<serde_json::Error> for ConfigError {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

// ---------------------------------------------------------------------------
// Raw file layout
// ---------------------------------------------------------------------------

/// The polygon as stored in a parameter file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ShapeCoords {
    /// Inline list of `[latitude, longitude]` vertices.
    Vertices(Vec<[f64; 2]>),
    /// A textual vertex list, or a path to a `.json`/`.csv` coordinate file.
    Text(String),
}

/// Completeness magnitude as written by the inversion; may be `"var"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Completeness {
    /// A single completeness magnitude.
    Value(f64),
    /// Any non-numeric marker.
    Label(String),
}

/// Mirror of the parameter file written by the inversion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterFile {
    /// Fitted ETAS coefficients.
    #[serde(alias = "parameters")]
    pub theta: EtasParameters,

    /// Reference magnitude the coefficients refer to.
    #[serde(default)]
    pub m_ref: Option<f64>,

    /// Completeness magnitude; used as `m_ref` when that is absent.
    #[serde(default)]
    pub mc: Option<Completeness>,

    /// Magnitude bin width.
    #[serde(default = "default_delta_m")]
    pub delta_m: f64,

    /// Gutenberg–Richter decay rate of background and real events.
    pub beta: f64,

    /// Decay rate of aftershock magnitudes; defaults to `beta`.
    #[serde(default)]
    pub beta_aftershock: Option<f64>,

    /// Target polygon.
    pub shape_coords: ShapeCoords,

    /// Start of the auxiliary period.
    #[serde(alias = "burn_start", deserialize_with = "de_datetime")]
    pub auxiliary_start: NaiveDateTime,

    /// Start of the primary period.
    #[serde(alias = "timewindow_end", deserialize_with = "de_datetime")]
    pub primary_start: NaiveDateTime,

    /// End of the simulation, if fixed by the file.
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub end: Option<NaiveDateTime>,

    /// Real catalog the inversion ran on.
    #[serde(default)]
    pub fn_catalog: Option<PathBuf>,

    /// Source events selected by the inversion.
    #[serde(default)]
    pub fn_src: Option<PathBuf>,

    /// Target events with background probabilities.
    #[serde(default)]
    pub fn_ip: Option<PathBuf>,

    /// Default output path for simulated catalogs.
    #[serde(default)]
    pub fn_store: Option<PathBuf>,

    /// How the polygon area is measured for the background rate.
    #[serde(default)]
    pub area_metric: AreaMetric,
}

const fn default_delta_m() -> f64 {
    0.0
}

fn de_datetime<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    table::parse_datetime(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
}

fn de_opt_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|raw| {
        table::parse_datetime(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
    })
    .transpose()
}

impl ParameterFile {
    /// Load a parameter file, choosing the parser by extension
    /// (`.yaml`/`.yml` for YAML, anything else JSON).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or a parse
    /// error if the content does not match the expected layout.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml {
            Self::parse_yaml(&contents)
        } else {
            Self::parse_json(&contents)
        }
    }

    /// Parse a parameter file from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a parameter file from a YAML string.
    pub fn parse_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Resolve paths against `base_dir`, load referenced tables and validate.
    pub fn resolve(self, base_dir: &Path) -> Result<SimulationParameters, ConfigError> {
        let m_ref = match (self.m_ref, self.mc.as_ref()) {
            (Some(m_ref), _) | (None, Some(&Completeness::Value(m_ref))) => m_ref,
            _ => {
                return Err(ConfigError::Invalid {
                    field: "m_ref",
                    reason: "neither m_ref nor a numeric mc is given".to_owned(),
                });
            }
        };
        let region = Region::new(read_shape_coords(&self.shape_coords, base_dir)?)?;

        let load = |file: Option<&PathBuf>| -> Result<Option<CsvTable>, ConfigError> {
            file.map(|file| {
                let path = base_dir.join(file);
                CsvTable::read(&path).map_err(|source| ConfigError::Table { path, source })
            })
            .transpose()
        };
        let with_path = |file: Option<&PathBuf>, source: TableError| ConfigError::Table {
            path: file.map(|f| base_dir.join(f)).unwrap_or_default(),
            source,
        };

        let catalog = match load(self.fn_catalog.as_ref())? {
            Some(t) => table::catalog_events(&t).map_err(|e| with_path(self.fn_catalog.as_ref(), e))?,
            None => Vec::new(),
        };
        let source_events = match load(self.fn_src.as_ref())? {
            Some(t) => table::source_events(&t).map_err(|e| with_path(self.fn_src.as_ref(), e))?,
            None => Vec::new(),
        };
        let target_events = match load(self.fn_ip.as_ref())? {
            Some(t) => table::target_events(&t).map_err(|e| with_path(self.fn_ip.as_ref(), e))?,
            None => Vec::new(),
        };

        let params = SimulationParameters {
            theta: self.theta,
            m_ref,
            delta_m: self.delta_m,
            beta: self.beta,
            beta_aftershock: self.beta_aftershock,
            region,
            area_metric: self.area_metric,
            auxiliary_start: self.auxiliary_start,
            primary_start: self.primary_start,
            end: self.end,
            catalog,
            source_events,
            target_events,
            output: self.fn_store.map(|f| base_dir.join(f)),
        };
        params.validate()?;
        Ok(params)
    }
}

/// Turn the stored polygon into `[latitude, longitude]` vertices.
fn read_shape_coords(coords: &ShapeCoords, base_dir: &Path) -> Result<Vec<[f64; 2]>, ConfigError> {
    let text = match coords {
        ShapeCoords::Vertices(vertices) => return Ok(vertices.clone()),
        ShapeCoords::Text(text) => text.trim(),
    };
    let lower = text.to_ascii_lowercase();
    if lower.ends_with(".json") {
        let contents = std::fs::read_to_string(base_dir.join(text))?;
        return Ok(serde_json::from_str(&contents)?);
    }
    if lower.ends_with(".csv") {
        let path = base_dir.join(text);
        let contents = std::fs::read_to_string(&path)?;
        return parse_coordinate_lines(&contents).ok_or_else(|| ConfigError::Invalid {
            field: "shape_coords",
            reason: format!("{} holds no latitude,longitude rows", path.display()),
        });
    }
    Ok(serde_json::from_str(text)?)
}

/// `latitude,longitude` rows; a non-numeric first line is taken as header.
fn parse_coordinate_lines(contents: &str) -> Option<Vec<[f64; 2]>> {
    let mut vertices = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let mut fields = line.split(',').map(|f| f.trim().parse::<f64>());
        match (fields.next(), fields.next()) {
            (Some(Ok(lat)), Some(Ok(lon))) => vertices.push([lat, lon]),
            _ if index == 0 || line.trim().is_empty() => {}
            _ => return None,
        }
    }
    (!vertices.is_empty()).then_some(vertices)
}

// ---------------------------------------------------------------------------
// Resolved parameters
// ---------------------------------------------------------------------------

/// Validated inputs of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    /// Fitted ETAS coefficients.
    pub theta: EtasParameters,
    /// Reference magnitude.
    pub m_ref: f64,
    /// Magnitude bin width.
    pub delta_m: f64,
    /// Gutenberg–Richter decay rate of background and real events.
    pub beta: f64,
    /// Decay rate of aftershock magnitudes; defaults to `beta`.
    pub beta_aftershock: Option<f64>,
    /// Target polygon.
    pub region: Region,
    /// How the polygon area is measured.
    pub area_metric: AreaMetric,
    /// Start of the auxiliary period.
    pub auxiliary_start: NaiveDateTime,
    /// Start of the primary period.
    pub primary_start: NaiveDateTime,
    /// Fixed simulation end, if any.
    pub end: Option<NaiveDateTime>,
    /// Real catalog rows.
    pub catalog: Vec<CatalogEvent>,
    /// Source events (ids into `catalog`).
    pub source_events: Vec<SourceEvent>,
    /// Target events defining the empirical background density.
    pub target_events: Vec<TargetEvent>,
    /// Default output path.
    pub output: Option<PathBuf>,
}

impl SimulationParameters {
    /// Load, resolve and validate a parameter file.
    ///
    /// Relative paths inside the file are resolved against its directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        ParameterFile::from_file(path)?.resolve(base_dir)
    }

    /// Decay rate used for aftershock magnitudes.
    pub fn aftershock_beta(&self) -> f64 {
        self.beta_aftershock.unwrap_or(self.beta)
    }

    /// Check ranges and orderings of all fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = self.theta.first_non_finite() {
            return Err(ConfigError::Invalid {
                field: "theta",
                reason: format!("{name} is not finite"),
            });
        }
        if !self.m_ref.is_finite() {
            return Err(ConfigError::Invalid {
                field: "m_ref",
                reason: format!("must be finite, got {}", self.m_ref),
            });
        }
        if !(self.delta_m.is_finite() && self.delta_m >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "delta_m",
                reason: format!("must be a non-negative number, got {}", self.delta_m),
            });
        }
        for (field, beta) in [("beta", Some(self.beta)), ("beta_aftershock", self.beta_aftershock)] {
            if let Some(beta) = beta.filter(|b| !(b.is_finite() && *b > 0.0)) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {beta}"),
                });
            }
        }
        if self.auxiliary_start > self.primary_start {
            return Err(ConfigError::Invalid {
                field: "auxiliary_start",
                reason: format!(
                    "{} is after primary_start {}",
                    self.auxiliary_start, self.primary_start
                ),
            });
        }
        if let Some(end) = self.end.filter(|end| *end <= self.primary_start) {
            return Err(ConfigError::Invalid {
                field: "end",
                reason: format!("{end} is not after primary_start {}", self.primary_start),
            });
        }
        if let Some(target) = self
            .target_events
            .iter()
            .find(|t| !(0.0..=1.0).contains(&t.p_background) || !(t.zeta_plus_1 > 0.0))
        {
            return Err(ConfigError::Invalid {
                field: "target_events",
                reason: format!(
                    "P_background must lie in [0, 1] and zeta_plus_1 be positive, got {} / {}",
                    target.p_background, target.zeta_plus_1
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "theta": {
            "log10_mu": -6.5, "log10_k0": -2.6, "a": 1.7, "log10_c": -2.6,
            "omega": -0.02, "log10_tau": 3.7, "log10_d": -0.8, "gamma": 1.2,
            "rho": 0.6
        },
        "mc": 2.3,
        "delta_m": 0.1,
        "beta": 2.3,
        "shape_coords": "[[45, 5], [48, 5], [48, 11], [45, 11]]",
        "burn_start": "1980-01-01 00:00:00",
        "timewindow_end": "2022-01-01",
        "area_metric": "planar"
    }"#;

    #[test]
    fn parses_inversion_output_with_aliases() {
        let file = ParameterFile::parse_json(JSON).unwrap();
        let params = file.resolve(Path::new(".")).unwrap();
        assert!((params.m_ref - 2.3).abs() < f64::EPSILON);
        assert_eq!(params.region.vertices().len(), 4);
        assert_eq!(params.area_metric, AreaMetric::Planar);
        assert!((params.region.area(params.area_metric) - 18.0).abs() < 1e-12);
        assert_eq!(params.primary_start.to_string(), "2022-01-01 00:00:00");
        assert!(params.end.is_none());
        assert!(params.source_events.is_empty());
        assert!((params.aftershock_beta() - 2.3).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_yaml_with_inline_vertices() {
        let yaml = r"
parameters:
  log10_mu: -6.5
  log10_k0: -2.6
  a: 1.7
  log10_c: -2.6
  omega: -0.02
  log10_tau: 3.7
  log10_d: -0.8
  gamma: 1.2
  rho: 0.6
m_ref: 2.0
beta: 2.1
beta_aftershock: 2.4
shape_coords: [[0, 0], [1, 0], [1, 1], [0, 1]]
auxiliary_start: 2000-01-01 00:00:00
primary_start: 2000-02-01 00:00:00
end: 2000-03-01 00:00:00
";
        let params = ParameterFile::parse_yaml(yaml)
            .unwrap()
            .resolve(Path::new("."))
            .unwrap();
        assert!((params.aftershock_beta() - 2.4).abs() < f64::EPSILON);
        assert!(params.end.is_some());
        assert_eq!(params.area_metric, AreaMetric::Geodesic);
    }

    #[test]
    fn rejects_missing_reference_magnitude() {
        let json = JSON.replace("\"mc\": 2.3,", "\"mc\": \"var\",");
        let err = ParameterFile::parse_json(&json)
            .unwrap()
            .resolve(Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "m_ref", .. }));
    }

    #[test]
    fn rejects_reversed_window() {
        let json = JSON.replace("1980-01-01 00:00:00", "2023-01-01 00:00:00");
        let err = ParameterFile::parse_json(&json)
            .unwrap()
            .resolve(Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "auxiliary_start", .. }));
    }

    #[test]
    fn coordinate_csv_skips_header() {
        let vertices = parse_coordinate_lines("lat,lon\n1,2\n3,4\n5,6\n").unwrap();
        assert_eq!(vertices, vec![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert!(parse_coordinate_lines("1,2\nx,y\n").is_none());
    }
}
