//! Output layout enumerations.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::Event;

// ---------------------------------------------------------------------------
// Output format
// ---------------------------------------------------------------------------

/// Layout of a simulated-catalog CSV file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `id, latitude, longitude, time, magnitude, [info columns], [catalog_id]`.
    #[default]
    Plain,
    /// `lon, lat, m, time, depth, catalog_id, event_id` (pyCSEP catalog layout).
    Csep,
}

// ---------------------------------------------------------------------------
// Info columns
// ---------------------------------------------------------------------------

/// Optional per-event attribute appended to plain output rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoColumn {
    /// Whether the event came from the background process.
    IsBackground,
    /// Branching generation.
    Generation,
    /// Parent event id.
    Parent,
    /// Generation-0 ancestor id.
    Gen0Parent,
    /// Productivity inflation factor ξ+1.
    XiPlus1,
    /// Expected number of direct aftershocks.
    ExpectedNAftershocks,
    /// Realized number of direct aftershocks.
    NAftershocks,
}

impl InfoColumn {
    /// Every supported column.
    pub const ALL: [Self; 7] = [
        Self::IsBackground,
        Self::Generation,
        Self::Parent,
        Self::Gen0Parent,
        Self::XiPlus1,
        Self::ExpectedNAftershocks,
        Self::NAftershocks,
    ];

    /// Header name of the column.
    pub const fn name(self) -> &'static str {
        match self {
            Self::IsBackground => "is_background",
            Self::Generation => "generation",
            Self::Parent => "parent",
            Self::Gen0Parent => "gen_0_parent",
            Self::XiPlus1 => "xi_plus_1",
            Self::ExpectedNAftershocks => "expected_n_aftershocks",
            Self::NAftershocks => "n_aftershocks",
        }
    }

    /// Render the column value for an event.
    pub fn value(self, event: &Event) -> String {
        match self {
            Self::IsBackground => event.is_background.to_string(),
            Self::Generation => event.generation.to_string(),
            Self::Parent => event.parent.to_string(),
            Self::Gen0Parent => event.gen_0_parent.to_string(),
            Self::XiPlus1 => event.xi_plus_1.to_string(),
            Self::ExpectedNAftershocks => event.expected_n_aftershocks.to_string(),
            Self::NAftershocks => event.n_aftershocks.to_string(),
        }
    }
}

impl fmt::Display for InfoColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown info column name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown info column: {0}")]
pub struct UnknownInfoColumn(pub String);

impl FromStr for InfoColumn {
    type Err = UnknownInfoColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s.trim())
            .ok_or_else(|| UnknownInfoColumn(s.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn info_column_names_round_trip() {
        for column in InfoColumn::ALL {
            assert_eq!(column.name().parse::<InfoColumn>().ok(), Some(column));
        }
        let err = "depth".parse::<InfoColumn>().unwrap_err();
        assert_eq!(err, UnknownInfoColumn("depth".to_owned()));
        assert_eq!(err.to_string(), "unknown info column: depth");
    }

    #[test]
    fn output_format_serde_is_snake_case() {
        let json = serde_json::to_string(&OutputFormat::Csep).ok();
        assert_eq!(json.as_deref(), Some("\"csep\""));
    }
}
