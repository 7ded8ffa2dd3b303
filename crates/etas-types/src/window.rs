//! Simulation time window and day-based time arithmetic.
//!
//! Kernel samplers work in fractional days; catalogs store timestamps.
//! The helpers here convert between the two at microsecond resolution.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Microseconds in one day.
const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// Convert a time difference to fractional days.
pub fn to_days(delta: TimeDelta) -> f64 {
    delta.num_microseconds().map_or_else(
        || delta.num_milliseconds() as f64 / 86_400_000.0,
        |us| us as f64 / MICROS_PER_DAY,
    )
}

/// Convert fractional days to a time difference, rounded to microseconds.
///
/// Returns `None` for non-finite input or values outside the representable
/// range of [`TimeDelta`].
pub fn from_days(days: f64) -> Option<TimeDelta> {
    if !days.is_finite() {
        return None;
    }
    let micros = (days * MICROS_PER_DAY).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::microseconds(micros as i64))
}

/// The three boundaries of a simulation run.
///
/// The auxiliary period `(auxiliary_start, primary_start]` carries real
/// events whose aftershocks may reach into the primary period
/// `(primary_start, end]`. Only primary-period events are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the auxiliary (burn-in) period.
    pub auxiliary_start: NaiveDateTime,
    /// Start of the primary period; output begins here.
    pub primary_start: NaiveDateTime,
    /// End of the simulation.
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Create a window, returning `None` unless
    /// `auxiliary_start <= primary_start < end`.
    pub fn new(
        auxiliary_start: NaiveDateTime,
        primary_start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Option<Self> {
        (auxiliary_start <= primary_start && primary_start < end).then_some(Self {
            auxiliary_start,
            primary_start,
            end,
        })
    }

    /// Full window length in days, from auxiliary start to end.
    pub fn length_days(&self) -> f64 {
        to_days(self.end.signed_duration_since(self.auxiliary_start))
    }

    /// Primary period length in days.
    pub fn primary_length_days(&self) -> f64 {
        to_days(self.end.signed_duration_since(self.primary_start))
    }

    /// Whether `time` falls in the closed primary period `[primary_start, end]`.
    pub fn contains_primary(&self, time: NaiveDateTime) -> bool {
        time >= self.primary_start && time <= self.end
    }
}
