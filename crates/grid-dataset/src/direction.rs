//! Forecast/nowcast selection for model output.

use chrono::{DateTime, Utc};
use ocean_common::Cadence;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DatasetError, Result};

/// Which half of a model run a timestamp belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastDirection {
    /// Before the model reference time
    Nowcast,
    /// At or after the model reference time
    Forecast,
}

impl ForecastDirection {
    pub const ALL: [ForecastDirection; 2] = [ForecastDirection::Nowcast, ForecastDirection::Forecast];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nowcast => "nowcast",
            Self::Forecast => "forecast",
        }
    }

    /// Parse "nowcast" / "forecast" (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nowcast" => Ok(Self::Nowcast),
            "forecast" => Ok(Self::Forecast),
            _ => Err(DatasetError::invalid_argument(format!(
                "direction must be 'nowcast' or 'forecast', got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for ForecastDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the direction for `query` relative to model reference time `reference`.
///
/// Forecast iff `query >= reference`, after both are truncated to the
/// cadence (midnight for daily output).
pub fn select_direction(
    reference: DateTime<Utc>,
    query: DateTime<Utc>,
    cadence: Cadence,
) -> ForecastDirection {
    if cadence.truncate(query) >= cadence.truncate(reference) {
        ForecastDirection::Forecast
    } else {
        ForecastDirection::Nowcast
    }
}

/// Whole days from `reference` to `query`, truncated towards zero.
pub fn lead_days(reference: DateTime<Utc>, query: DateTime<Utc>, cadence: Cadence) -> i64 {
    (cadence.truncate(query) - cadence.truncate(reference)).num_days()
}

/// Filename tag for a model-relative time: `f{days+1:03}` for forecast
/// days, `n{|days|:03}` for nowcast days.
pub fn lead_tag(reference: DateTime<Utc>, query: DateTime<Utc>, cadence: Cadence) -> String {
    let days = lead_days(reference, query, cadence);
    match select_direction(reference, query, cadence) {
        ForecastDirection::Forecast => format!("f{:03}", days + 1),
        ForecastDirection::Nowcast => format!("n{:03}", days.abs()),
    }
}
