//! Common test fixtures for ocean dataset tests.
//!
//! This module provides pre-defined times and study areas that recur across
//! the test suite.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Common bounding box definitions for testing, as (west, south, east, north).
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// US West Coast, roughly the HF radar coverage
    pub const US_WEST_COAST: (f64, f64, f64, f64) = (-130.0, 30.0, -115.0, 50.0);

    /// Small area off central California
    pub const MONTEREY_BAY: (f64, f64, f64, f64) = (-123.0, 36.0, -121.5, 37.5);

    /// Crosses antimeridian (Pacific-centric)
    pub const PACIFIC: (f64, f64, f64, f64) = (160.0, -50.0, -140.0, 50.0);
}

/// Common study area polygons as GeoJSON text.
pub mod geojson {
    /// Bare Polygon geometry, bbox (-125, 32, -117, 42)
    pub const WEST_COAST_POLYGON: &str = r#"{
        "type": "Polygon",
        "coordinates": [[[-125.0, 32.0], [-117.0, 32.0], [-117.0, 42.0], [-125.0, 42.0], [-125.0, 32.0]]]
    }"#;

    /// FeatureCollection wrapping a single polygon, bbox (-123, 36, -121.5, 37.5)
    pub const MONTEREY_FEATURE_COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "study_area"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-123.0, 36.0], [-121.5, 36.0], [-121.5, 37.5], [-123.0, 37.5], [-123.0, 36.0]]]
            }
        }]
    }"#;

    /// A LineString, which is not a valid study area
    pub const LINE_STRING: &str = r#"{
        "type": "LineString",
        "coordinates": [[-125.0, 32.0], [-117.0, 42.0]]
    }"#;
}

/// Test datetimes.
pub mod times {
    use super::*;

    /// A model run date used across tests.
    pub fn model_run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default()
    }

    /// Midnight of the model run date.
    pub fn model_run_time() -> DateTime<Utc> {
        utc(2024, 1, 15, 0)
    }
}

/// Shorthand for a whole-hour UTC timestamp.
pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_helper() {
        assert_eq!(utc(2024, 1, 15, 6).to_rfc3339(), "2024-01-15T06:00:00+00:00");
    }

    #[test]
    fn test_model_run_time_is_midnight() {
        assert_eq!(
            times::model_run_time().date_naive(),
            times::model_run_date()
        );
    }
}
