//! Mapping wall-clock intervals onto dataset time indices.

use chrono::{DateTime, Utc};
use ocean_common::TimeInterval;
use tracing::debug;

use crate::axis::TimeAxis;
use crate::error::{DatasetError, Result};

/// Resolves time intervals against one dataset's time axis.
///
/// Interval endpoints are rounded to the nearest hour and every hourly step
/// in between (inclusive) is matched exactly against the axis. Timestamps
/// that fall between axis entries are not snapped to a neighbour.
#[derive(Debug, Clone, Copy)]
pub struct TemporalIndexResolver<'a> {
    axis: &'a TimeAxis,
}

impl<'a> TemporalIndexResolver<'a> {
    pub fn new(axis: &'a TimeAxis) -> Self {
        Self { axis }
    }

    /// Ascending axis indices matching the hourly steps of `interval`.
    ///
    /// Returns [`DatasetError::NoDataAvailable`] when nothing matches.
    pub fn indices(&self, interval: &TimeInterval) -> Result<Vec<usize>> {
        let steps = interval.hourly_steps();
        let indices: Vec<usize> = steps
            .iter()
            .filter_map(|step| self.axis.index_of(*step))
            .collect();

        debug!(
            start = %interval.start,
            end = %interval.end,
            steps = steps.len(),
            matched = indices.len(),
            "Resolved time indices"
        );

        if indices.is_empty() {
            return Err(DatasetError::no_data(format!(
                "no timestamps between {} and {}",
                interval.start, interval.end
            )));
        }

        Ok(indices)
    }

    /// Index of a single instant, after rounding to the hour.
    pub fn index_at(&self, instant: DateTime<Utc>) -> Result<usize> {
        self.indices(&TimeInterval::at(instant))?
            .first()
            .copied()
            .ok_or_else(|| DatasetError::no_data(format!("no timestamp at {}", instant)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn axis() -> TimeAxis {
        // 00:00, 03:00, 06:00, 09:00
        TimeAxis::new((0..4).map(|i| t(0, 0) + Duration::hours(i * 3)).collect()).unwrap()
    }

    #[test]
    fn test_exact_matches_within_interval() {
        let axis = axis();
        let resolver = TemporalIndexResolver::new(&axis);
        let indices = resolver.indices(&TimeInterval::new(t(2, 40), t(8, 10))).unwrap();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_interval_between_entries_is_no_data() {
        let axis = axis();
        let resolver = TemporalIndexResolver::new(&axis);
        let err = resolver.indices(&TimeInterval::new(t(1, 0), t(2, 0))).unwrap_err();
        assert!(matches!(err, DatasetError::NoDataAvailable(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_zero_length_interval() {
        let axis = axis();
        let resolver = TemporalIndexResolver::new(&axis);
        assert_eq!(resolver.indices(&TimeInterval::at(t(5, 50))).unwrap(), vec![2]);
        assert_eq!(resolver.index_at(t(9, 0)).unwrap(), 3);
        assert!(resolver.index_at(t(10, 0)).is_err());
    }

    #[test]
    fn test_rounding_moves_endpoints() {
        let axis = axis();
        let resolver = TemporalIndexResolver::new(&axis);
        // 02:31 rounds up to 03:00
        assert_eq!(resolver.indices(&TimeInterval::at(t(2, 31))).unwrap(), vec![1]);
        // 03:29 rounds down to 03:00
        assert_eq!(resolver.indices(&TimeInterval::at(t(3, 29))).unwrap(), vec![1]);
    }

    #[test]
    fn test_inverted_interval_is_no_data() {
        let axis = axis();
        let resolver = TemporalIndexResolver::new(&axis);
        assert!(resolver.indices(&TimeInterval::new(t(9, 0), t(0, 0))).is_err());
    }
}
