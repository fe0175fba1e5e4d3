//! Test data generators for synthetic gridded ocean data.
//!
//! These generators create predictable, verifiable patterns so tests can
//! check that a value ended up in the right place after reads, crops, flips
//! and longitude reordering.

use chrono::{DateTime, Duration, Utc};

/// Evenly spaced coordinates starting at `start`.
///
/// # Example
///
/// ```
/// use test_utils::regular_coordinates;
///
/// let lon = regular_coordinates(-125.0, 0.5, 4);
/// assert_eq!(lon, vec![-125.0, -124.5, -124.0, -123.5]);
/// ```
pub fn regular_coordinates(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + i as f64 * step).collect()
}

/// Longitudes covering the globe in the 0..360 convention.
///
/// With `step = 90.0` this yields `[0, 90, 180, 270]`.
pub fn positive_360_longitudes(step: f64) -> Vec<f64> {
    let count = (360.0 / step).round() as usize;
    regular_coordinates(0.0, step, count)
}

/// Hourly timestamps starting at `start`.
pub fn hourly_axis(start: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    (0..count)
        .map(|i| start + Duration::hours(i as i64))
        .collect()
}

/// Daily timestamps starting at `start`.
pub fn daily_axis(start: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    (0..count).map(|i| start + Duration::days(i as i64)).collect()
}

/// Creates a (time, row, col) cube in native storage order.
///
/// Each value is `f(time, row, col)`.
pub fn create_test_cube<F>(times: usize, height: usize, width: usize, f: F) -> Vec<f32>
where
    F: Fn(usize, usize, usize) -> f32,
{
    let mut data = Vec::with_capacity(times * height * width);
    for t in 0..times {
        for row in 0..height {
            for col in 0..width {
                data.push(f(t, row, col));
            }
        }
    }
    data
}

/// Cube where every cell at time `t` equals `t as f32`.
///
/// The mean over times `a..=b` is `(a + b) / 2` everywhere.
pub fn create_time_ramp_cube(times: usize, height: usize, width: usize) -> Vec<f32> {
    create_test_cube(times, height, width, |t, _, _| t as f32)
}
