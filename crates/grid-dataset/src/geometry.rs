//! Native grid geometry: longitude normalization, row order and crop windows.
//!
//! Datasets come with longitudes in either the 0..360 or the -180..180
//! convention and latitudes in either order. Every field handed out is
//! expressed in -180..180 with columns ascending west to east and row 0 at
//! the north edge. [`GridGeometry`] works out, once per grid, how native
//! columns and rows map onto that layout.

use std::ops::Range;

use ocean_common::{BoundingBox, GridTransform};
use tracing::debug;

use crate::error::{DatasetError, Result};

/// (min, max) of a coordinate sequence.
fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Wrap a longitude into [-180, 180).
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Column and row mapping of one native grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    /// Signed longitudes in output (ascending) order
    longitudes: Vec<f64>,
    /// Native column index of each output column
    column_order: Vec<usize>,
    /// Latitudes in output (north first) order
    latitudes: Vec<f64>,
    /// True when native rows run south to north
    flip_rows: bool,
    transform: GridTransform,
}

impl GridGeometry {
    /// Derive the geometry from native coordinate arrays.
    pub fn from_coordinates(longitudes: &[f64], latitudes: &[f64]) -> Result<Self> {
        if longitudes.iter().chain(latitudes).any(|v| !v.is_finite()) {
            return Err(DatasetError::invalid_metadata("non-finite coordinate values"));
        }

        let signed: Vec<f64> = longitudes.iter().map(|&lon| normalize_longitude(lon)).collect();
        let mut column_order: Vec<usize> = (0..signed.len()).collect();
        column_order.sort_by(|&a, &b| signed[a].total_cmp(&signed[b]));
        let sorted: Vec<f64> = column_order.iter().map(|&i| signed[i]).collect();

        if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(DatasetError::invalid_metadata(
                "longitudes repeat after wrapping to -180..180",
            ));
        }

        let flip_rows = match latitudes {
            [] | [_] => false,
            [first, second, ..] => first < second,
        };
        let monotonic = latitudes.windows(2).all(|pair| {
            if flip_rows {
                pair[0] < pair[1]
            } else {
                pair[0] > pair[1]
            }
        });
        if !monotonic {
            return Err(DatasetError::invalid_metadata("latitudes are not strictly monotonic"));
        }

        let mut north_first = latitudes.to_vec();
        if flip_rows {
            north_first.reverse();
        }

        let transform = GridTransform::from_coordinates(&sorted, &north_first)?;

        Ok(Self {
            longitudes: sorted,
            column_order,
            latitudes: north_first,
            flip_rows,
            transform,
        })
    }

    pub fn width(&self) -> usize {
        self.longitudes.len()
    }

    pub fn height(&self) -> usize {
        self.latitudes.len()
    }

    /// Transform of the whole grid.
    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    /// Extent of the whole grid.
    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width(), self.height())
    }

    /// Absolute (x, y) pixel size.
    pub fn cell_size(&self) -> (f64, f64) {
        (self.transform.pixel_width, self.transform.pixel_height)
    }

    /// Signed longitudes in output order.
    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    /// Latitudes in output order.
    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    /// Check that native coordinate arrays describe this grid: same size
    /// and the same extent to within a small fraction of a cell.
    pub fn check_coordinates(&self, longitudes: &[f64], latitudes: &[f64]) -> Result<()> {
        if longitudes.len() != self.width() || latitudes.len() != self.height() {
            return Err(DatasetError::invalid_metadata(format!(
                "coordinates are {}x{}, grid is {}x{}",
                longitudes.len(),
                latitudes.len(),
                self.width(),
                self.height()
            )));
        }

        let (lon_min, lon_max) = extent(longitudes.iter().map(|&lon| normalize_longitude(lon)));
        let (lat_min, lat_max) = extent(latitudes.iter().copied());
        let expected_lon = (self.longitudes.first(), self.longitudes.last());
        let expected_lat = (self.latitudes.last(), self.latitudes.first());

        let (tol_x, tol_y) = (self.transform.pixel_width * 1e-3, self.transform.pixel_height * 1e-3);
        let close = |value: f64, expected: Option<&f64>, tol: f64| {
            expected.map_or(false, |&e| (value - e).abs() <= tol)
        };

        if close(lon_min, expected_lon.0, tol_x)
            && close(lon_max, expected_lon.1, tol_x)
            && close(lat_min, expected_lat.0, tol_y)
            && close(lat_max, expected_lat.1, tol_y)
        {
            Ok(())
        } else {
            Err(DatasetError::invalid_metadata(format!(
                "coordinates span lon {}..{} lat {}..{}, grid spans lon {:?}..{:?} lat {:?}..{:?}",
                lon_min, lon_max, lat_min, lat_max, expected_lon.0, expected_lon.1, expected_lat.0, expected_lat.1
            )))
        }
    }

    /// Window covering the whole grid.
    pub fn full_window(&self) -> ReadWindow {
        self.window(0..self.width(), 0..self.height(), self.transform)
    }

    /// Window covering the cells whose coordinates fall inside `bbox`
    /// (edges inclusive). `bbox` must use signed longitudes.
    ///
    /// The window's transform is anchored at the north-west corner of
    /// `bbox` with the grid's pixel sizes.
    pub fn crop_window(&self, bbox: &BoundingBox) -> Result<ReadWindow> {
        let cols = inclusive_span(&self.longitudes, |lon| lon >= bbox.west(), |lon| lon <= bbox.east());
        let rows = inclusive_span(&self.latitudes, |lat| lat <= bbox.north(), |lat| lat >= bbox.south());

        if cols.is_empty() || rows.is_empty() {
            return Err(DatasetError::no_data(format!(
                "study area ({}, {}, {}, {}) does not overlap the grid",
                bbox.west(),
                bbox.south(),
                bbox.east(),
                bbox.north()
            )));
        }

        let transform = self.transform.with_origin(bbox.west(), bbox.north());
        let window = self.window(cols, rows, transform);

        debug!(
            width = window.width,
            height = window.height,
            rows = ?window.rows,
            runs = window.column_runs.len(),
            "Computed crop window"
        );

        Ok(window)
    }

    /// Window over output columns `cols` and output rows `rows`.
    fn window(&self, cols: Range<usize>, rows: Range<usize>, transform: GridTransform) -> ReadWindow {
        let native_rows = if self.flip_rows {
            self.height() - rows.end..self.height() - rows.start
        } else {
            rows.clone()
        };

        ReadWindow {
            rows: native_rows,
            flip_rows: self.flip_rows,
            column_runs: contiguous_runs(&self.column_order[cols.clone()]),
            width: cols.len(),
            height: rows.len(),
            transform,
        }
    }
}

/// Positions `start..end` of a sorted slice such that every value in it
/// satisfies both bounds. `after_start` must hold for a suffix and
/// `before_end` for a prefix of `values`.
fn inclusive_span(
    values: &[f64],
    after_start: impl Fn(f64) -> bool,
    before_end: impl Fn(f64) -> bool,
) -> Range<usize> {
    let start = values.partition_point(|&v| !after_start(v));
    let end = values.partition_point(|&v| before_end(v));
    start..end.max(start)
}

/// Split native column indices into runs of consecutive indices.
fn contiguous_runs(columns: &[usize]) -> Vec<Range<usize>> {
    let mut runs: Vec<Range<usize>> = Vec::new();
    for &col in columns {
        match runs.last_mut() {
            Some(run) if run.end == col => run.end += 1,
            _ => runs.push(col..col + 1),
        }
    }
    runs
}

/// What to read from a native grid to produce one north-up field.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadWindow {
    /// Native row range
    pub rows: Range<usize>,
    /// Reverse row order after reading
    pub flip_rows: bool,
    /// Native column ranges, in output column order
    pub column_runs: Vec<Range<usize>>,
    pub width: usize,
    pub height: usize,
    pub transform: GridTransform,
}

impl ReadWindow {
    /// Read every column run with `read(rows, cols)` and assemble a
    /// row-major, north-up array of `width * height` values.
    pub fn assemble<F>(&self, mut read: F) -> Result<Vec<f32>>
    where
        F: FnMut(Range<usize>, Range<usize>) -> Result<Vec<f32>>,
    {
        let mut output = vec![0.0f32; self.width * self.height];
        let mut col_offset = 0;

        for run in &self.column_runs {
            let run_width = run.len();
            let block = read(self.rows.clone(), run.clone())?;
            if block.len() != run_width * self.height {
                return Err(DatasetError::read_failed(format!(
                    "expected {} values for columns {:?}, got {}",
                    run_width * self.height,
                    run,
                    block.len()
                )));
            }

            for (native_row, chunk) in block.chunks_exact(run_width).enumerate() {
                let row = if self.flip_rows {
                    self.height - 1 - native_row
                } else {
                    native_row
                };
                let start = row * self.width + col_offset;
                output[start..start + run_width].copy_from_slice(chunk);
            }

            col_offset += run_width;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(0.0), 0.0);
        assert_eq!(normalize_longitude(180.0), -180.0);
        assert_eq!(normalize_longitude(270.0), -90.0);
        assert_eq!(normalize_longitude(-190.0), 170.0);
        assert_eq!(normalize_longitude(359.0), -1.0);
    }

    #[test]
    fn test_check_coordinates() {
        let lons = [0.0, 90.0, 180.0, 270.0];
        let lats = [45.0, 0.0, -45.0];
        let geometry = GridGeometry::from_coordinates(&lons, &lats).unwrap();

        assert!(geometry.check_coordinates(&lons, &lats).is_ok());
        // Same grid in the other conventions
        assert!(geometry.check_coordinates(&[-180.0, -90.0, 0.0, 90.0], &[-45.0, 0.0, 45.0]).is_ok());

        assert!(matches!(
            geometry.check_coordinates(&[10.0, 100.0, 190.0, 280.0], &lats),
            Err(DatasetError::InvalidMetadata(_))
        ));
        assert!(matches!(
            geometry.check_coordinates(&lons, &[40.0, -5.0, -50.0]),
            Err(DatasetError::InvalidMetadata(_))
        ));
        assert!(matches!(
            geometry.check_coordinates(&lons[..3], &lats),
            Err(DatasetError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_contiguous_runs() {
        assert_eq!(contiguous_runs(&[2, 3, 0, 1]), vec![2..4, 0..2]);
        assert_eq!(contiguous_runs(&[0, 1, 2]), vec![0..3]);
        assert!(contiguous_runs(&[]).is_empty());
    }

    #[test]
    fn test_positive_longitudes_reordered() {
        let geometry =
            GridGeometry::from_coordinates(&[0.0, 90.0, 180.0, 270.0], &[10.0, 0.0]).unwrap();
        assert_eq!(geometry.longitudes(), &[-180.0, -90.0, 0.0, 90.0]);

        let window = geometry.full_window();
        assert_eq!(window.column_runs, vec![2..4, 0..2]);
        assert_eq!(window.transform.west, -180.0);
        assert!(!window.flip_rows);
    }

    #[test]
    fn test_ascending_latitudes_flipped() {
        let geometry = GridGeometry::from_coordinates(&[0.0, 1.0], &[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(geometry.latitudes(), &[2.0, 1.0, 0.0]);
        assert_eq!(geometry.transform().north, 2.0);

        // Native rows hold their latitude as value
        let native = [0.0f32, 0.0, 1.0, 1.0, 2.0, 2.0];
        let window = geometry.full_window();
        let values = window
            .assemble(|rows, cols| {
                Ok(rows
                    .flat_map(|r| cols.clone().map(move |c| native[r * 2 + c]))
                    .collect())
            })
            .unwrap();
        assert_eq!(values, vec![2.0, 2.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_crop_window_selects_inclusive_cells() {
        let lons: Vec<f64> = (0..10).map(|i| -10.0 + i as f64).collect();
        let lats: Vec<f64> = (0..10).map(|i| 9.0 - i as f64).collect();
        let geometry = GridGeometry::from_coordinates(&lons, &lats).unwrap();

        let window = geometry.crop_window(&BoundingBox::new(-8.0, 2.0, -6.0, 4.0)).unwrap();
        assert_eq!(window.width, 3);
        assert_eq!(window.height, 3);
        assert_eq!(window.rows, 5..8);
        assert_eq!(window.column_runs, vec![2..5]);
        assert_eq!(window.transform.west, -8.0);
        assert_eq!(window.transform.north, 4.0);
    }

    #[test]
    fn test_crop_outside_grid_is_no_data() {
        let geometry = GridGeometry::from_coordinates(&[0.0, 1.0], &[1.0, 0.0]).unwrap();
        let err = geometry.crop_window(&BoundingBox::new(10.0, 10.0, 20.0, 20.0)).unwrap_err();
        assert!(matches!(err, DatasetError::NoDataAvailable(_)));
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        assert!(GridGeometry::from_coordinates(&[0.0, 360.0], &[0.0, 1.0]).is_err());
        assert!(GridGeometry::from_coordinates(&[0.0, 1.0], &[0.0, 1.0, 0.5]).is_err());
        assert!(GridGeometry::from_coordinates(&[0.0, f64::NAN], &[0.0, 1.0]).is_err());
    }
}
