//! Affine grid transforms mapping array indices to geographic coordinates.

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FieldResult};
use crate::{BoundingBox, CrsCode};

/// Tolerance used when comparing pixel sizes.
const PIXEL_SIZE_EPSILON: f64 = 1e-9;

/// North-up affine transform of a regular grid.
///
/// Row 0 is the northernmost row and column 0 the westernmost column.
/// Both pixel sizes are stored as positive numbers; rows advance southwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    /// X coordinate of the western edge of column 0
    pub west: f64,
    /// Y coordinate of the northern edge of row 0
    pub north: f64,
    /// Pixel width in CRS units
    pub pixel_width: f64,
    /// Pixel height in CRS units
    pub pixel_height: f64,
    /// Reference system of the coordinates
    pub crs: CrsCode,
}

impl GridTransform {
    /// Create a transform from its north-west origin and pixel sizes.
    pub fn from_origin(west: f64, north: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            west,
            north,
            pixel_width: pixel_width.abs(),
            pixel_height: pixel_height.abs(),
            crs: CrsCode::Epsg4326,
        }
    }

    /// Derive a transform from 1-D coordinate arrays.
    ///
    /// The origin is (min longitude, max latitude) and the pixel sizes are
    /// the mean absolute spacing of each coordinate array.
    pub fn from_coordinates(longitudes: &[f64], latitudes: &[f64]) -> FieldResult<Self> {
        let west = longitudes
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let north = latitudes
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        if !west.is_finite() || !north.is_finite() {
            return Err(FieldError::InvalidCoordinates(
                "coordinate arrays must contain finite values".to_string(),
            ));
        }

        let pixel_width = mean_spacing(longitudes)?;
        let pixel_height = mean_spacing(latitudes)?;

        Ok(Self::from_origin(west, north, pixel_width, pixel_height))
    }

    /// Same pixel sizes and CRS, different origin.
    pub fn with_origin(&self, west: f64, north: f64) -> Self {
        Self {
            west,
            north,
            ..*self
        }
    }

    /// Same transform referenced against another CRS.
    pub fn with_crs(&self, crs: CrsCode) -> Self {
        Self { crs, ..*self }
    }

    /// Coordinates of the north-west corner of a pixel.
    pub fn pixel_corner(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.west + col as f64 * self.pixel_width,
            self.north - row as f64 * self.pixel_height,
        )
    }

    /// Coordinates of the centre of a pixel.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.west + (col as f64 + 0.5) * self.pixel_width,
            self.north - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional (column, row) position of a coordinate.
    pub fn coord_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.west) / self.pixel_width,
            (self.north - y) / self.pixel_height,
        )
    }

    /// Extent covered by a `width` x `height` raster.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        BoundingBox::new(
            self.west,
            self.north - height as f64 * self.pixel_height,
            self.west + width as f64 * self.pixel_width,
            self.north,
        )
    }

    /// True when pixels are square.
    pub fn is_square(&self) -> bool {
        (self.pixel_width - self.pixel_height).abs() <= PIXEL_SIZE_EPSILON
    }

    /// GDAL-style six coefficient geotransform.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.west,
            self.pixel_width,
            0.0,
            self.north,
            0.0,
            -self.pixel_height,
        ]
    }

    /// Approximate equality of origin and pixel sizes.
    pub fn approx_eq(&self, other: &GridTransform, tolerance: f64) -> bool {
        self.crs == other.crs
            && (self.west - other.west).abs() <= tolerance
            && (self.north - other.north).abs() <= tolerance
            && (self.pixel_width - other.pixel_width).abs() <= tolerance
            && (self.pixel_height - other.pixel_height).abs() <= tolerance
    }
}

/// Mean absolute difference between consecutive coordinates.
pub fn mean_spacing(coordinates: &[f64]) -> FieldResult<f64> {
    if coordinates.len() < 2 {
        return Err(FieldError::InvalidCoordinates(format!(
            "need at least 2 coordinates to derive spacing, got {}",
            coordinates.len()
        )));
    }

    let total: f64 = coordinates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .sum();
    let spacing = total / (coordinates.len() - 1) as f64;

    if spacing <= 0.0 || !spacing.is_finite() {
        return Err(FieldError::InvalidPixelSize(format!(
            "mean coordinate spacing is {}",
            spacing
        )));
    }

    Ok(spacing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_coordinates() {
        let lon = [-130.0, -129.5, -129.0, -128.5];
        let lat = [30.0, 30.25, 30.5];
        let transform = GridTransform::from_coordinates(&lon, &lat).unwrap();

        assert_eq!(transform.west, -130.0);
        assert_eq!(transform.north, 30.5);
        assert!((transform.pixel_width - 0.5).abs() < 1e-12);
        assert!((transform.pixel_height - 0.25).abs() < 1e-12);
        assert!(!transform.is_square());
    }

    #[test]
    fn test_descending_latitudes_give_positive_height() {
        let lon = [0.0, 1.0];
        let lat = [50.0, 49.0, 48.0];
        let transform = GridTransform::from_coordinates(&lon, &lat).unwrap();
        assert_eq!(transform.north, 50.0);
        assert!((transform.pixel_height - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_coordinate_rejected() {
        assert!(GridTransform::from_coordinates(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_bounds_and_pixels() {
        let transform = GridTransform::from_origin(-125.0, 49.0, 0.5, 0.25);
        let bounds = transform.bounds(4, 8);
        assert_eq!(bounds, BoundingBox::new(-125.0, 47.0, -123.0, 49.0));

        assert_eq!(transform.pixel_corner(1, 2), (-124.5, 48.5));
        let (col, row) = transform.coord_to_pixel(-124.5, 48.5);
        assert!((col - 1.0).abs() < 1e-12);
        assert!((row - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_gdal_geotransform() {
        let transform = GridTransform::from_origin(10.0, 20.0, 0.1, 0.2);
        assert_eq!(transform.to_gdal(), [10.0, 0.1, 0.0, 20.0, 0.0, -0.2]);
    }
}
