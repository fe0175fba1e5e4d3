//! Nearest-neighbour regridding onto square cells.
//!
//! ASCII grids carry a single `cellsize`, so fields with rectangular pixels
//! are resampled onto a grid whose cell size is the smaller of the source
//! pixel width and height, spanning a fixed extent.

use ocean_common::{BoundingBox, CrsCode, GridTransform, VariableField};

use crate::error::{ExportError, Result};

/// Slack when deciding how many cells cover an extent.
const EXTENT_EPSILON: f64 = 1e-9;

/// Target grid with square cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareGrid {
    pub transform: GridTransform,
    pub width: usize,
    pub height: usize,
}

impl SquareGrid {
    /// Grid of `cell_size` cells anchored at the north-west corner of `bounds`.
    pub fn covering(bounds: &BoundingBox, cell_size: f64, crs: CrsCode) -> Result<Self> {
        if cell_size <= 0.0 || !cell_size.is_finite() {
            return Err(ExportError::invalid_geometry(format!(
                "cell size must be positive, got {}",
                cell_size
            )));
        }
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return Err(ExportError::invalid_geometry(format!(
                "empty extent {:?}",
                bounds
            )));
        }

        let width = ((bounds.width() / cell_size) - EXTENT_EPSILON).ceil().max(1.0) as usize;
        let height = ((bounds.height() / cell_size) - EXTENT_EPSILON).ceil().max(1.0) as usize;
        let transform =
            GridTransform::from_origin(bounds.west(), bounds.north(), cell_size, cell_size)
                .with_crs(crs);

        Ok(Self {
            transform,
            width,
            height,
        })
    }

    /// Square grid over the full extent of a `width` x `height` source grid,
    /// using the smaller of its two pixel sizes.
    pub fn for_source(transform: &GridTransform, width: usize, height: usize) -> Result<Self> {
        let cell_size = transform.pixel_width.min(transform.pixel_height);
        Self::covering(&transform.bounds(width, height), cell_size, transform.crs)
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.pixel_width
    }
}

/// Resample a field onto `target` by nearest neighbour.
///
/// Each target cell takes the value of the source pixel containing its
/// centre. Target cells whose centre falls outside the source extent are
/// missing (NaN).
pub fn nearest_regrid(field: &VariableField, target: &SquareGrid) -> Result<VariableField> {
    let source = field.transform();
    let values = field.values();
    let mut output = vec![f32::NAN; target.width * target.height];

    for row in 0..target.height {
        for col in 0..target.width {
            let (x, y) = target.transform.pixel_center(col, row);
            let (sx, sy) = source.coord_to_pixel(x, y);

            if sx < 0.0 || sy < 0.0 {
                continue;
            }

            let (sc, sr) = (sx.floor() as usize, sy.floor() as usize);
            if sc < field.width() && sr < field.height() {
                output[row * target.width + col] = values[sr * field.width() + sc];
            }
        }
    }

    let regridded = VariableField::new(
        field.name(),
        output,
        target.width,
        target.height,
        target.transform,
    )?;

    Ok(match field.nodata() {
        Some(nodata) => regridded.with_nodata(nodata),
        None => regridded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_grid_uses_smaller_spacing() {
        let transform = GridTransform::from_origin(0.0, 2.0, 1.0, 0.5);
        let grid = SquareGrid::for_source(&transform, 2, 4).unwrap();

        assert_eq!(grid.cell_size(), 0.5);
        assert_eq!(grid.width, 4);
        assert_eq!(grid.height, 4);
        assert!(grid.transform.is_square());
    }

    #[test]
    fn test_nearest_regrid_duplicates_wide_pixels() {
        let transform = GridTransform::from_origin(0.0, 1.0, 1.0, 0.5);
        let field = VariableField::new("u", vec![1.0, 2.0, 3.0, 4.0], 2, 2, transform).unwrap();
        let grid = SquareGrid::for_source(&transform, 2, 2).unwrap();

        let out = nearest_regrid(&field, &grid).unwrap();
        assert_eq!(out.shape(), (2, 4));
        assert_eq!(out.values(), &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn test_outside_source_is_missing() {
        let source = GridTransform::from_origin(0.0, 1.0, 1.0, 1.0);
        let field = VariableField::new("u", vec![5.0], 1, 1, source).unwrap();
        let bounds = BoundingBox::new(-1.0, 0.0, 2.0, 1.0);
        let grid = SquareGrid::covering(&bounds, 1.0, CrsCode::Epsg4326).unwrap();

        let out = nearest_regrid(&field, &grid).unwrap();
        assert_eq!(out.width(), 3);
        assert!(out.values()[0].is_nan());
        assert_eq!(out.values()[1], 5.0);
        assert!(out.values()[2].is_nan());
    }
}
