//! Named 2-D raster fields.

use crate::error::{FieldError, FieldResult};
use crate::GridTransform;

/// A named 2-D field of values, row-major with row 0 at the north.
///
/// Missing cells are NaN. When `nodata` is set, cells equal to it are also
/// treated as missing.
#[derive(Debug, Clone)]
pub struct VariableField {
    name: String,
    data: Vec<f32>,
    width: usize,
    height: usize,
    nodata: Option<f32>,
    transform: GridTransform,
}

impl VariableField {
    /// Create a field, validating that the data matches the shape.
    pub fn new(
        name: impl Into<String>,
        data: Vec<f32>,
        width: usize,
        height: usize,
        transform: GridTransform,
    ) -> FieldResult<Self> {
        let name = name.into();
        let expected = width * height;

        if expected == 0 {
            return Err(FieldError::Empty(name));
        }

        if data.len() != expected {
            return Err(FieldError::ShapeMismatch {
                name,
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            name,
            data,
            width,
            height,
            nodata: None,
            transform,
        })
    }

    /// Attach a nodata sentinel.
    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Same values under a different name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// (height, width), matching row-major order.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Value at (col, row), or `None` outside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// True when the value is NaN or equals the nodata sentinel.
    pub fn is_missing(&self, value: f32) -> bool {
        value.is_nan() || self.nodata.map_or(false, |nodata| value == nodata)
    }

    /// Values with every missing cell replaced by NaN.
    pub fn values_with_nan(&self) -> Vec<f32> {
        self.data
            .iter()
            .map(|&v| if self.is_missing(v) { f32::NAN } else { v })
            .collect()
    }

    /// Count of non-missing cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_missing(v)).count()
    }

    /// Min/max over non-missing cells.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|&v| !self.is_missing(v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// True when both fields have the same shape and georeferencing.
    pub fn is_aligned_with(&self, other: &VariableField) -> bool {
        self.shape() == other.shape() && self.transform.approx_eq(&other.transform, 1e-9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> GridTransform {
        GridTransform::from_origin(-10.0, 10.0, 1.0, 1.0)
    }

    #[test]
    fn test_shape_validation() {
        assert!(VariableField::new("sst", vec![0.0; 6], 3, 2, transform()).is_ok());

        let err = VariableField::new("sst", vec![0.0; 5], 3, 2, transform()).unwrap_err();
        assert!(matches!(err, FieldError::ShapeMismatch { expected: 6, actual: 5, .. }));

        assert!(matches!(
            VariableField::new("sst", vec![], 0, 2, transform()),
            Err(FieldError::Empty(_))
        ));
    }

    #[test]
    fn test_missing_values() {
        let field = VariableField::new("u", vec![1.0, f32::NAN, -9999.0, 4.0], 2, 2, transform())
            .unwrap()
            .with_nodata(-9999.0);

        assert!(field.is_missing(f32::NAN));
        assert!(field.is_missing(-9999.0));
        assert!(!field.is_missing(0.0));
        assert_eq!(field.valid_count(), 2);
        assert_eq!(field.value_range(), Some((1.0, 4.0)));
        assert!(field.values_with_nan()[2].is_nan());
    }

    #[test]
    fn test_get_and_rename() {
        let field = VariableField::new("u", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2, transform())
            .unwrap();
        assert_eq!(field.get(2, 1), Some(6.0));
        assert_eq!(field.get(3, 0), None);

        let renamed = field.renamed("mag");
        assert_eq!(renamed.name(), "mag");
        assert_eq!(renamed.shape(), (2, 3));
    }
}
