//! Direction and magnitude from orthogonal vector components.

use std::f64::consts::PI;

use ocean_common::VariableField;

use crate::error::{DatasetError, Result};

/// Output variable name for vector direction.
pub const DIRECTION: &str = "dir";
/// Output variable name for vector magnitude.
pub const MAGNITUDE: &str = "mag";

/// Derives direction and magnitude fields from (Ux, Uy) component fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorFieldDeriver;

impl VectorFieldDeriver {
    /// Direction in degrees, `(atan2(ux, uy) + pi) * 180 / pi`, in 0..360.
    ///
    /// For currents this is the direction the flow comes from: northward
    /// flow (0, 1) gives 180.
    pub fn direction(ux: f64, uy: f64) -> f64 {
        (ux.atan2(uy) + PI) * (180.0 / PI)
    }

    pub fn magnitude(ux: f64, uy: f64) -> f64 {
        ux.hypot(uy)
    }

    /// Direction and magnitude fields, named [`DIRECTION`] and
    /// [`MAGNITUDE`], on the components' transform. A cell missing in
    /// either component is NaN in both outputs.
    pub fn derive(&self, ux: &VariableField, uy: &VariableField) -> Result<(VariableField, VariableField)> {
        if !ux.is_aligned_with(uy) {
            return Err(DatasetError::invalid_argument(format!(
                "vector components '{}' {:?} and '{}' {:?} are not on the same grid",
                ux.name(),
                ux.shape(),
                uy.name(),
                uy.shape()
            )));
        }

        let (directions, magnitudes): (Vec<f32>, Vec<f32>) = ux
            .values()
            .iter()
            .zip(uy.values())
            .map(|(&x, &y)| {
                if ux.is_missing(x) || uy.is_missing(y) {
                    (f32::NAN, f32::NAN)
                } else {
                    let (x, y) = (x as f64, y as f64);
                    (Self::direction(x, y) as f32, Self::magnitude(x, y) as f32)
                }
            })
            .unzip();

        let direction = VariableField::new(DIRECTION, directions, ux.width(), ux.height(), *ux.transform())?;
        let magnitude = VariableField::new(MAGNITUDE, magnitudes, ux.width(), ux.height(), *ux.transform())?;

        Ok((direction, magnitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocean_common::GridTransform;

    fn transform() -> GridTransform {
        GridTransform::from_origin(-123.0, 38.0, 0.5, 0.5)
    }

    #[test]
    fn test_cardinal_directions() {
        assert!((VectorFieldDeriver::direction(0.0, 1.0) - 180.0).abs() < 1e-9);
        assert!((VectorFieldDeriver::direction(1.0, 0.0) - 270.0).abs() < 1e-9);
        assert!((VectorFieldDeriver::direction(0.0, -1.0) - 360.0).abs() < 1e-9);
        assert!((VectorFieldDeriver::direction(-1.0, 0.0) - 90.0).abs() < 1e-9);
        assert!((VectorFieldDeriver::magnitude(3.0, 4.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_in_either_input() {
        let ux = VariableField::new("u", vec![0.0, f32::NAN, 1.0], 3, 1, transform()).unwrap();
        let uy = VariableField::new("v", vec![1.0, 1.0, -9999.0], 3, 1, transform())
            .unwrap()
            .with_nodata(-9999.0);

        let (dir, mag) = VectorFieldDeriver.derive(&ux, &uy).unwrap();
        assert_eq!(dir.name(), "dir");
        assert_eq!(mag.name(), "mag");
        assert_eq!(dir.values()[0], 180.0);
        assert_eq!(mag.values()[0], 1.0);
        assert!(dir.values()[1].is_nan() && mag.values()[1].is_nan());
        assert!(dir.values()[2].is_nan() && mag.values()[2].is_nan());
        assert_eq!(dir.transform(), ux.transform());
    }

    #[test]
    fn test_misaligned_components_rejected() {
        let ux = VariableField::new("u", vec![0.0; 2], 2, 1, transform()).unwrap();
        let uy = VariableField::new("v", vec![0.0; 2], 2, 1, transform().with_origin(0.0, 0.0)).unwrap();
        assert!(matches!(
            VectorFieldDeriver.derive(&ux, &uy),
            Err(DatasetError::InvalidArgument(_))
        ));
    }
}
