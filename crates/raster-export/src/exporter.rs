//! Driver dispatch and output naming.

use std::path::{Path, PathBuf};

use ocean_common::VariableField;
use tracing::{info, warn};

use crate::ascii_grid::write_ascii_grid;
use crate::driver::RasterDriver;
use crate::error::Result;
use crate::geotiff::write_geotiff;
use crate::gpkg::write_geopackage;
use crate::regrid::{nearest_regrid, SquareGrid};

/// Deterministic output file name parts.
///
/// Files are named `{prefix}_{variable}[_{time_tag}][_{suffix}].{ext}`; an
/// empty prefix is left out together with its separator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RasterFileName {
    pub prefix: String,
    pub variable: String,
    pub time_tag: Option<String>,
    pub suffix: Option<String>,
}

impl RasterFileName {
    pub fn new(prefix: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            variable: variable.into(),
            time_tag: None,
            suffix: None,
        }
    }

    pub fn with_time_tag(mut self, tag: impl Into<String>) -> Self {
        self.time_tag = Some(tag.into());
        self
    }

    pub fn with_suffix(mut self, suffix: Option<String>) -> Self {
        self.suffix = suffix.filter(|s| !s.is_empty());
        self
    }

    /// Same name parts for a different variable.
    pub fn for_variable(&self, variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            ..self.clone()
        }
    }

    /// File name for a driver.
    pub fn file_name(&self, driver: RasterDriver) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(4);
        if !self.prefix.is_empty() {
            parts.push(&self.prefix);
        }
        parts.push(&self.variable);
        if let Some(tag) = &self.time_tag {
            parts.push(tag);
        }
        if let Some(suffix) = &self.suffix {
            parts.push(suffix);
        }

        format!("{}.{}", parts.join("_"), driver.extension())
    }
}

/// Writes fields to disk, one file per driver.
#[derive(Debug, Clone)]
pub struct RasterExporter {
    fill_value: f32,
    ascii_grid: Option<SquareGrid>,
}

impl RasterExporter {
    pub fn new(fill_value: f32) -> Self {
        Self {
            fill_value,
            ascii_grid: None,
        }
    }

    /// Regrid ASCII output onto this square grid instead of the field's own
    /// extent.
    pub fn with_ascii_grid(mut self, grid: SquareGrid) -> Self {
        self.ascii_grid = Some(grid);
        self
    }

    pub fn fill_value(&self) -> f32 {
        self.fill_value
    }

    /// Write a field with one driver. Returns the path written.
    pub fn export(
        &self,
        field: &VariableField,
        output_dir: &Path,
        name: &RasterFileName,
        driver: RasterDriver,
    ) -> Result<PathBuf> {
        let path = output_dir.join(name.file_name(driver));
        self.export_to_path(field, &path, driver)?;
        Ok(path)
    }

    /// Write a field with one driver to an explicit path, replacing any
    /// existing file.
    pub fn export_to_path(&self, field: &VariableField, path: &Path, driver: RasterDriver) -> Result<()> {
        match driver {
            RasterDriver::GeoTiff => write_geotiff(path, field, self.fill_value)?,
            RasterDriver::GeoPackage => write_geopackage(path, field, self.fill_value)?,
            RasterDriver::AsciiGrid => {
                let grid = match self.ascii_grid {
                    Some(grid) => grid,
                    None => SquareGrid::for_source(field.transform(), field.width(), field.height())?,
                };
                let regridded = nearest_regrid(field, &grid)?;
                write_ascii_grid(path, &regridded, self.fill_value)?;
            }
        }

        info!(
            variable = %field.name(),
            driver = %driver,
            path = %path.display(),
            "Wrote raster"
        );

        Ok(())
    }

    /// Write a field with every driver. A failing driver does not stop the
    /// others; results come back in driver order.
    pub fn export_all(
        &self,
        field: &VariableField,
        output_dir: &Path,
        name: &RasterFileName,
        drivers: &[RasterDriver],
    ) -> Vec<(RasterDriver, Result<PathBuf>)> {
        drivers
            .iter()
            .map(|&driver| {
                let result = self.export(field, output_dir, name, driver);
                if let Err(e) = &result {
                    warn!(
                        variable = %field.name(),
                        driver = %driver,
                        error = %e,
                        "Raster export failed"
                    );
                }
                (driver, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_with_all_parts() {
        let name = RasterFileName::new("rtofs", "sst")
            .with_time_tag("20240115_f001")
            .with_suffix(Some("avg".to_string()));
        assert_eq!(
            name.file_name(RasterDriver::GeoTiff),
            "rtofs_sst_20240115_f001_avg.tiff"
        );
    }

    #[test]
    fn test_file_name_minimal() {
        let name = RasterFileName::new("hfr", "dir");
        assert_eq!(name.file_name(RasterDriver::AsciiGrid), "hfr_dir.asc");

        let bare = RasterFileName::new("", "u").with_suffix(Some(String::new()));
        assert_eq!(bare.file_name(RasterDriver::GeoPackage), "u.gpkg");
    }

    #[test]
    fn test_for_variable_keeps_other_parts() {
        let name = RasterFileName::new("hfr", "u").with_suffix(Some("6km".to_string()));
        assert_eq!(
            name.for_variable("mag").file_name(RasterDriver::GeoTiff),
            "hfr_mag_6km.tiff"
        );
    }
}
