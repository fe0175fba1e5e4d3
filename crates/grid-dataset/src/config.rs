//! Configuration for raster generation.

use std::path::Path;

use raster_export::RasterDriver;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Defaults applied to raster write requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridDatasetConfig {
    /// Value written for missing cells.
    pub fill_value: f32,

    /// Averaging worker threads; 0 uses the host's available parallelism.
    pub worker_threads: usize,

    /// Crop outputs to the study area.
    pub crop: bool,

    /// Output drivers by name (GTiff, AAIGrid, GPKG).
    pub drivers: Vec<String>,

    /// Also write direction and magnitude rasters.
    pub vector_components: bool,

    /// Filename prefix; `None` uses the product name.
    pub filename_prefix: Option<String>,
}

impl Default for GridDatasetConfig {
    fn default() -> Self {
        Self {
            fill_value: -9999.0,
            worker_threads: 0,
            crop: true,
            drivers: vec!["GTiff".to_string()],
            vector_components: false,
            filename_prefix: None,
        }
    }
}

impl GridDatasetConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("OCEAN_FILL_VALUE") {
            if let Ok(fill) = val.parse() {
                config.fill_value = fill;
            }
        }

        if let Ok(val) = std::env::var("AVERAGING_WORKERS") {
            if let Ok(workers) = val.parse() {
                config.worker_threads = workers;
            }
        }

        if let Ok(val) = std::env::var("CROP_TO_STUDY_AREA") {
            config.crop = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("RASTER_DRIVERS") {
            config.drivers = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(val) = std::env::var("RASTER_FILENAME_PREFIX") {
            config.filename_prefix = Some(val).filter(|s| !s.is_empty());
        }

        config
    }

    /// Parse YAML; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| DatasetError::Config(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DatasetError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.fill_value.is_finite() {
            return Err("fill_value must be finite".to_string());
        }

        if self.drivers.is_empty() {
            return Err("at least one driver is required".to_string());
        }

        for driver in &self.drivers {
            RasterDriver::parse(driver).map_err(|e| e.to_string())?;
        }

        Ok(())
    }

    /// Worker thread count with 0 resolved to the host's parallelism.
    pub fn effective_workers(&self) -> usize {
        effective_workers(self.worker_threads)
    }
}

/// Resolve a requested worker count; 0 means one per available core.
pub fn effective_workers(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GridDatasetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fill_value, -9999.0);
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn test_partial_yaml() {
        let config = GridDatasetConfig::from_yaml_str(
            "drivers: [GTiff, AAIGrid]\nvector_components: true\nworker_threads: 3\n",
        )
        .unwrap();
        assert_eq!(config.drivers, vec!["GTiff", "AAIGrid"]);
        assert!(config.vector_components);
        assert_eq!(config.effective_workers(), 3);
        assert!(config.crop);
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.yaml");
        std::fs::write(&path, "fill_value: -1.5\nfilename_prefix: wcofs\n").unwrap();

        let config = GridDatasetConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.fill_value, -1.5);
        assert_eq!(config.filename_prefix.as_deref(), Some("wcofs"));

        assert!(matches!(
            GridDatasetConfig::from_yaml_file(dir.path().join("absent.yaml")),
            Err(DatasetError::Config(_))
        ));
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            GridDatasetConfig::from_yaml_str("fill_value: [1, 2]"),
            Err(DatasetError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_driver() {
        let config = GridDatasetConfig {
            drivers: vec!["GTiff".to_string(), "PNG".to_string()],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("PNG"));

        let empty = GridDatasetConfig {
            drivers: vec![],
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("RASTER_DRIVERS", "GTiff, GPKG");
        std::env::set_var("CROP_TO_STUDY_AREA", "false");
        let config = GridDatasetConfig::from_env();
        std::env::remove_var("RASTER_DRIVERS");
        std::env::remove_var("CROP_TO_STUDY_AREA");

        assert_eq!(config.drivers, vec!["GTiff", "GPKG"]);
        assert!(!config.crop);
    }
}
