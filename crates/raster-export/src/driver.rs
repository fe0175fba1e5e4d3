//! Raster output drivers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ExportError, Result};

/// Supported single-band raster formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RasterDriver {
    /// GeoTIFF, float32, one band
    GeoTiff,
    /// ESRI ASCII grid, square cells only
    AsciiGrid,
    /// OGC GeoPackage 2D gridded coverage
    GeoPackage,
}

impl RasterDriver {
    /// All drivers, in a stable order.
    pub const ALL: [RasterDriver; 3] = [
        RasterDriver::GeoTiff,
        RasterDriver::AsciiGrid,
        RasterDriver::GeoPackage,
    ];

    /// Parse a GDAL-style driver name (case-insensitive).
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_uppercase().as_str() {
            "GTIFF" | "GEOTIFF" | "TIFF" => Ok(RasterDriver::GeoTiff),
            "AAIGRID" | "ASCII" | "ASC" => Ok(RasterDriver::AsciiGrid),
            "GPKG" | "GEOPACKAGE" => Ok(RasterDriver::GeoPackage),
            _ => Err(ExportError::UnsupportedDriver(name.to_string())),
        }
    }

    /// GDAL short name.
    pub fn name(&self) -> &'static str {
        match self {
            RasterDriver::GeoTiff => "GTiff",
            RasterDriver::AsciiGrid => "AAIGrid",
            RasterDriver::GeoPackage => "GPKG",
        }
    }

    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            RasterDriver::GeoTiff => "tiff",
            RasterDriver::AsciiGrid => "asc",
            RasterDriver::GeoPackage => "gpkg",
        }
    }
}

impl fmt::Display for RasterDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_driver_names() {
        assert_eq!(RasterDriver::parse("GTiff").unwrap(), RasterDriver::GeoTiff);
        assert_eq!(RasterDriver::parse("aaigrid").unwrap(), RasterDriver::AsciiGrid);
        assert_eq!(RasterDriver::parse("GPKG").unwrap(), RasterDriver::GeoPackage);
        assert!(matches!(
            RasterDriver::parse("netCDF"),
            Err(ExportError::UnsupportedDriver(_))
        ));
    }

    #[test]
    fn test_name_round_trip() {
        for driver in RasterDriver::ALL {
            assert_eq!(RasterDriver::parse(driver.name()).unwrap(), driver);
        }
    }

    #[test]
    fn test_extensions() {
        assert_eq!(RasterDriver::GeoTiff.extension(), "tiff");
        assert_eq!(RasterDriver::AsciiGrid.extension(), "asc");
        assert_eq!(RasterDriver::GeoPackage.extension(), "gpkg");
    }
}
