//! Georeferenced raster output for 2-D ocean fields.
//!
//! Supported formats:
//! - **GeoTIFF**: float32, one band, GeoTIFF geokeys plus GDAL_NODATA
//! - **ESRI ASCII grid**: square cells only; fields are regridded by nearest
//!   neighbour when their pixels are rectangular
//! - **GeoPackage**: OGC 2D gridded coverage with a single float TIFF tile
//!
//! Missing cells (NaN or the field's own nodata value) are written as the
//! exporter's fill value in every format.

pub mod ascii_grid;
pub mod driver;
pub mod error;
pub mod exporter;
pub mod geotiff;
pub mod gpkg;
pub mod regrid;

pub use ascii_grid::{read_ascii_grid, write_ascii_grid};
pub use driver::RasterDriver;
pub use error::{ExportError, Result};
pub use exporter::{RasterExporter, RasterFileName};
pub use geotiff::{read_geotiff, write_geotiff};
pub use gpkg::{read_geopackage, write_geopackage};
pub use regrid::{nearest_regrid, SquareGrid};
