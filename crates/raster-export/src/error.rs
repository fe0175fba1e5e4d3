//! Error types for raster export.

use thiserror::Error;

/// Errors that can occur while writing or reading a raster file.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Driver name not recognised.
    #[error("unsupported raster driver: {0}")]
    UnsupportedDriver(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF encoding/decoding error.
    #[error("TIFF error: {0}")]
    Tiff(String),

    /// SQLite/GeoPackage error.
    #[error("GeoPackage error: {0}")]
    GeoPackage(String),

    /// Transform or shape unusable for the target format.
    #[error("invalid raster geometry: {0}")]
    InvalidGeometry(String),

    /// ASCII grids need identical x and y cell sizes.
    #[error("ASCII grid needs square cells, got {x} x {y}")]
    NonSquareCells { x: f64, y: f64 },
}

impl ExportError {
    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }
}

impl From<tiff::TiffError> for ExportError {
    fn from(err: tiff::TiffError) -> Self {
        Self::Tiff(err.to_string())
    }
}

impl From<rusqlite::Error> for ExportError {
    fn from(err: rusqlite::Error) -> Self {
        Self::GeoPackage(err.to_string())
    }
}

impl From<ocean_common::FieldError> for ExportError {
    fn from(err: ocean_common::FieldError) -> Self {
        Self::InvalidGeometry(err.to_string())
    }
}

/// Result type for raster export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
