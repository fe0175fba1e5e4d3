//! Error types for dataset access.

use raster_export::ExportError;
use thiserror::Error;

/// Errors that can occur while reading, averaging or exporting dataset fields.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Nothing to read: no handle could be opened, or the requested time
    /// interval has no matching timestamps.
    #[error("no data available: {0}")]
    NoDataAvailable(String),

    /// The forecast direction chosen for a query has no open handle.
    #[error("{direction} data unavailable: {reason}")]
    DirectionUnavailable { direction: String, reason: String },

    /// Unknown variable, direction or driver; retrying the same call will not help.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A dataset handle could not be opened.
    #[error("failed to open dataset: {0}")]
    OpenFailed(String),

    /// Failed to read data through an open handle.
    #[error("failed to read dataset: {0}")]
    ReadFailed(String),

    /// Coordinates, axes or shapes reported by a handle are unusable.
    #[error("invalid dataset metadata: {0}")]
    InvalidMetadata(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Raster export error.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

impl DatasetError {
    /// Create a NoDataAvailable error.
    pub fn no_data(msg: impl Into<String>) -> Self {
        Self::NoDataAvailable(msg.into())
    }

    /// Create a DirectionUnavailable error.
    pub fn direction_unavailable(direction: impl ToString, reason: impl Into<String>) -> Self {
        Self::DirectionUnavailable {
            direction: direction.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// True for conditions a caller can expect to clear up on its own, such
    /// as data not yet published for the requested time.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoDataAvailable(_) | Self::DirectionUnavailable { .. }
        )
    }
}

impl From<ocean_common::FieldError> for DatasetError {
    fn from(err: ocean_common::FieldError) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(err: std::io::Error) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
