//! Error types for constructing shared values.

use thiserror::Error;

/// Result type alias using FieldError.
pub type FieldResult<T> = Result<T, FieldError>;

/// Errors raised when a field or transform is built from inconsistent parts.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("field '{name}' has {actual} values but shape {height}x{width} needs {expected}")]
    ShapeMismatch {
        name: String,
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("field '{0}' is empty")]
    Empty(String),

    #[error("invalid coordinate array: {0}")]
    InvalidCoordinates(String),

    #[error("invalid pixel size: {0}")]
    InvalidPixelSize(String),
}
