//! Common types shared across the ocean raster workspace.
//!
//! Everything here is plain data: bounding boxes, coordinate reference
//! systems, grid transforms, query times and the [`VariableField`] that
//! carries a 2-D array together with the transform it is referenced against.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod field;
pub mod time;
pub mod transform;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{FieldError, FieldResult};
pub use field::VariableField;
pub use time::{Cadence, QueryTime, TimeInterval};
pub use transform::GridTransform;
