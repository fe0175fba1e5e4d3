//! Time-indexed gridded ocean datasets: access, averaging and raster export.
//!
//! A [`GridDatasetSource`] owns one guarded handle per variable group (and
//! per forecast direction for model output). It resolves query times to
//! native time indices, reads north-up fields cropped to a [`StudyArea`],
//! averages several variables in parallel and writes the results through
//! [`raster_export`].
//!
//! # Example
//!
//! ```rust,ignore
//! use grid_dataset::{DatasetLayout, GridDatasetSource, RasterRequest, StudyArea, TransformCache};
//!
//! let cache = TransformCache::new();
//! let study_area = StudyArea::from_geojson_file("study_area.geojson")?;
//! let source = GridDatasetSource::open(DatasetLayout::hfr(6), &opener, study_area, &cache)?;
//!
//! let request = RasterRequest::new(start)
//!     .with_end(end)
//!     .with_vector_components(true)
//!     .with_drivers(["GTiff", "AAIGrid"]);
//! let report = source.write_rasters(output_dir, None, &request)?;
//! ```

pub mod average;
pub mod axis;
pub mod config;
pub mod direction;
pub mod error;
pub mod geometry;
pub mod handle;
pub mod layout;
pub mod memory;
pub mod source;
pub mod study_area;
pub mod temporal;
pub mod transform_cache;
pub mod vector;

pub use average::{mean_of, ConcurrentVariableAverager};
pub use axis::TimeAxis;
pub use config::GridDatasetConfig;
pub use direction::{lead_tag, select_direction, ForecastDirection};
pub use error::{DatasetError, Result};
pub use geometry::{normalize_longitude, GridGeometry, ReadWindow};
pub use handle::{DatasetHandle, DatasetOpener, GuardedHandle, HandleKey, HandleMetadata, SliceRequest};
pub use layout::{DatasetLayout, VariableBinding};
pub use memory::{MemoryHandle, MemoryOpener, ReadMonitor};
pub use source::{ExportFailure, GridDatasetSource, RasterRequest, RasterWriteReport};
pub use study_area::StudyArea;
pub use temporal::TemporalIndexResolver;
pub use transform_cache::{CacheStats, TransformCache, TransformKey};
pub use vector::VectorFieldDeriver;
