//! Dataset handles and the guard that serializes reads on each of them.
//!
//! A [`DatasetHandle`] is an open connection to one variable group of a
//! dataset (for example the `prog` group of a model's nowcast output). The
//! handle itself is not required to be thread-safe; [`GuardedHandle`] wraps
//! it in a mutex so that reads on one handle never interleave while reads on
//! different handles proceed independently.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::axis::TimeAxis;
use crate::direction::ForecastDirection;
use crate::error::{DatasetError, Result};
use crate::geometry::ReadWindow;

/// Identifies one handle within a dataset: an optional forecast direction
/// (model output only) and a variable group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleKey {
    pub direction: Option<ForecastDirection>,
    pub group: String,
}

impl HandleKey {
    pub fn new(direction: Option<ForecastDirection>, group: impl Into<String>) -> Self {
        Self {
            direction,
            group: group.into(),
        }
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(direction) => write!(f, "{}/{}", direction, self.group),
            None => f.write_str(&self.group),
        }
    }
}

/// Static description of what a handle serves.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleMetadata {
    pub time_axis: TimeAxis,
    /// Longitude of each native column
    pub longitudes: Vec<f64>,
    /// Latitude of each native row
    pub latitudes: Vec<f64>,
    /// Native variable names, with the depth level count of 3-D variables
    pub variables: BTreeMap<String, Option<usize>>,
    /// Native sentinel for missing cells, if the source uses one
    pub missing_value: Option<f32>,
}

/// A rectangular window of one time step (and level) in native order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest<'a> {
    pub variable: &'a str,
    pub time_index: usize,
    pub level: Option<usize>,
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl SliceRequest<'_> {
    /// Number of values a successful read returns.
    pub fn len(&self) -> usize {
        self.rows.len() * self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open connection to one time-indexed array source.
pub trait DatasetHandle: Send {
    /// Describe the axes and variables of this handle.
    fn metadata(&self) -> Result<HandleMetadata>;

    /// Read a window, row-major in native row and column order.
    fn read_slice(&mut self, request: &SliceRequest<'_>) -> Result<Vec<f32>>;
}

/// Opens dataset handles on demand.
pub trait DatasetOpener: Send + Sync {
    fn open(&self, key: &HandleKey) -> Result<Box<dyn DatasetHandle>>;
}

/// A handle together with its guard and a snapshot of its metadata.
///
/// Metadata is captured once at construction so callers can inspect axes
/// and coordinates without taking the guard.
pub struct GuardedHandle {
    key: HandleKey,
    metadata: HandleMetadata,
    inner: Mutex<Box<dyn DatasetHandle>>,
}

impl GuardedHandle {
    pub fn new(key: HandleKey, handle: Box<dyn DatasetHandle>) -> Result<Self> {
        let metadata = handle.metadata()?;

        if metadata.longitudes.is_empty() || metadata.latitudes.is_empty() {
            return Err(DatasetError::invalid_metadata(format!(
                "handle {} has empty coordinate arrays",
                key
            )));
        }

        Ok(Self {
            key,
            metadata,
            inner: Mutex::new(handle),
        })
    }

    pub fn key(&self) -> &HandleKey {
        &self.key
    }

    pub fn metadata(&self) -> &HandleMetadata {
        &self.metadata
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.metadata.time_axis
    }

    /// Level count for a native variable: `Ok(None)` for 2-D variables.
    pub fn levels_of(&self, variable: &str) -> Result<Option<usize>> {
        self.metadata.variables.get(variable).copied().ok_or_else(|| {
            DatasetError::invalid_metadata(format!(
                "variable '{}' not present in {}",
                variable, self.key
            ))
        })
    }

    /// Read a window while holding this handle's guard.
    pub fn read(&self, request: &SliceRequest<'_>) -> Result<Vec<f32>> {
        self.check_time_index(request.time_index)?;
        let mut handle = self.lock()?;
        self.checked_read(handle.as_mut(), request)
    }

    /// Read every column run of `window` for one time step (and level),
    /// holding the guard once for the whole window.
    pub fn read_window(
        &self,
        variable: &str,
        time_index: usize,
        level: Option<usize>,
        window: &ReadWindow,
    ) -> Result<Vec<f32>> {
        self.check_time_index(time_index)?;
        let mut handle = self.lock()?;

        window.assemble(|rows, cols| {
            let request = SliceRequest {
                variable,
                time_index,
                level,
                rows,
                cols,
            };
            self.checked_read(handle.as_mut(), &request)
        })
    }

    fn check_time_index(&self, time_index: usize) -> Result<()> {
        if time_index >= self.metadata.time_axis.len() {
            return Err(DatasetError::read_failed(format!(
                "time index {} out of range for {} ({} steps)",
                time_index,
                self.key,
                self.metadata.time_axis.len()
            )));
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn DatasetHandle>>> {
        self.inner
            .lock()
            .map_err(|_| DatasetError::read_failed(format!("guard for {} poisoned", self.key)))
    }

    fn checked_read(&self, handle: &mut dyn DatasetHandle, request: &SliceRequest<'_>) -> Result<Vec<f32>> {
        debug!(
            handle = %self.key,
            variable = request.variable,
            time_index = request.time_index,
            rows = ?request.rows,
            cols = ?request.cols,
            "Reading slice"
        );

        let values = handle.read_slice(request)?;

        if values.len() != request.len() {
            return Err(DatasetError::read_failed(format!(
                "{} returned {} values for a {}x{} window",
                self.key,
                values.len(),
                request.rows.len(),
                request.cols.len()
            )));
        }

        Ok(values)
    }
}

impl fmt::Debug for GuardedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedHandle")
            .field("key", &self.key)
            .field("times", &self.metadata.time_axis.len())
            .field("columns", &self.metadata.longitudes.len())
            .field("rows", &self.metadata.latitudes.len())
            .finish()
    }
}
