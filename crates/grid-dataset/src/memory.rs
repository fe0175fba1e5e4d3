//! In-memory dataset handles.
//!
//! Useful for tests and for feeding data that was decoded elsewhere through
//! the same read path as a remote dataset. A [`ReadMonitor`] can be attached to
//! count concurrent readers and slow reads down.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::axis::TimeAxis;
use crate::error::{DatasetError, Result};
use crate::handle::{DatasetHandle, DatasetOpener, HandleKey, HandleMetadata, SliceRequest};

/// Read instrumentation shared between handles.
#[derive(Debug, Default)]
pub struct ReadMonitor {
    active: AtomicUsize,
    peak: AtomicUsize,
    reads: AtomicUsize,
    latency: Duration,
}

impl ReadMonitor {
    /// A monitor that holds every read for `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Highest number of reads observed in flight at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Completed reads.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct MemoryVariable {
    /// (time, level, row, col) order; level dimension is 1 for 2-D variables
    values: Arc<Vec<f32>>,
    levels: Option<usize>,
}

/// A handle backed by arrays in memory.
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    time_axis: TimeAxis,
    longitudes: Vec<f64>,
    latitudes: Vec<f64>,
    variables: BTreeMap<String, MemoryVariable>,
    missing_value: Option<f32>,
    monitor: Option<Arc<ReadMonitor>>,
}

impl MemoryHandle {
    pub fn new(times: Vec<DateTime<Utc>>, longitudes: Vec<f64>, latitudes: Vec<f64>) -> Result<Self> {
        Ok(Self {
            time_axis: TimeAxis::new(times)?,
            longitudes,
            latitudes,
            variables: BTreeMap::new(),
            missing_value: None,
            monitor: None,
        })
    }

    /// Add a 2-D variable stored as (time, row, col).
    pub fn with_variable(self, name: impl Into<String>, values: Vec<f32>) -> Result<Self> {
        self.insert(name.into(), values, None)
    }

    /// Add a 3-D variable stored as (time, level, row, col).
    pub fn with_levels(self, name: impl Into<String>, levels: usize, values: Vec<f32>) -> Result<Self> {
        if levels == 0 {
            return Err(DatasetError::invalid_metadata("level count must be > 0"));
        }
        self.insert(name.into(), values, Some(levels))
    }

    /// Add a 2-D variable computed from `(time, row, col)`.
    pub fn with_variable_fn<F>(self, name: impl Into<String>, f: F) -> Result<Self>
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        let (nt, ny, nx) = (self.time_axis.len(), self.latitudes.len(), self.longitudes.len());
        let mut values = Vec::with_capacity(nt * ny * nx);
        for t in 0..nt {
            for row in 0..ny {
                for col in 0..nx {
                    values.push(f(t, row, col));
                }
            }
        }
        self.with_variable(name, values)
    }

    /// Native sentinel for missing cells.
    pub fn with_missing_value(mut self, missing_value: f32) -> Self {
        self.missing_value = Some(missing_value);
        self
    }

    /// Attach read instrumentation.
    pub fn with_monitor(mut self, monitor: Arc<ReadMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    fn insert(mut self, name: String, values: Vec<f32>, levels: Option<usize>) -> Result<Self> {
        let expected = self.time_axis.len()
            * levels.unwrap_or(1)
            * self.latitudes.len()
            * self.longitudes.len();

        if values.len() != expected {
            return Err(DatasetError::invalid_metadata(format!(
                "variable '{}' has {} values, expected {}",
                name,
                values.len(),
                expected
            )));
        }

        self.variables.insert(
            name,
            MemoryVariable {
                values: Arc::new(values),
                levels,
            },
        );
        Ok(self)
    }
}

impl DatasetHandle for MemoryHandle {
    fn metadata(&self) -> Result<HandleMetadata> {
        Ok(HandleMetadata {
            time_axis: self.time_axis.clone(),
            longitudes: self.longitudes.clone(),
            latitudes: self.latitudes.clone(),
            variables: self
                .variables
                .iter()
                .map(|(name, variable)| (name.clone(), variable.levels))
                .collect(),
            missing_value: self.missing_value,
        })
    }

    fn read_slice(&mut self, request: &SliceRequest<'_>) -> Result<Vec<f32>> {
        let variable = self.variables.get(request.variable).ok_or_else(|| {
            DatasetError::read_failed(format!("no variable '{}'", request.variable))
        })?;

        let (ny, nx) = (self.latitudes.len(), self.longitudes.len());
        if request.rows.end > ny || request.cols.end > nx {
            return Err(DatasetError::read_failed(format!(
                "window rows {:?} cols {:?} outside {}x{} grid",
                request.rows, request.cols, ny, nx
            )));
        }

        let level_count = variable.levels.unwrap_or(1);
        let level = request.level.unwrap_or(0);
        if level >= level_count {
            return Err(DatasetError::read_failed(format!(
                "level {} out of range ({} levels)",
                level, level_count
            )));
        }

        if let Some(monitor) = &self.monitor {
            monitor.enter();
        }

        let plane = (request.time_index * level_count + level) * ny * nx;
        let mut out = Vec::with_capacity(request.len());
        for row in request.rows.clone() {
            let start = plane + row * nx;
            out.extend_from_slice(&variable.values[start + request.cols.start..start + request.cols.end]);
        }

        if let Some(monitor) = &self.monitor {
            monitor.exit();
        }

        Ok(out)
    }
}

/// Opens [`MemoryHandle`]s registered under handle keys.
#[derive(Debug, Default)]
pub struct MemoryOpener {
    handles: HashMap<HandleKey, MemoryHandle>,
    failing: HashSet<HandleKey>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(mut self, key: HandleKey, handle: MemoryHandle) -> Self {
        self.handles.insert(key, handle);
        self
    }

    /// Make opening `key` fail even if a handle is registered for it.
    pub fn with_failure(mut self, key: HandleKey) -> Self {
        self.failing.insert(key);
        self
    }
}

impl DatasetOpener for MemoryOpener {
    fn open(&self, key: &HandleKey) -> Result<Box<dyn DatasetHandle>> {
        if self.failing.contains(key) {
            return Err(DatasetError::open_failed(format!("{} unreachable", key)));
        }

        self.handles
            .get(key)
            .cloned()
            .map(|handle| Box::new(handle) as Box<dyn DatasetHandle>)
            .ok_or_else(|| DatasetError::open_failed(format!("{} not found", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn handle() -> MemoryHandle {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        MemoryHandle::new(vec![t0, t0 + chrono::Duration::hours(1)], vec![0.0, 1.0, 2.0], vec![10.0, 11.0])
            .unwrap()
            .with_variable_fn("u", |t, row, col| (t * 100 + row * 10 + col) as f32)
            .unwrap()
    }

    #[test]
    fn test_read_window() {
        let mut handle = handle();
        let values = handle
            .read_slice(&SliceRequest {
                variable: "u",
                time_index: 1,
                level: None,
                rows: 0..2,
                cols: 1..3,
            })
            .unwrap();
        assert_eq!(values, vec![101.0, 102.0, 111.0, 112.0]);
    }

    #[test]
    fn test_levels() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let mut handle = MemoryHandle::new(vec![t0], vec![0.0, 1.0], vec![0.0])
            .unwrap()
            .with_levels("temp", 2, vec![1.0, 2.0, 3.0, 4.0])
            .unwrap();

        let request = |level| SliceRequest {
            variable: "temp",
            time_index: 0,
            level,
            rows: 0..1,
            cols: 0..2,
        };
        assert_eq!(handle.read_slice(&request(None)).unwrap(), vec![1.0, 2.0]);
        assert_eq!(handle.read_slice(&request(Some(1))).unwrap(), vec![3.0, 4.0]);
        assert!(handle.read_slice(&request(Some(2))).is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let result = MemoryHandle::new(vec![t0], vec![0.0, 1.0], vec![0.0])
            .unwrap()
            .with_variable("u", vec![1.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_opener_failures() {
        let key = HandleKey::new(None, "uv");
        let opener = MemoryOpener::new()
            .with_handle(key.clone(), handle())
            .with_failure(HandleKey::new(None, "dop"));

        assert!(opener.open(&key).is_ok());
        assert!(matches!(
            opener.open(&HandleKey::new(None, "dop")),
            Err(DatasetError::OpenFailed(_))
        ));
        assert!(opener.open(&HandleKey::new(None, "other")).is_err());
    }
}
