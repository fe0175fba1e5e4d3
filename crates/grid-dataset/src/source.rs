//! The dataset source: guarded handles plus the grid they share.
//!
//! A [`GridDatasetSource`] opens every handle its [`DatasetLayout`] names,
//! keeps the ones that opened, and answers field queries against them:
//!
//! ```text
//! data(variable, time, crop)
//!   -> binding (group, native name)
//!   -> direction (model output only)
//!   -> time index on that handle's axis
//!   -> guarded window read (crop, longitude reorder, north-up rows)
//!   -> VariableField tagged with the window's transform
//! ```
//!
//! `write_rasters` averages several variables over an interval on a worker
//! pool, optionally derives direction and magnitude, and writes every field
//! once per driver.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ocean_common::{BoundingBox, GridTransform, QueryTime, TimeInterval, VariableField};
use raster_export::{ExportError, RasterDriver, RasterExporter, RasterFileName, SquareGrid};
use tracing::{debug, info, warn};

use crate::average::ConcurrentVariableAverager;
use crate::config::GridDatasetConfig;
use crate::direction::{lead_tag, select_direction, ForecastDirection};
use crate::error::{DatasetError, Result};
use crate::geometry::{GridGeometry, ReadWindow};
use crate::handle::{DatasetOpener, GuardedHandle, HandleKey};
use crate::layout::{DatasetLayout, VariableBinding};
use crate::study_area::StudyArea;
use crate::temporal::TemporalIndexResolver;
use crate::transform_cache::TransformCache;
use crate::vector::{VectorFieldDeriver, DIRECTION, MAGNITUDE};

/// Options for [`GridDatasetSource::write_rasters`].
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRequest {
    /// Start of the averaging interval (the query time for model output)
    pub start: QueryTime,
    /// End of the averaging interval; `None` means `start`
    pub end: Option<QueryTime>,
    pub crop: bool,
    pub vector_components: bool,
    /// Driver names; unknown names fail per file, not per call
    pub drivers: Vec<String>,
    pub fill_value: f32,
    /// Filename prefix; `None` uses the product name
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Depth level for 3-D variables; surface when `None`
    pub level: Option<usize>,
    /// Averaging workers; 0 uses the host's parallelism
    pub workers: usize,
}

impl RasterRequest {
    pub fn new(start: impl Into<QueryTime>) -> Self {
        Self::from_config(start, &GridDatasetConfig::default())
    }

    /// Request with defaults taken from a configuration.
    pub fn from_config(start: impl Into<QueryTime>, config: &GridDatasetConfig) -> Self {
        Self {
            start: start.into(),
            end: None,
            crop: config.crop,
            vector_components: config.vector_components,
            drivers: config.drivers.clone(),
            fill_value: config.fill_value,
            prefix: config.filename_prefix.clone(),
            suffix: None,
            level: None,
            workers: config.worker_threads,
        }
    }

    pub fn with_end(mut self, end: impl Into<QueryTime>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_vector_components(mut self, enabled: bool) -> Self {
        self.vector_components = enabled;
        self
    }

    pub fn with_drivers<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drivers = drivers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fill_value(mut self, fill_value: f32) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// The averaging interval.
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::from_query(self.start, self.end.unwrap_or(self.start))
    }
}

/// One (variable, driver) write that failed.
#[derive(Debug)]
pub struct ExportFailure {
    pub variable: String,
    pub driver: String,
    pub error: ExportError,
}

/// Outcome of a `write_rasters` call.
#[derive(Debug, Default)]
pub struct RasterWriteReport {
    /// Files written, in variable then driver order
    pub written: Vec<PathBuf>,
    /// Variables whose average could not be computed
    pub average_failures: BTreeMap<String, DatasetError>,
    /// Individual writes that failed
    pub export_failures: Vec<ExportFailure>,
}

impl RasterWriteReport {
    /// True when every requested file was written.
    pub fn is_complete(&self) -> bool {
        self.average_failures.is_empty() && self.export_failures.is_empty()
    }
}

/// Read access to one product through its open handles.
#[derive(Debug)]
pub struct GridDatasetSource {
    layout: DatasetLayout,
    handles: BTreeMap<HandleKey, GuardedHandle>,
    /// Why each handle that did not open failed
    unavailable: BTreeMap<HandleKey, String>,
    study_area: StudyArea,
    geometry: Arc<GridGeometry>,
}

impl GridDatasetSource {
    /// Open every handle of `layout`.
    ///
    /// Handles that fail to open are logged and left out. Fails with
    /// [`DatasetError::NoDataAvailable`] when none opens.
    pub fn open(
        layout: DatasetLayout,
        opener: &dyn DatasetOpener,
        study_area: StudyArea,
        cache: &TransformCache,
    ) -> Result<Self> {
        let mut handles = BTreeMap::new();
        let mut unavailable = BTreeMap::new();

        for key in layout.handle_keys() {
            match opener.open(&key).and_then(|handle| GuardedHandle::new(key.clone(), handle)) {
                Ok(handle) => {
                    handles.insert(key, handle);
                }
                Err(e) => {
                    warn!(
                        dataset = %layout.name,
                        handle = %key,
                        error = %e,
                        "Failed to open dataset handle"
                    );
                    unavailable.insert(key, e.to_string());
                }
            }
        }

        // Nowcast handles sort first, so they describe the grid when present
        let sample = handles.values().next().ok_or_else(|| {
            DatasetError::no_data(format!(
                "no {} {} handles could be opened",
                layout.name, layout.resolution
            ))
        })?;

        let metadata = sample.metadata();
        let geometry = cache.get_or_insert_with(&layout.transform_key(), || {
            GridGeometry::from_coordinates(&metadata.longitudes, &metadata.latitudes)
        })?;

        // A cached grid must match every handle, not only in size
        for handle in handles.values() {
            let metadata = handle.metadata();
            geometry
                .check_coordinates(&metadata.longitudes, &metadata.latitudes)
                .map_err(|e| DatasetError::invalid_metadata(format!("handle {}: {}", handle.key(), e)))?;
        }

        info!(
            dataset = %layout.name,
            network = %layout.network,
            resolution = %layout.resolution,
            handles = handles.len(),
            unavailable = unavailable.len(),
            width = geometry.width(),
            height = geometry.height(),
            "Opened dataset source"
        );

        Ok(Self {
            layout,
            handles,
            unavailable,
            study_area,
            geometry,
        })
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn study_area(&self) -> &StudyArea {
        &self.study_area
    }

    /// Extent of the full grid (west, south, east, north).
    pub fn bounds(&self) -> BoundingBox {
        self.geometry.bounds()
    }

    /// Absolute (x, y) cell size.
    pub fn cell_size(&self) -> (f64, f64) {
        self.geometry.cell_size()
    }

    /// Transform of uncropped fields.
    pub fn global_transform(&self) -> GridTransform {
        *self.geometry.transform()
    }

    /// Transform of fields cropped to the study area.
    pub fn study_transform(&self) -> GridTransform {
        let bounds = self.study_area.bounds();
        self.geometry.transform().with_origin(bounds.west(), bounds.north())
    }

    /// Directions with at least one open handle (model output only).
    pub fn available_directions(&self) -> Vec<ForecastDirection> {
        let mut directions: Vec<ForecastDirection> =
            self.handles.keys().filter_map(|key| key.direction).collect();
        directions.dedup();
        directions
    }

    /// Direction a query time falls in; `None` for observation products.
    pub fn direction_for(&self, time: DateTime<Utc>) -> Option<ForecastDirection> {
        self.layout
            .model_run
            .map(|reference| select_direction(reference, time, self.layout.cadence))
    }

    /// The 2-D field of `variable` at `time`, cropped to the study area when
    /// `crop` is set. 3-D variables are read at the surface level.
    pub fn data(&self, variable: &str, time: impl Into<QueryTime>, crop: bool) -> Result<VariableField> {
        self.data_at_level(variable, time, None, crop)
    }

    /// Like [`data`](Self::data), reading depth `level` of a 3-D variable.
    pub fn data_at_level(
        &self,
        variable: &str,
        time: impl Into<QueryTime>,
        level: Option<usize>,
        crop: bool,
    ) -> Result<VariableField> {
        let binding = self.layout.binding(variable)?;
        let instant = time.into().to_instant();
        let direction = self.direction_for(instant);
        let handle = self.handle(direction, &binding.group)?;

        let lookup = self.layout.cadence.truncate(instant);
        let time_index = TemporalIndexResolver::new(handle.time_axis()).index_at(lookup)?;

        self.read_field(variable, binding, handle, time_index, level, crop)
    }

    /// The field of `variable` at a raw time index of the handle for
    /// `direction` (`None` for observation products).
    pub fn data_at_index(
        &self,
        variable: &str,
        direction: Option<ForecastDirection>,
        time_index: usize,
        level: Option<usize>,
        crop: bool,
    ) -> Result<VariableField> {
        let binding = self.layout.binding(variable)?;
        let handle = self.handle(direction, &binding.group)?;
        self.read_field(variable, binding, handle, time_index, level, crop)
    }

    /// Time means of several variables over `interval`, computed in parallel.
    ///
    /// The direction (model output) is chosen from the interval start.
    /// Unknown variables fail the whole call; anything else is reported per
    /// variable.
    pub fn average(
        &self,
        variables: &[String],
        interval: &TimeInterval,
        level: Option<usize>,
        crop: bool,
        workers: usize,
    ) -> Result<BTreeMap<String, Result<VariableField>>> {
        // Daily products are indexed at midnight
        let interval = interval.truncated(self.layout.cadence);
        let direction = self.direction_for(interval.start);

        // Variables grouped by the handle they read from; each group is
        // resolved against its own time axis
        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for variable in variables {
            let binding = self.layout.binding(variable)?;
            groups.entry(binding.group.as_str()).or_default().push(variable.clone());
        }

        let averager = ConcurrentVariableAverager::new(workers)?;
        let mut results = BTreeMap::new();
        let mut first_error = None;

        for (group, members) in groups {
            let indices = self
                .handle(direction, group)
                .and_then(|handle| TemporalIndexResolver::new(handle.time_axis()).indices(&interval));

            match indices {
                Ok(indices) => {
                    results.extend(averager.average(&members, &indices, |variable, time_index| {
                        self.data_at_index(variable, direction, time_index, level, crop)
                    }));
                }
                Err(e) => {
                    for variable in &members {
                        results.insert(variable.clone(), Err(copy_error(&e)));
                    }
                    first_error.get_or_insert(e);
                }
            }
        }

        // Nothing resolved at all: report the underlying error directly
        if let Some(e) = first_error {
            if results.values().all(|r| r.is_err()) {
                return Err(e);
            }
        }

        Ok(results)
    }

    /// Average `variables` (all of the product's variables when `None`)
    /// over the request interval and write each result with every driver.
    ///
    /// Files are named `{prefix}_{variable}[_{YYYYMMDD}_{lead}][_{suffix}].{ext}`;
    /// the date and lead tag appear for model output only. Existing files
    /// are overwritten.
    pub fn write_rasters(
        &self,
        output_dir: &Path,
        variables: Option<&[String]>,
        request: &RasterRequest,
    ) -> Result<RasterWriteReport> {
        let requested: Vec<String> = match variables {
            Some(variables) => variables.to_vec(),
            None => self.layout.variable_names(),
        };
        for variable in &requested {
            self.layout.binding(variable)?;
        }

        let (drivers, bad_drivers) = parse_drivers(&request.drivers);
        if drivers.is_empty() {
            return Err(DatasetError::invalid_argument(format!(
                "no supported driver in {:?}",
                request.drivers
            )));
        }

        let components = if request.vector_components {
            Some(self.layout.vector_components.clone().ok_or_else(|| {
                DatasetError::invalid_argument(format!("{} has no vector components", self.layout.name))
            })?)
        } else {
            None
        };

        let mut to_average = requested.clone();
        if let Some((ux, uy)) = &components {
            for component in [ux, uy] {
                if !to_average.contains(component) {
                    to_average.push(component.clone());
                }
            }
        }

        let interval = request.interval();
        let mut means = self.average(&to_average, &interval, request.level, request.crop, request.workers)?;

        let mut report = RasterWriteReport::default();
        let mut outputs: Vec<VariableField> = Vec::new();

        for variable in &requested {
            match means.remove(variable) {
                Some(Ok(field)) => outputs.push(field),
                Some(Err(e)) => {
                    report.average_failures.insert(variable.clone(), e);
                }
                None => {}
            }
        }

        if let Some((ux, uy)) = &components {
            let ux_field = outputs.iter().find(|f| f.name() == ux.as_str()).cloned().or_else(|| take_ok(&mut means, ux));
            let uy_field = outputs.iter().find(|f| f.name() == uy.as_str()).cloned().or_else(|| take_ok(&mut means, uy));

            match (ux_field, uy_field) {
                (Some(ux_field), Some(uy_field)) => match VectorFieldDeriver.derive(&ux_field, &uy_field) {
                    Ok((direction, magnitude)) => {
                        outputs.push(direction);
                        outputs.push(magnitude);
                    }
                    Err(e) => {
                        report.average_failures.insert(MAGNITUDE.to_string(), copy_error(&e));
                        report.average_failures.insert(DIRECTION.to_string(), e);
                    }
                },
                _ => {
                    for name in [DIRECTION, MAGNITUDE] {
                        report.average_failures.insert(
                            name.to_string(),
                            DatasetError::no_data(format!("vector components '{}'/'{}' unavailable", ux, uy)),
                        );
                    }
                }
            }
        }

        std::fs::create_dir_all(output_dir).map_err(ExportError::from)?;

        let exporter = RasterExporter::new(request.fill_value).with_ascii_grid(SquareGrid::for_source(
            self.geometry.transform(),
            self.geometry.width(),
            self.geometry.height(),
        )?);
        let base_name = self.file_name_base(request, interval.start);

        for field in &outputs {
            let name = base_name.for_variable(field.name());
            for (driver, result) in exporter.export_all(field, output_dir, &name, &drivers) {
                match result {
                    Ok(path) => report.written.push(path),
                    Err(error) => report.export_failures.push(ExportFailure {
                        variable: field.name().to_string(),
                        driver: driver.name().to_string(),
                        error,
                    }),
                }
            }

            for bad in &bad_drivers {
                report.export_failures.push(ExportFailure {
                    variable: field.name().to_string(),
                    driver: bad.clone(),
                    error: ExportError::UnsupportedDriver(bad.clone()),
                });
            }
        }

        info!(
            dataset = %self.layout.name,
            output_dir = %output_dir.display(),
            written = report.written.len(),
            average_failures = report.average_failures.len(),
            export_failures = report.export_failures.len(),
            "Finished writing rasters"
        );

        Ok(report)
    }

    /// Write one variable at one time to `path` with a single driver.
    pub fn write_raster(
        &self,
        path: &Path,
        variable: &str,
        time: impl Into<QueryTime>,
        driver: &str,
        fill_value: f32,
        crop: bool,
    ) -> Result<()> {
        let driver = RasterDriver::parse(driver)
            .map_err(|e| DatasetError::invalid_argument(e.to_string()))?;
        let field = self.data(variable, time, crop)?;

        let exporter = RasterExporter::new(fill_value).with_ascii_grid(SquareGrid::for_source(
            self.geometry.transform(),
            self.geometry.width(),
            self.geometry.height(),
        )?);
        exporter.export_to_path(&field, path, driver)?;
        Ok(())
    }

    fn file_name_base(&self, request: &RasterRequest, start: DateTime<Utc>) -> RasterFileName {
        let prefix = request.prefix.clone().unwrap_or_else(|| self.layout.name.clone());
        let name = RasterFileName::new(prefix, "").with_suffix(request.suffix.clone());

        match self.layout.model_run {
            Some(reference) => name.with_time_tag(format!(
                "{}_{}",
                reference.format("%Y%m%d"),
                lead_tag(reference, start, self.layout.cadence)
            )),
            None => name,
        }
    }

    fn handle(&self, direction: Option<ForecastDirection>, group: &str) -> Result<&GuardedHandle> {
        let key = HandleKey::new(direction, group);

        if let Some(handle) = self.handles.get(&key) {
            return Ok(handle);
        }

        let reason = self
            .unavailable
            .get(&key)
            .cloned()
            .unwrap_or_else(|| format!("no handle for {}", key));

        match direction {
            Some(direction) => Err(DatasetError::direction_unavailable(direction, reason)),
            None => Err(DatasetError::no_data(reason)),
        }
    }

    fn read_field(
        &self,
        variable: &str,
        binding: &VariableBinding,
        handle: &GuardedHandle,
        time_index: usize,
        level: Option<usize>,
        crop: bool,
    ) -> Result<VariableField> {
        let level = match (handle.levels_of(&binding.native_name)?, level) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(DatasetError::invalid_argument(format!(
                    "'{}' has no depth levels",
                    variable
                )))
            }
            (Some(levels), requested) => {
                let level = requested.unwrap_or(0);
                if level >= levels {
                    return Err(DatasetError::invalid_argument(format!(
                        "level {} out of range for '{}' ({} levels)",
                        level, variable, levels
                    )));
                }
                Some(level)
            }
        };

        let window: ReadWindow = if crop {
            self.geometry.crop_window(self.study_area.bounds())?
        } else {
            self.geometry.full_window()
        };

        let mut values = handle.read_window(&binding.native_name, time_index, level, &window)?;

        if let Some(missing) = handle.metadata().missing_value {
            for value in values.iter_mut().filter(|v| **v == missing) {
                *value = f32::NAN;
            }
        }

        debug!(
            variable = %variable,
            handle = %handle.key(),
            time_index,
            width = window.width,
            height = window.height,
            "Read field"
        );

        Ok(VariableField::new(variable, values, window.width, window.height, window.transform)?)
    }
}

/// Split driver names into parsed drivers and names nothing handles.
fn parse_drivers(names: &[String]) -> (Vec<RasterDriver>, Vec<String>) {
    let mut drivers = Vec::new();
    let mut unknown = Vec::new();

    for name in names {
        match RasterDriver::parse(name) {
            Ok(driver) if !drivers.contains(&driver) => drivers.push(driver),
            Ok(_) => {}
            Err(_) => {
                warn!(driver = %name, "Unsupported raster driver");
                unknown.push(name.clone());
            }
        }
    }

    (drivers, unknown)
}

fn take_ok(means: &mut BTreeMap<String, Result<VariableField>>, name: &str) -> Option<VariableField> {
    means.remove(name).and_then(|result| result.ok())
}

/// Copy of an error for reporting it under several keys.
fn copy_error(error: &DatasetError) -> DatasetError {
    match error {
        DatasetError::NoDataAvailable(msg) => DatasetError::NoDataAvailable(msg.clone()),
        DatasetError::DirectionUnavailable { direction, reason } => DatasetError::DirectionUnavailable {
            direction: direction.clone(),
            reason: reason.clone(),
        },
        DatasetError::InvalidArgument(msg) => DatasetError::InvalidArgument(msg.clone()),
        DatasetError::OpenFailed(msg) => DatasetError::OpenFailed(msg.clone()),
        DatasetError::ReadFailed(msg) => DatasetError::ReadFailed(msg.clone()),
        DatasetError::InvalidMetadata(msg) => DatasetError::InvalidMetadata(msg.clone()),
        DatasetError::Config(msg) => DatasetError::Config(msg.clone()),
        DatasetError::Export(e) => DatasetError::ReadFailed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drivers_splits_unknown() {
        let names: Vec<String> = ["GTiff", "PNG", "gtiff", "AAIGrid"].iter().map(|s| s.to_string()).collect();
        let (drivers, unknown) = parse_drivers(&names);
        assert_eq!(drivers, vec![RasterDriver::GeoTiff, RasterDriver::AsciiGrid]);
        assert_eq!(unknown, vec!["PNG"]);
    }

    #[test]
    fn test_request_interval_defaults_to_start() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let request = RasterRequest::new(start);
        let interval = request.interval();
        assert_eq!(interval.start, interval.end);
        assert_eq!(request.fill_value, -9999.0);
        assert_eq!(request.drivers, vec!["GTiff"]);
    }
}
