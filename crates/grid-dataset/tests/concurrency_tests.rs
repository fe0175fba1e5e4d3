//! Concurrency behaviour: per-handle read exclusion and parallel averaging.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use grid_dataset::{
    mean_of, DatasetLayout, ForecastDirection, GridDatasetSource, HandleKey, MemoryHandle, MemoryOpener,
    ReadMonitor, StudyArea, TransformCache,
};
use ocean_common::{BoundingBox, TimeInterval};
use test_utils::{
    assert_values_approx_eq, daily_axis, hourly_axis, init_test_tracing, regular_coordinates, times, utc,
};

fn hfr_handle(monitor: Option<Arc<ReadMonitor>>) -> MemoryHandle {
    let handle = MemoryHandle::new(
        hourly_axis(utc(2024, 1, 15, 0), 6),
        regular_coordinates(-125.0, 0.5, 8),
        regular_coordinates(32.0, 0.25, 8),
    )
    .unwrap()
    .with_variable_fn("u", |t, row, col| (t * 100 + row * 10 + col) as f32)
    .unwrap()
    .with_variable_fn("v", |t, row, col| (t as f32 * 0.5) - (row * col) as f32)
    .unwrap()
    .with_variable_fn("DOPx", |t, _, col| (t + col) as f32 * 0.1)
    .unwrap()
    .with_variable_fn("DOPy", |_, row, _| row as f32 * 0.3)
    .unwrap();

    match monitor {
        Some(monitor) => handle.with_monitor(monitor),
        None => handle,
    }
}

fn hfr_source(monitor: Option<Arc<ReadMonitor>>) -> GridDatasetSource {
    let opener = MemoryOpener::new().with_handle(HandleKey::new(None, "uv"), hfr_handle(monitor));
    let area = StudyArea::from_bounds(BoundingBox::new(-124.0, 32.5, -122.0, 33.25)).unwrap();
    GridDatasetSource::open(DatasetLayout::hfr(6), &opener, area, &TransformCache::new()).unwrap()
}

// ============================================================================
// Read exclusion
// ============================================================================

#[test]
fn test_reads_on_one_handle_are_serialized() {
    init_test_tracing();
    let monitor = Arc::new(ReadMonitor::with_latency(Duration::from_millis(20)));
    let source = hfr_source(Some(monitor.clone()));

    thread::scope(|scope| {
        for time_index in 0..4 {
            let source = &source;
            scope.spawn(move || source.data_at_index("u", None, time_index, None, false).unwrap());
        }
    });

    assert_eq!(monitor.peak(), 1);
    assert_eq!(monitor.reads(), 4);
}

#[test]
fn test_distinct_handles_read_in_parallel() {
    init_test_tracing();
    let monitor = Arc::new(ReadMonitor::with_latency(Duration::from_millis(300)));
    let lons = regular_coordinates(-180.0, 30.0, 12);
    let lats = vec![60.0, 30.0, 0.0, -30.0, -60.0];
    let axis = daily_axis(times::model_run_time(), 2);

    let prog = MemoryHandle::new(axis.clone(), lons.clone(), lats.clone())
        .unwrap()
        .with_variable_fn("sst", |t, row, col| (t + row + col) as f32)
        .unwrap()
        .with_monitor(monitor.clone());
    let diag = MemoryHandle::new(axis, lons, lats)
        .unwrap()
        .with_variable_fn("ssh", |_, row, _| row as f32 * 0.1)
        .unwrap()
        .with_monitor(monitor.clone());

    let opener = MemoryOpener::new()
        .with_handle(HandleKey::new(Some(ForecastDirection::Forecast), "prog"), prog)
        .with_handle(HandleKey::new(Some(ForecastDirection::Forecast), "diag"), diag);
    let area = StudyArea::from_bounds(BoundingBox::new(-100.0, -40.0, 40.0, 40.0)).unwrap();
    let source = GridDatasetSource::open(
        DatasetLayout::rtofs_2ds(times::model_run_date()),
        &opener,
        area,
        &TransformCache::new(),
    )
    .unwrap();

    let barrier = Barrier::new(2);
    thread::scope(|scope| {
        for variable in ["temp", "ssh"] {
            let (source, barrier) = (&source, &barrier);
            scope.spawn(move || {
                barrier.wait();
                source
                    .data_at_index(variable, Some(ForecastDirection::Forecast), 0, None, false)
                    .unwrap()
            });
        }
    });

    assert_eq!(monitor.peak(), 2);
    assert_eq!(monitor.reads(), 2);
}

// ============================================================================
// Parallel averaging
// ============================================================================

#[test]
fn test_parallel_average_matches_sequential_mean() {
    init_test_tracing();
    let source = hfr_source(None);
    let variables: Vec<String> = ["u", "v", "DOPx", "DOPy"].iter().map(|s| s.to_string()).collect();
    let interval = TimeInterval::new(utc(2024, 1, 15, 1), utc(2024, 1, 15, 4));

    let averaged = source.average(&variables, &interval, None, true, 4).unwrap();
    assert_eq!(averaged.len(), 4);

    for variable in &variables {
        let fields: Vec<_> = (1..=4)
            .map(|index| source.data_at_index(variable, None, index, None, true).unwrap())
            .collect();
        let expected = mean_of(&fields).unwrap();
        let actual = averaged[variable].as_ref().unwrap();

        assert_eq!(actual.name(), variable.as_str());
        assert_eq!(actual.shape(), expected.shape());
        assert_eq!(actual.transform(), expected.transform());
        assert_eq!(actual.values(), expected.values(), "mean of {}", variable);
        // and within rounding of the plain arithmetic mean
        let arithmetic: Vec<f32> = (0..expected.values().len())
            .map(|i| fields.iter().map(|f| f.values()[i] as f64).sum::<f64>() as f32 / 4.0)
            .collect();
        assert_values_approx_eq!(actual.values(), &arithmetic, 1e-3);
    }
}

#[test]
fn test_average_reports_failures_per_variable() {
    let source = hfr_source(None);
    let variables = vec!["u".to_string(), "DOPx".to_string()];
    let interval = TimeInterval::new(utc(2024, 1, 15, 0), utc(2024, 1, 15, 1));

    let averaged = source.average(&variables, &interval, Some(1), false, 2).unwrap();
    // 2-D variables have no level 1
    assert!(averaged.values().all(|result| result.is_err()));
}
