//! Tests for bounding boxes and grid transforms working together.

use ocean_common::bbox::{BboxParseError, BoundingBox};
use ocean_common::transform::mean_spacing;
use ocean_common::{CrsCode, GridTransform};

// ============================================================================
// BoundingBox parsing
// ============================================================================

#[test]
fn test_parse_bbox_floating() {
    let bbox = BoundingBox::from_csv_string("-125.5,24.75,-66.25,50.125").unwrap();
    assert!((bbox.min_x - (-125.5)).abs() < 0.001);
    assert!((bbox.min_y - 24.75).abs() < 0.001);
    assert!((bbox.max_x - (-66.25)).abs() < 0.001);
    assert!((bbox.max_y - 50.125).abs() < 0.001);
}

#[test]
fn test_parse_bbox_wrong_count() {
    let result = BoundingBox::from_csv_string("0,0,10");
    assert!(matches!(result, Err(BboxParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_bbox_bad_number() {
    let result = BoundingBox::from_csv_string("0,abc,10,10");
    assert!(matches!(result, Err(BboxParseError::InvalidNumber(_))));
}

#[test]
fn test_parse_bbox_inverted_latitudes() {
    let result = BoundingBox::from_csv_string("0,10,10,0");
    assert!(matches!(result, Err(BboxParseError::Inverted(_))));
}

// ============================================================================
// BoundingBox geometry
// ============================================================================

#[test]
fn test_contains_point_edges_inclusive() {
    let bbox = BoundingBox::new(-10.0, -5.0, 10.0, 5.0);
    assert!(bbox.contains_point(-10.0, 5.0));
    assert!(bbox.contains_point(0.0, 0.0));
    assert!(!bbox.contains_point(10.1, 0.0));
}

#[test]
fn test_touching_boxes_do_not_intersect() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
    assert!(!a.intersects(&b));
    assert!(a.intersection(&b).is_none());
}

#[test]
fn test_antimeridian_detection() {
    assert!(BoundingBox::new(170.0, -10.0, -170.0, 10.0).crosses_antimeridian());
    assert!(!BoundingBox::new(-170.0, -10.0, 170.0, 10.0).crosses_antimeridian());
}

// ============================================================================
// GridTransform
// ============================================================================

#[test]
fn test_transform_bounds_round_trip() {
    let lon: Vec<f64> = (0..11).map(|i| -80.0 + i as f64 * 0.1).collect();
    let lat: Vec<f64> = (0..6).map(|i| 30.0 + i as f64 * 0.1).collect();
    let transform = GridTransform::from_coordinates(&lon, &lat).unwrap();

    let bounds = transform.bounds(lon.len(), lat.len());
    assert!((bounds.west() - (-80.0)).abs() < 1e-9);
    assert!((bounds.north() - 30.5).abs() < 1e-9);
    assert!((bounds.width() - 1.1).abs() < 1e-9);
    assert!((bounds.height() - 0.6).abs() < 1e-9);
}

#[test]
fn test_mean_spacing_irregular() {
    let spacing = mean_spacing(&[0.0, 1.0, 3.0]).unwrap();
    assert!((spacing - 1.5).abs() < 1e-12);
    assert!(mean_spacing(&[2.0, 2.0, 2.0]).is_err());
}

#[test]
fn test_with_origin_keeps_pixel_sizes() {
    let transform = GridTransform::from_origin(0.0, 0.0, 0.25, 0.5).with_crs(CrsCode::Epsg4269);
    let moved = transform.with_origin(-70.0, 40.0);
    assert_eq!(moved.pixel_width, 0.25);
    assert_eq!(moved.pixel_height, 0.5);
    assert_eq!(moved.crs, CrsCode::Epsg4269);
    assert_eq!(moved.pixel_center(0, 0), (-69.875, 39.75));
}

#[test]
fn test_approx_eq_tolerance() {
    let a = GridTransform::from_origin(-70.0, 40.0, 0.1, 0.1);
    let b = GridTransform::from_origin(-70.0 + 1e-12, 40.0, 0.1, 0.1);
    let c = GridTransform::from_origin(-70.1, 40.0, 0.1, 0.1);
    assert!(a.approx_eq(&b, 1e-9));
    assert!(!a.approx_eq(&c, 1e-9));
}
