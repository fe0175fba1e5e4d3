//! Study areas: the polygon outputs are cropped to, reduced to its bbox.

use std::path::Path;

use ocean_common::BoundingBox;
use serde::Deserialize;

use crate::error::{DatasetError, Result};

/// GeoJSON objects a study area can be read from.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
    Feature {
        geometry: Option<Box<GeoJson>>,
    },
    FeatureCollection {
        features: Vec<GeoJson>,
    },
    #[serde(other)]
    Unsupported,
}

impl GeoJson {
    /// Exterior ring of the first polygon found.
    fn first_polygon(self) -> Option<Vec<[f64; 2]>> {
        match self {
            GeoJson::Polygon { coordinates } => coordinates.into_iter().next(),
            GeoJson::MultiPolygon { coordinates } => coordinates
                .into_iter()
                .next()
                .and_then(|polygon| polygon.into_iter().next()),
            GeoJson::Feature { geometry } => geometry.and_then(|g| g.first_polygon()),
            GeoJson::FeatureCollection { features } => {
                features.into_iter().find_map(GeoJson::first_polygon)
            }
            GeoJson::Unsupported => None,
        }
    }
}

/// Area of interest outputs are cropped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudyArea {
    bounds: BoundingBox,
}

impl StudyArea {
    /// Study area from bounds; longitudes in 0..360 are shifted to -180..180.
    pub fn from_bounds(bounds: BoundingBox) -> Result<Self> {
        let bounds = bounds.to_signed_longitudes();

        if bounds.crosses_antimeridian() || bounds.west() < -180.0 || bounds.east() > 180.0 {
            return Err(DatasetError::invalid_argument(format!(
                "study areas crossing the antimeridian are not supported: ({}, {}, {}, {})",
                bounds.west(),
                bounds.south(),
                bounds.east(),
                bounds.north()
            )));
        }
        if bounds.south() >= bounds.north() || bounds.west() >= bounds.east() {
            return Err(DatasetError::invalid_argument(format!(
                "study area is empty: ({}, {}, {}, {})",
                bounds.west(),
                bounds.south(),
                bounds.east(),
                bounds.north()
            )));
        }

        Ok(Self { bounds })
    }

    /// Bounding box of a polygon ring given as (x, y) pairs.
    pub fn from_polygon(ring: &[(f64, f64)]) -> Result<Self> {
        let bounds = BoundingBox::from_points(ring.iter().copied())
            .ok_or_else(|| DatasetError::invalid_argument("study area polygon has no points"))?;
        Self::from_bounds(bounds)
    }

    /// Study area from GeoJSON text: a Polygon, MultiPolygon, Feature or
    /// FeatureCollection. The first polygon found is used.
    pub fn from_geojson_str(geojson: &str) -> Result<Self> {
        let parsed: GeoJson = serde_json::from_str(geojson)
            .map_err(|e| DatasetError::invalid_argument(format!("invalid GeoJSON: {}", e)))?;

        let ring = parsed
            .first_polygon()
            .ok_or_else(|| DatasetError::invalid_argument("GeoJSON contains no polygon"))?;
        let points: Vec<(f64, f64)> = ring.iter().map(|p| (p[0], p[1])).collect();

        Self::from_polygon(&points)
    }

    pub fn from_geojson_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DatasetError::invalid_argument(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_geojson_str(&text)
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_bounds() {
        let area = StudyArea::from_polygon(&[(-125.0, 32.0), (-117.0, 32.0), (-117.0, 42.0), (-125.0, 32.0)])
            .unwrap();
        assert_eq!(*area.bounds(), BoundingBox::new(-125.0, 32.0, -117.0, 42.0));
    }

    #[test]
    fn test_positive_longitudes_shifted() {
        let area = StudyArea::from_bounds(BoundingBox::new(235.0, 32.0, 243.0, 42.0)).unwrap();
        assert_eq!(area.bounds().west(), -125.0);
        assert_eq!(area.bounds().east(), -117.0);
    }

    #[test]
    fn test_antimeridian_rejected() {
        let err = StudyArea::from_bounds(BoundingBox::new(170.0, -10.0, -170.0, 10.0)).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidArgument(_)));
        assert!(StudyArea::from_bounds(BoundingBox::new(170.0, -10.0, 190.0, 10.0)).is_err());
    }

    #[test]
    fn test_multipolygon_takes_first() {
        let geojson = r#"{
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[5.0, 5.0], [9.0, 5.0], [9.0, 9.0], [5.0, 5.0]]]
            ]
        }"#;
        let area = StudyArea::from_geojson_str(geojson).unwrap();
        assert_eq!(*area.bounds(), BoundingBox::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_invalid_geojson() {
        assert!(StudyArea::from_geojson_str("not json").is_err());
        assert!(StudyArea::from_geojson_str(r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#).is_err());
        assert!(StudyArea::from_geojson_str(r#"{"type": "FeatureCollection", "features": []}"#).is_err());
    }
}
