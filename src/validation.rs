//! Validation for geographic coordinates and shapes entering the index.

use crate::error::{GeoCellError, Result};
use geo::{Coord, CoordsIter, Geometry};
use std::ops::RangeInclusive;

/// Longitudes accepted by the index
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;
/// Latitudes accepted by the index
pub const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;

/// Range check of one coordinate; NaN and infinities fall outside both ranges.
fn check_coord(coord: Coord) -> std::result::Result<(), String> {
    if !LONGITUDE_RANGE.contains(&coord.x) {
        Err(format!("longitude {} outside [-180, 180]", coord.x))
    } else if !LATITUDE_RANGE.contains(&coord.y) {
        Err(format!("latitude {} outside [-90, 90]", coord.y))
    } else {
        Ok(())
    }
}

/// Validates every coordinate of a geometry, reporting the first offending one by index.
///
/// # Examples
///
/// ```
/// use geocell::validation::validate_geometry;
/// use geo::{Geometry, polygon};
///
/// let poly = polygon![
///     (x: -80.0, y: 35.0),
///     (x: -70.0, y: 35.0),
///     (x: -70.0, y: 45.0),
///     (x: -80.0, y: 35.0),
/// ];
/// assert!(validate_geometry(&Geometry::Polygon(poly)).is_ok());
/// assert!(validate_geometry(&Geometry::Point(geo::Point::new(200.0, 40.0))).is_err());
/// ```
pub fn validate_geometry(geometry: &Geometry) -> Result<()> {
    geometry
        .coords_iter()
        .enumerate()
        .try_for_each(|(idx, coord)| {
            check_coord(coord).map_err(|e| {
                GeoCellError::InvalidInput(format!("Coordinate at index {}: {}", idx, e))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, line_string};

    #[test]
    fn test_coordinate_ranges() {
        assert!(check_coord(Coord { x: -0.1278, y: 51.5074 }).is_ok());
        assert!(check_coord(Coord { x: 180.0, y: 0.0 }).is_ok());
        assert!(check_coord(Coord { x: -180.0, y: -90.0 }).is_ok());
        assert!(check_coord(Coord { x: 180.5, y: 0.0 }).is_err());
        assert!(check_coord(Coord { x: 0.0, y: -90.5 }).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(check_coord(Coord { x: f64::NAN, y: 0.0 }).is_err());
        assert!(check_coord(Coord { x: 0.0, y: f64::INFINITY }).is_err());
        let point = Geometry::Point(geo::Point::new(f64::NAN, 0.0));
        assert!(matches!(
            validate_geometry(&point),
            Err(GeoCellError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_geometry_validation_reports_index() {
        let line: LineString = line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 100.0)];
        let err = validate_geometry(&Geometry::LineString(line)).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }
}
