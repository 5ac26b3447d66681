//! Geometry glue: shape kinds, exact cell classification, WKT/GeoJSON conversion and
//! shape makers.
//!
//! Exact predicates come from the `geo` crate. Shapes are stored in the index as WKT.

use crate::error::{GeoCellError, Result};
use geo::{Contains, Coord, Geometry, Intersects, LineString, Point, Polygon, Within};
use geocell_types::bbox::BoundingBox2D;
use geocell_types::relation::SpatialRelation;
use wkt::ToWkt;

pub const DEGREES_TO_RADIANS: f64 = std::f64::consts::PI / 180.0;
pub const RADIANS_TO_DEGREES: f64 = 1.0 / DEGREES_TO_RADIANS;
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0087714;
pub const DEG_TO_KM: f64 = DEGREES_TO_RADIANS * EARTH_MEAN_RADIUS_KM;
pub const KM_TO_DEG: f64 = 1.0 / DEG_TO_KM;

/// How a geometry is decomposed into cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// A single cell at point precision
    Point,
    /// Fixed-precision scan, no refinement
    Line,
    /// Scan with optional refinement of ambiguous cells
    Area,
}

impl ShapeKind {
    pub fn of(geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Point(_) => ShapeKind::Point,
            Geometry::Line(_)
            | Geometry::LineString(_)
            | Geometry::MultiLineString(_)
            | Geometry::MultiPoint(_) => ShapeKind::Line,
            _ => ShapeKind::Area,
        }
    }
}

/// Relation of `geometry` to a cell rectangle, tested in the order contains,
/// intersects, within.
///
/// `Contains` means the cell lies in the interior of `geometry`. A cell that only
/// reaches the boundary is `Intersects`, since shapes inside it may touch the geometry
/// on that boundary alone.
pub fn relate_cell(geometry: &Geometry, cell: &BoundingBox2D) -> SpatialRelation {
    let rectangle = cell.to_polygon();
    let cell = Geometry::Polygon(rectangle.clone());
    if geometry.contains(&cell) && !touches_boundary(geometry, &rectangle) {
        SpatialRelation::Contains
    } else if geometry.intersects(&cell) {
        SpatialRelation::Intersects
    } else if geometry.is_within(&cell) {
        SpatialRelation::Within
    } else {
        SpatialRelation::Disjoint
    }
}

fn touches_boundary(geometry: &Geometry, rectangle: &Polygon) -> bool {
    boundary_rings(geometry)
        .iter()
        .any(|ring| ring.intersects(rectangle))
}

/// Exterior and interior rings of every areal part of `geometry`.
fn boundary_rings(geometry: &Geometry) -> Vec<LineString> {
    fn rings(polygon: &Polygon) -> Vec<LineString> {
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .cloned()
            .collect()
    }

    match geometry {
        Geometry::Polygon(polygon) => rings(polygon),
        Geometry::MultiPolygon(polygons) => polygons.0.iter().flat_map(rings).collect(),
        Geometry::Rect(rect) => rings(&rect.to_polygon()),
        Geometry::Triangle(triangle) => rings(&triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            collection.0.iter().flat_map(boundary_rings).collect()
        }
        _ => Vec::new(),
    }
}

/// Exact test of `subject REL reference`.
pub fn satisfies(subject: &Geometry, relation: SpatialRelation, reference: &Geometry) -> bool {
    match relation {
        SpatialRelation::Within => reference.contains(subject),
        SpatialRelation::Contains => subject.contains(reference),
        SpatialRelation::Intersects => subject.intersects(reference),
        SpatialRelation::Disjoint => !subject.intersects(reference),
    }
}

pub fn read_wkt(text: &str) -> Result<Geometry> {
    use std::str::FromStr;
    wkt::Wkt::<f64>::from_str(text)
        .map_err(|e| GeoCellError::WktParse(format!("{:?}", e)))
        .and_then(|w| {
            Geometry::try_from(w).map_err(|e| GeoCellError::WktParse(format!("{:?}", e)))
        })
}

/// Canonical text form written to the stored shape field.
pub fn to_wkt(geometry: &Geometry) -> String {
    geometry.wkt_string()
}

#[cfg(feature = "geojson")]
pub fn read_geojson(text: &str) -> Result<Geometry> {
    use geozero::ToGeo;
    geozero::geojson::GeoJson(text)
        .to_geo()
        .map_err(|e| GeoCellError::GeoJsonParse(e.to_string()))
}

pub fn make_point(x: f64, y: f64) -> Geometry {
    Geometry::Point(Point::new(x, y))
}

pub fn make_rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry {
    BoundingBox2D::new(min_x, min_y, max_x, max_y).to_geometry()
}

pub fn make_line_string(points: &[(f64, f64)]) -> Geometry {
    Geometry::LineString(LineString::from(points.to_vec()))
}

/// Polygon approximating a circle of `radius_km` around `center`, in planar degrees.
pub fn make_circle(center: Point, radius_km: f64, segments: usize) -> Result<Geometry> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(GeoCellError::InvalidInput(format!(
            "Radius must be positive and finite, got: {}",
            radius_km
        )));
    }
    if segments < 3 {
        return Err(GeoCellError::InvalidInput(format!(
            "A circle needs at least 3 segments, got: {}",
            segments
        )));
    }
    let radius = radius_km * KM_TO_DEG;
    let ring: Vec<Coord> = (0..segments)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / segments as f64;
            Coord {
                x: center.x() + radius * angle.cos(),
                y: center.y() + radius * angle.sin(),
            }
        })
        .collect();
    Ok(Geometry::Polygon(Polygon::new(LineString::from(ring), vec![])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Geometry {
        make_rectangle(0.0, 0.0, 1.0, 1.0)
    }

    #[test]
    fn test_shape_kinds() {
        assert_eq!(ShapeKind::of(&make_point(1.0, 1.0)), ShapeKind::Point);
        assert_eq!(
            ShapeKind::of(&make_line_string(&[(0.0, 0.0), (1.0, 1.0)])),
            ShapeKind::Line
        );
        assert_eq!(ShapeKind::of(&unit_square()), ShapeKind::Area);
    }

    #[test]
    fn test_relate_cell_order() {
        let square = unit_square();
        let inner = BoundingBox2D::new(0.25, 0.25, 0.5, 0.5);
        let straddling = BoundingBox2D::new(0.5, 0.5, 1.5, 1.5);
        let outside = BoundingBox2D::new(5.0, 5.0, 6.0, 6.0);
        let enclosing = BoundingBox2D::new(-1.0, -1.0, 2.0, 2.0);

        assert_eq!(relate_cell(&square, &inner), SpatialRelation::Contains);
        // shares the square's left edge
        let edge = BoundingBox2D::new(0.0, 0.25, 0.25, 0.5);
        assert_eq!(relate_cell(&square, &edge), SpatialRelation::Intersects);
        assert_eq!(relate_cell(&square, &straddling), SpatialRelation::Intersects);
        assert_eq!(relate_cell(&square, &outside), SpatialRelation::Disjoint);
        // intersects is tested before within
        assert_eq!(relate_cell(&square, &enclosing), SpatialRelation::Intersects);
    }

    #[test]
    fn test_relate_cell_inside_hole() {
        let Geometry::Polygon(outer) = make_rectangle(0.0, 0.0, 4.0, 4.0) else {
            unreachable!()
        };
        let Geometry::Polygon(hole) = make_rectangle(1.0, 1.0, 3.0, 3.0) else {
            unreachable!()
        };
        let frame = Geometry::Polygon(Polygon::new(
            outer.exterior().clone(),
            vec![hole.exterior().clone()],
        ));
        let against_hole = BoundingBox2D::new(0.5, 1.0, 1.0, 1.5);
        let clear = BoundingBox2D::new(0.25, 0.25, 0.75, 0.75);
        assert_eq!(relate_cell(&frame, &against_hole), SpatialRelation::Intersects);
        assert_eq!(relate_cell(&frame, &clear), SpatialRelation::Contains);
    }

    #[test]
    fn test_satisfies() {
        let square = unit_square();
        let point = make_point(0.5, 0.5);
        assert!(satisfies(&square, SpatialRelation::Contains, &point));
        assert!(satisfies(&point, SpatialRelation::Within, &square));
        assert!(satisfies(&square, SpatialRelation::Intersects, &point));
        assert!(satisfies(&make_point(5.0, 5.0), SpatialRelation::Disjoint, &square));
    }

    #[test]
    fn test_wkt_roundtrip() {
        let square = unit_square();
        let text = to_wkt(&square);
        assert!(text.starts_with("POLYGON"));
        assert_eq!(read_wkt(&text).unwrap(), square);
    }

    #[test]
    fn test_wkt_parse_failure() {
        assert!(matches!(
            read_wkt("POLYGON((0 0, 1"),
            Err(GeoCellError::WktParse(_))
        ));
    }

    #[cfg(feature = "geojson")]
    #[test]
    fn test_geojson_point() {
        let geometry = read_geojson(r#"{"type": "Point", "coordinates": [10.5, 20.25]}"#).unwrap();
        assert_eq!(geometry, make_point(10.5, 20.25));
    }

    #[test]
    fn test_circle() {
        let circle = make_circle(Point::new(0.0, 0.0), 10.0, 32).unwrap();
        assert!(circle.contains(&make_point(0.0, 0.0)));
        assert!(!circle.contains(&make_point(0.2, 0.0)));
        assert!(make_circle(Point::new(0.0, 0.0), -1.0, 32).is_err());
        assert!(make_circle(Point::new(0.0, 0.0), 1.0, 2).is_err());
    }
}
