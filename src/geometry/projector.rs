//! Pure coordinate transforms between the storage and working projections.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use geo::{BoundingRect, Centroid, Coord, Rect};

use super::{GeometryError, Point, Polygon, Projection};

/// Semi-major axis of the WGS84 ellipsoid, used as the sphere radius.
const WGS84_A: f64 = 6_378_137.0;

/// Latitude at which Web Mercator becomes square (`atan(sinh(pi))`).
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Round-trip bound for working-projection coordinates.
pub const ROUND_TRIP_EPSILON_METERS: f64 = 1e-6;

/// Round-trip bound for storage-projection coordinates (about 0.1 mm).
pub const ROUND_TRIP_EPSILON_DEGREES: f64 = 1e-9;

const HALF_WORLD_METERS: f64 = PI * WGS84_A;
const MERCATOR_SLACK_METERS: f64 = 1e-6;

/// Transform one coordinate. Out-of-range input is rejected, not clamped.
pub fn transform_point(point: Point, from: Projection, to: Projection) -> Result<Point, GeometryError> {
    match (from, to) {
        (Projection::Wgs84, Projection::Wgs84)
        | (Projection::WebMercator, Projection::WebMercator) => Ok(point),
        (Projection::Wgs84, Projection::WebMercator) => {
            if point.x.abs() > 180.0 || point.y.abs() > MAX_MERCATOR_LATITUDE {
                return Err(GeometryError::OutOfRange {
                    x: point.x,
                    y: point.y,
                    projection: from,
                });
            }
            let x = WGS84_A * point.x.to_radians();
            let y = WGS84_A * (FRAC_PI_4 + point.y.to_radians() / 2.0).tan().ln();
            Ok(Point::new(x, y))
        }
        (Projection::WebMercator, Projection::Wgs84) => {
            let limit = HALF_WORLD_METERS + MERCATOR_SLACK_METERS;
            if point.x.abs() > limit || point.y.abs() > limit {
                return Err(GeometryError::OutOfRange {
                    x: point.x,
                    y: point.y,
                    projection: from,
                });
            }
            let lon = (point.x / WGS84_A).to_degrees();
            let lat = (2.0 * (point.y / WGS84_A).exp().atan() - FRAC_PI_2).to_degrees();
            Ok(Point::new(lon, lat))
        }
    }
}

/// Transform every vertex of `polygon` from one projection to another.
pub fn transform(polygon: &Polygon, from: Projection, to: Projection) -> Result<Polygon, GeometryError> {
    if from == to {
        return Ok(polygon.clone());
    }
    polygon.try_map(|point| transform_point(point, from, to))
}

/// Storage projection to working projection.
pub fn to_working(
    polygon: &Polygon,
    storage: Projection,
    working: Projection,
) -> Result<Polygon, GeometryError> {
    transform(polygon, storage, working)
}

/// Working projection to storage projection; inverse of [`to_working`].
pub fn to_storage(
    polygon: &Polygon,
    working: Projection,
    storage: Projection,
) -> Result<Polygon, GeometryError> {
    transform(polygon, working, storage)
}

/// Area-weighted centroid of the polygon, holes subtracted, in its own projection.
pub fn centroid(polygon: &Polygon) -> Result<Point, GeometryError> {
    polygon
        .as_geo()
        .centroid()
        .map(|c| Point::new(c.x(), c.y()))
        .ok_or(GeometryError::Degenerate { ring: 0 })
}

/// Bounding box of the polygon.
pub fn extent(polygon: &Polygon) -> Result<Rect<f64>, GeometryError> {
    polygon
        .as_geo()
        .bounding_rect()
        .ok_or(GeometryError::EmptyRing { ring: 0 })
}

/// Center of the polygon's extent after transforming the extent corners.
///
/// Used for map centering: the extent is computed in `from` and its center
/// reported in `to`.
pub fn extent_center(
    polygon: &Polygon,
    from: Projection,
    to: Projection,
) -> Result<Point, GeometryError> {
    let rect = extent(polygon)?;
    let min = transform_point(rect.min().into(), from, to)?;
    let max = transform_point(rect.max().into(), from, to)?;
    Ok(Rect::new(Coord::from(min), Coord::from(max)).center().into())
}
