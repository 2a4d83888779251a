//! Geometry - parcel boundaries and the projections they move between.
//!
//! Boundaries are persisted in the *storage* projection (geographic degrees)
//! and held in memory in the *working* projection (projected meters). The
//! conversion happens only at the store boundary, through [`to_working`] and
//! [`to_storage`].
//!
//! ## Example
//!
//! ```
//! use vineyard_sync::geometry::{self, Point, Polygon, Projection};
//!
//! let stored = Polygon::from_ring(vec![
//!     Point::new(11.10, 46.05),
//!     Point::new(11.11, 46.05),
//!     Point::new(11.11, 46.06),
//! ])
//! .unwrap();
//!
//! let working = geometry::to_working(&stored, Projection::Wgs84, Projection::WebMercator).unwrap();
//! let back = geometry::to_storage(&working, Projection::WebMercator, Projection::Wgs84).unwrap();
//! assert!(back.approx_eq(&stored, 1e-9));
//! ```

pub mod geojson;
mod projector;

use geo::{Area, Coord, Intersects, Line, LineString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use projector::{
    centroid, extent, extent_center, to_storage, to_working, transform, transform_point,
    MAX_MERCATOR_LATITUDE, ROUND_TRIP_EPSILON_DEGREES, ROUND_TRIP_EPSILON_METERS,
};

/// Coordinate reference systems a boundary can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Projection {
    /// Geographic longitude/latitude in degrees (EPSG:4326).
    Wgs84,
    /// Spherical Web Mercator in meters (EPSG:3857).
    WebMercator,
}

impl Projection {
    pub fn code(&self) -> &'static str {
        match self {
            Projection::Wgs84 => "EPSG:4326",
            Projection::WebMercator => "EPSG:3857",
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Projection {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EPSG:4326" | "WGS84" => Ok(Projection::Wgs84),
            "EPSG:3857" | "EPSG:900913" => Ok(Projection::WebMercator),
            other => Err(GeometryError::UnknownProjection(other.to_string())),
        }
    }
}

impl TryFrom<String> for Projection {
    type Error = GeometryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Projection> for String {
    fn from(value: Projection) -> Self {
        value.code().to_string()
    }
}

/// Rejected geometry input. Never coerced into a "best effort" shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("polygon has no rings")]
    EmptyPolygon,
    #[error("ring {ring} has no coordinates")]
    EmptyRing { ring: usize },
    #[error("ring {ring} is degenerate (fewer than three distinct vertices or zero area)")]
    Degenerate { ring: usize },
    #[error("ring {ring} intersects itself")]
    SelfIntersecting { ring: usize },
    #[error("non-finite coordinate in ring {ring}")]
    NonFinite { ring: usize },
    #[error("coordinate ({x}, {y}) is outside the valid range of {projection}")]
    OutOfRange { x: f64, y: f64, projection: Projection },
    #[error("unknown projection {0}")]
    UnknownProjection(String),
    #[error("invalid serialized polygon: {0}")]
    Parse(String),
}

/// A single coordinate pair. `x` is longitude/easting, `y` latitude/northing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<Point> for Coord<f64> {
    fn from(point: Point) -> Self {
        Coord {
            x: point.x,
            y: point.y,
        }
    }
}

impl From<Coord<f64>> for Point {
    fn from(coord: Coord<f64>) -> Self {
        Point::new(coord.x, coord.y)
    }
}

/// A closed polygon: the exterior ring first, holes after it.
///
/// Every ring is stored closed (first vertex repeated last). Construction
/// validates the shape, so a `Polygon` value is always usable by the
/// projector.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    inner: geo::Polygon<f64>,
}

impl Polygon {
    /// Build and validate a polygon. Open rings are closed.
    pub fn new(rings: Vec<Vec<Point>>) -> Result<Self, GeometryError> {
        let rings: Vec<LineString<f64>> = rings
            .into_iter()
            .map(|ring| {
                let mut line: LineString<f64> = ring.into_iter().collect();
                line.close();
                line
            })
            .collect();
        validate(&rings)?;

        let mut rings = rings.into_iter();
        let exterior = rings.next().ok_or(GeometryError::EmptyPolygon)?;
        Ok(Self {
            inner: geo::Polygon::new(exterior, rings.collect()),
        })
    }

    /// Build a polygon with a single exterior ring.
    pub fn from_ring(ring: Vec<Point>) -> Result<Self, GeometryError> {
        Self::new(vec![ring])
    }

    pub fn exterior(&self) -> &LineString<f64> {
        self.inner.exterior()
    }

    /// Exterior ring, then holes.
    pub fn rings(&self) -> impl Iterator<Item = &LineString<f64>> {
        std::iter::once(self.inner.exterior()).chain(self.inner.interiors())
    }

    pub fn as_geo(&self) -> &geo::Polygon<f64> {
        &self.inner
    }

    /// Coordinates as nested `[x, y]` arrays, ring by ring.
    pub fn coordinates(&self) -> Vec<Vec<[f64; 2]>> {
        self.rings()
            .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
            .collect()
    }

    /// Compare vertex by vertex within `epsilon` on both axes.
    pub fn approx_eq(&self, other: &Polygon, epsilon: f64) -> bool {
        self.inner.interiors().len() == other.inner.interiors().len()
            && self.rings().zip(other.rings()).all(|(a, b)| {
                a.0.len() == b.0.len()
                    && a.coords().zip(b.coords()).all(|(p, q)| {
                        (p.x - q.x).abs() <= epsilon && (p.y - q.y).abs() <= epsilon
                    })
            })
    }

    /// Apply `f` to every vertex, re-validating the result.
    pub(crate) fn try_map<F>(&self, mut f: F) -> Result<Polygon, GeometryError>
    where
        F: FnMut(Point) -> Result<Point, GeometryError>,
    {
        let mut rings = Vec::with_capacity(self.inner.interiors().len() + 1);
        for ring in self.rings() {
            let mut mapped = Vec::with_capacity(ring.0.len());
            for coord in ring.coords() {
                mapped.push(f(Point::from(*coord))?);
            }
            rings.push(mapped);
        }
        Polygon::new(rings)
    }
}

fn validate(rings: &[LineString<f64>]) -> Result<(), GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::EmptyPolygon);
    }

    for (index, ring) in rings.iter().enumerate() {
        if ring.0.is_empty() {
            return Err(GeometryError::EmptyRing { ring: index });
        }
        if ring.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(GeometryError::NonFinite { ring: index });
        }
        // Closed ring: at least three distinct vertices plus the closing one.
        if ring.0.len() < 4 {
            return Err(GeometryError::Degenerate { ring: index });
        }
        if self_intersects(ring) {
            return Err(GeometryError::SelfIntersecting { ring: index });
        }
        if geo::Polygon::new(ring.clone(), vec![]).unsigned_area() == 0.0 {
            return Err(GeometryError::Degenerate { ring: index });
        }
    }

    Ok(())
}

/// True when two non-adjacent edges of the closed ring touch or cross.
fn self_intersects(ring: &LineString<f64>) -> bool {
    let edges: Vec<Line<f64>> = ring.lines().collect();
    let last = edges.len() - 1;
    for i in 0..edges.len() {
        for j in (i + 2)..edges.len() {
            if i == 0 && j == last {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return true;
            }
        }
    }
    false
}
