//! Serialized polygon strings as stored in parcel documents.
//!
//! The payload is a GeoJSON geometry object:
//! `{"type":"Polygon","coordinates":[[[x, y], ...], ...]}`.

use serde::{Deserialize, Serialize};

use super::{GeometryError, Point, Polygon};

#[derive(Serialize, Deserialize)]
struct GeometryPayload {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<Vec<[f64; 2]>>,
}

/// Write a polygon as a GeoJSON geometry string. Coordinates are written as-is.
pub fn write_polygon(polygon: &Polygon) -> Result<String, GeometryError> {
    let payload = GeometryPayload {
        kind: "Polygon".to_string(),
        coordinates: polygon.coordinates(),
    };
    serde_json::to_string(&payload).map_err(|e| GeometryError::Parse(e.to_string()))
}

/// Parse a GeoJSON geometry string into a validated polygon.
pub fn read_polygon(raw: &str) -> Result<Polygon, GeometryError> {
    let payload: GeometryPayload =
        serde_json::from_str(raw).map_err(|e| GeometryError::Parse(e.to_string()))?;

    if payload.kind != "Polygon" {
        return Err(GeometryError::Parse(format!(
            "expected Polygon geometry, got {}",
            payload.kind
        )));
    }

    let rings = payload
        .coordinates
        .into_iter()
        .map(|ring| ring.into_iter().map(|[x, y]| Point::new(x, y)).collect())
        .collect();

    Polygon::new(rings)
}
