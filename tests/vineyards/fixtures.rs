//! Shared fixtures for parcel store tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use vineyard_sync::geometry::geojson;
use vineyard_sync::{InMemoryRemoteStore, Point, Polygon, RemoteStore, SyncConfig, VineyardStore};

/// Axis-aligned square in degrees, as a serialized polygon string.
pub fn square(lon: f64, lat: f64, size: f64) -> String {
    geojson::write_polygon(&square_polygon(lon, lat, size)).unwrap()
}

pub fn square_polygon(lon: f64, lat: f64, size: f64) -> Polygon {
    Polygon::from_ring(vec![
        Point::new(lon, lat),
        Point::new(lon + size, lat),
        Point::new(lon + size, lat + size),
        Point::new(lon, lat + size),
    ])
    .unwrap()
}

pub fn parcel_doc(name: &str, location: &str) -> Value {
    json!({
        "name": name,
        "address": null,
        "location": location,
        "actions": [],
        "varieties": [],
        "meteo": {"data": []}
    })
}

pub fn seed_parcel(remote: &InMemoryRemoteStore, uid: &str, id: &str, name: &str, lon: f64) {
    remote
        .set(
            &format!("users/{}/vineyards/{}", uid, id),
            parcel_doc(name, &square(lon, 46.0, 0.01)),
        )
        .unwrap();
}

pub fn share(remote: &InMemoryRemoteStore, viewer: &str, owner: &str, parcel_id: &str) -> String {
    remote
        .add(
            &format!("users/{}/sharedVineyards", viewer),
            json!({"user": owner, "vineyard": parcel_id}),
        )
        .unwrap()
}

pub fn open(remote: &Arc<InMemoryRemoteStore>, uid: &str) -> VineyardStore {
    open_with(remote, uid, SyncConfig::default())
}

pub fn open_with(remote: &Arc<InMemoryRemoteStore>, uid: &str, config: SyncConfig) -> VineyardStore {
    let store: Arc<dyn RemoteStore> = remote.clone();
    VineyardStore::open(store, uid, config).unwrap()
}

pub fn quick_timeout() -> SyncConfig {
    SyncConfig::default().with_shared_fetch_timeout(Duration::from_millis(50))
}

pub fn ids(store: &VineyardStore) -> Vec<String> {
    store.parcels().into_iter().map(|p| p.id).collect()
}
