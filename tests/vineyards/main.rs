//! Integration tests for the parcel store (own + shared union, edits, writes).

mod fixtures;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fixtures::{
    ids, open, open_with, parcel_doc, quick_timeout, seed_parcel, share, square, square_polygon,
};
use serde_json::json;
use vineyard_sync::geometry::{
    self, geojson, ROUND_TRIP_EPSILON_DEGREES, ROUND_TRIP_EPSILON_METERS,
};
use vineyard_sync::{
    GeometryError, InMemoryRemoteStore, Point, Projection, RemoteStore, StoreError, SyncConfig,
    TransportError, Update,
};

fn remote() -> Arc<InMemoryRemoteStore> {
    Arc::new(InMemoryRemoteStore::new())
}

fn working(lon: f64, lat: f64, size: f64) -> vineyard_sync::Polygon {
    geometry::to_working(
        &square_polygon(lon, lat, size),
        Projection::Wgs84,
        Projection::WebMercator,
    )
    .unwrap()
}

#[test]
fn union_lists_own_parcels_then_shared() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    seed_parcel(&remote, "u2", "p9", "Neighbour", 11.5);
    share(&remote, "u1", "u2", "p9");

    let store = open(&remote, "u1");

    let parcels = store.parcels();
    assert_eq!(ids(&store), vec!["p1", "p9"]);
    assert!(!parcels[0].shared);
    assert!(parcels[1].shared);
    assert_eq!(parcels[1].owner, "u2");
    assert!(parcels[1].boundary.exterior()[0].x > 1_000_000.0);
}

#[test]
fn unresolvable_shared_references_are_dropped() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    seed_parcel(&remote, "u2", "p9", "Neighbour", 11.5);
    seed_parcel(&remote, "u3", "p5", "Revoked", 12.0);
    remote.deny("users/u3/vineyards/p5");

    share(&remote, "u1", "u2", "gone");
    share(&remote, "u1", "u3", "p5");
    share(&remote, "u1", "u2", "p9");

    let store = open(&remote, "u1");

    assert_eq!(ids(&store), vec!["p1", "p9"]);
    assert!(store.list().failure().is_none());
}

#[test]
fn slow_shared_fetch_is_bounded_by_timeout() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    seed_parcel(&remote, "u2", "p9", "Neighbour", 11.5);
    share(&remote, "u1", "u2", "p9");
    remote.delay_gets(Some(Duration::from_millis(500)));

    let store = open_with(&remote, "u1", quick_timeout());

    assert_eq!(ids(&store), vec!["p1"]);
}

#[test]
fn new_shared_reference_extends_union() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    seed_parcel(&remote, "u2", "p9", "Neighbour", 11.5);
    let store = open(&remote, "u1");
    assert_eq!(ids(&store), vec!["p1"]);

    let reference = share(&remote, "u1", "u2", "p9");
    assert_eq!(ids(&store), vec!["p1", "p9"]);

    remote
        .delete(&format!("users/u1/sharedVineyards/{}", reference))
        .unwrap();
    assert_eq!(ids(&store), vec!["p1"]);
}

#[test]
fn update_boundary_republishes_without_writing() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    let store = open(&remote, "u1");
    let before = remote.documents("users/u1/vineyards");

    let publications = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&publications);
    let _sub = store.list().subscribe(move |update| {
        if let Update::Value(_) = update {
            *counter.lock().unwrap() += 1;
        }
    });

    let edited = working(11.2, 46.2, 0.02);
    store.update_boundary("p1", edited.clone()).unwrap();

    assert_eq!(*publications.lock().unwrap(), 2);
    assert_eq!(store.get("p1").unwrap().boundary, edited);
    assert_eq!(remote.documents("users/u1/vineyards"), before);
}

#[test]
fn update_boundary_of_unknown_parcel_is_not_found() {
    let remote = remote();
    let store = open(&remote, "u1");

    let err = store
        .update_boundary("nope", working(11.0, 46.0, 0.01))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn save_writes_boundary_in_storage_projection() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    let store = open(&remote, "u1");

    store
        .update_boundary("p1", working(11.2, 46.2, 0.02))
        .unwrap();
    store.save(&["p1"]).unwrap();

    let saved = remote
        .documents("users/u1/vineyards")
        .into_iter()
        .find(|d| d.id == "p1")
        .unwrap();
    let location = saved.data["location"].as_str().unwrap();
    let stored = geojson::read_polygon(location).unwrap();
    assert!(stored.approx_eq(&square_polygon(11.2, 46.2, 0.02), ROUND_TRIP_EPSILON_DEGREES));
    assert_eq!(saved.data["name"], "Vigna Alta");
    assert_eq!(saved.data["meteo"]["data"], serde_json::json!([]));
}

#[test]
fn save_shared_parcel_writes_to_owner_collection() {
    let remote = remote();
    seed_parcel(&remote, "u2", "p9", "Neighbour", 11.5);
    share(&remote, "u1", "u2", "p9");
    let store = open(&remote, "u1");

    store.save(&["p9"]).unwrap();

    assert!(remote.documents("users/u1/vineyards").is_empty());
    assert_eq!(remote.documents("users/u2/vineyards").len(), 1);
}

#[test]
fn save_with_unknown_id_writes_nothing() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    let store = open(&remote, "u1");
    store
        .update_boundary("p1", working(11.2, 46.2, 0.02))
        .unwrap();
    let before = remote.documents("users/u1/vineyards");

    let err = store.save(&["p1", "missing"]).unwrap_err();

    assert_eq!(
        err,
        StoreError::NotFound {
            collection: "vineyards",
            id: "missing".into()
        }
    );
    assert_eq!(remote.documents("users/u1/vineyards"), before);
}

#[test]
fn rejected_write_propagates() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    let store = open(&remote, "u1");
    remote.fail_writes(Some("quota exceeded"));

    let err = store.save(&["p1"]).unwrap_err();

    assert!(matches!(
        err,
        StoreError::Transport(TransportError::WriteRejected { .. })
    ));
}

#[test]
fn created_parcel_arrives_through_the_mirror() {
    let remote = remote();
    let store = open(&remote, "u1");

    let id = store
        .create("Nuova", Some("Via Roma 1"), &working(11.0, 46.0, 0.01))
        .unwrap();

    let created = store.get(&id).unwrap();
    assert_eq!(created.name, "Nuova");
    assert_eq!(created.address.as_deref(), Some("Via Roma 1"));
    assert!(created.actions.is_empty());
    assert!(created.varieties.is_empty());
    assert!(created.meteo.is_empty());

    let stored = &remote.documents("users/u1/vineyards")[0];
    let boundary = geojson::read_polygon(stored.data["location"].as_str().unwrap()).unwrap();
    assert!(boundary.approx_eq(&square_polygon(11.0, 46.0, 0.01), ROUND_TRIP_EPSILON_DEGREES));
}

#[test]
fn create_rejects_boundary_outside_working_range() {
    let remote = remote();
    let store = open(&remote, "u1");

    let beyond = vineyard_sync::Polygon::from_ring(vec![
        Point::new(2.1e7, 0.0),
        Point::new(2.2e7, 0.0),
        Point::new(2.2e7, 1.0e5),
        Point::new(2.1e7, 1.0e5),
    ])
    .unwrap();
    let err = store.create("Far", None, &beyond).unwrap_err();

    assert!(matches!(
        err,
        StoreError::Geometry(GeometryError::OutOfRange { .. })
    ));
    assert!(remote.documents("users/u1/vineyards").is_empty());
}

#[test]
fn identity_projections_store_boundaries_verbatim() {
    let remote = remote();
    let store = open_with(
        &remote,
        "u1",
        SyncConfig::default().with_projections(Projection::Wgs84, Projection::Wgs84),
    );

    store
        .create("Flat", None, &square_polygon(11.0, 46.0, 0.01))
        .unwrap();

    let location = remote.documents("users/u1/vineyards")[0].data["location"].clone();
    assert_eq!(location, serde_json::json!(square(11.0, 46.0, 0.01)));
    assert_eq!(store.parcels()[0].boundary, square_polygon(11.0, 46.0, 0.01));
}

#[test]
fn delete_drops_parcel_immediately() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    seed_parcel(&remote, "u1", "p2", "Vigna Bassa", 11.1);
    let store = open(&remote, "u1");

    store.delete("p1").unwrap();

    assert_eq!(ids(&store), vec!["p2"]);
    assert_eq!(remote.documents("users/u1/vineyards").len(), 1);
}

#[test]
fn deleting_shared_parcel_only_unlinks_it() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    seed_parcel(&remote, "u2", "p9", "Neighbour", 11.5);
    share(&remote, "u1", "u2", "p9");
    let store = open(&remote, "u1");

    store.delete("p9").unwrap();

    assert_eq!(ids(&store), vec!["p1"]);
    assert_eq!(remote.documents("users/u2/vineyards").len(), 1);
    assert!(remote.documents("users/u1/sharedVineyards").is_empty());
    assert_eq!(remote.documents("users/u1/vineyards").len(), 1);
}

#[test]
fn save_keeps_inline_action_ids() {
    let remote = remote();
    let mut doc = parcel_doc("Vigna Vecchia", &square(11.0, 46.0, 0.01));
    doc["actions"] = json!([
        {"id": "legacy-1", "type": "prune", "date": "2020-02-01", "description": "x"}
    ]);
    remote.set("users/u1/vineyards/p1", doc).unwrap();
    let store = open(&remote, "u1");
    assert_eq!(store.get("p1").unwrap().actions[0].id, "legacy-1");

    store.save(&["p1"]).unwrap();

    let saved = &remote.documents("users/u1/vineyards")[0];
    assert_eq!(saved.data["actions"][0]["id"], "legacy-1");
    assert_eq!(saved.data["actions"][0]["description"], "x");
    assert_eq!(store.get("p1").unwrap().actions[0].id, "legacy-1");
}

#[test]
fn mirror_republish_before_save_discards_boundary_edit() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    let store = open(&remote, "u1");
    let original = store.get("p1").unwrap().boundary;

    let edited = working(11.2, 46.2, 0.02);
    store.update_boundary("p1", edited.clone()).unwrap();
    seed_parcel(&remote, "u1", "p1", "Vigna Rinominata", 11.0);

    let current = store.get("p1").unwrap();
    assert_eq!(current.name, "Vigna Rinominata");
    assert_ne!(current.boundary, edited);
    assert!(current.boundary.approx_eq(&original, ROUND_TRIP_EPSILON_METERS));
}

#[test]
fn stream_failure_is_terminal_for_the_union() {
    let remote = remote();
    seed_parcel(&remote, "u1", "p1", "Vigna Alta", 11.0);
    let store = open(&remote, "u1");

    remote.sever("users/u1/vineyards", "connection reset");

    assert_eq!(
        store.list().failure(),
        Some(TransportError::Disconnected("connection reset".into()))
    );
    seed_parcel(&remote, "u1", "p2", "Vigna Bassa", 11.1);
    assert_eq!(ids(&store), vec!["p1"]);
}
