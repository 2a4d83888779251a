//! Integration tests for the action and vintage stores.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use vineyard_sync::{
    last_update_date, Action, ActionStore, ActionType, InMemoryRemoteStore, ParcelKey,
    RemoteStore, StoreError, TransportError, Update, Vintage, VintageStatus, VintageStore,
};

const ACTIONS: &str = "users/u1/vineyards/p1/actions";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setup() -> (Arc<InMemoryRemoteStore>, ActionStore, ParcelKey) {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let shared: Arc<dyn RemoteStore> = remote.clone();
    (remote, ActionStore::new(shared), ParcelKey::new("u1", "p1"))
}

fn descriptions(actions: &[Action]) -> Vec<&str> {
    actions.iter().map(|a| a.description.as_str()).collect()
}

#[test]
fn listen_sorts_by_date_descending_keeping_insertion_order_for_ties() {
    let (remote, store, key) = setup();
    remote
        .add(ACTIONS, json!({"type": "observation", "date": "2023-05-01", "description": "#1"}))
        .unwrap();
    remote
        .add(ACTIONS, json!({"type": "observation", "date": "2023-05-01", "description": "#2"}))
        .unwrap();
    remote
        .add(ACTIONS, json!({"type": "prune", "date": "2022-01-01", "description": "old"}))
        .unwrap();

    let live = store.listen(&key).unwrap();

    assert_eq!(descriptions(&live.get()), vec!["#1", "#2", "old"]);
}

#[test]
fn older_insert_first_still_sorts_last() {
    let (remote, store, key) = setup();
    let live = store.listen(&key).unwrap();

    for (day, text) in [("2022-01-01", "old"), ("2023-05-01", "#1"), ("2023-05-01", "#2")] {
        remote
            .add(ACTIONS, json!({"type": "damage", "date": day, "description": text}))
            .unwrap();
    }

    assert_eq!(descriptions(&live.get()), vec!["#1", "#2", "old"]);
}

#[test]
fn published_actions_carry_rendered_descriptions() {
    let (_remote, store, key) = setup();
    let live = store.listen(&key).unwrap();

    let added = store
        .add(
            &key,
            Action::new(ActionType::Observation, date(2023, 6, 1), "first *mildew* spots"),
        )
        .unwrap();

    assert_eq!(added.html, "<p>first <em>mildew</em> spots</p>");
    let published = live.get();
    assert_eq!(published[0].id, added.id);
    assert_eq!(published[0].html, added.html);
}

#[test]
fn update_replaces_document_wholesale() {
    let (remote, store, key) = setup();
    let added = store
        .add(
            &key,
            Action::new(ActionType::Brix, date(2023, 9, 1), "sample").with_value(19.5),
        )
        .unwrap();

    let mut replacement = Action::new(ActionType::Brix, date(2023, 9, 2), "resampled");
    replacement.id = added.id.clone();
    let updated = store.update(&key, replacement).unwrap();

    assert_eq!(updated.html, "<p>resampled</p>");
    let stored = &remote.documents(ACTIONS)[0];
    assert_eq!(stored.id, added.id);
    assert_eq!(
        stored.data,
        json!({"type": "brix", "date": "2023-09-02", "description": "resampled"})
    );
}

#[test]
fn remove_drops_action_from_view() {
    let (_remote, store, key) = setup();
    let live = store.listen(&key).unwrap();
    let keep = store
        .add(&key, Action::planting(date(2021, 4, 1), 12, 40))
        .unwrap();
    let drop = store
        .add(&key, Action::new(ActionType::Harvest, date(2022, 9, 10), ""))
        .unwrap();

    store.remove(&key, &drop.id).unwrap();

    let ids: Vec<String> = live.get().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![keep.id]);
}

#[test]
fn switching_parcels_closes_previous_feed() {
    let (remote, store, key) = setup();
    let first = store.listen(&key).unwrap();
    let other = ParcelKey::new("u2", "p9");

    store.listen(&other).unwrap();

    assert!(first.is_closed());
    assert_eq!(remote.subscriber_count(ACTIONS), 0);
    assert_eq!(remote.subscriber_count("users/u2/vineyards/p9/actions"), 1);
    assert_eq!(store.listening(), Some(other));
}

#[test]
fn rejected_writes_propagate() {
    let (remote, store, key) = setup();
    remote.fail_writes(Some("offline"));

    let err = store
        .add(&key, Action::new(ActionType::Prune, date(2023, 2, 1), ""))
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Transport(TransportError::WriteRejected { .. })
    ));
}

#[test]
fn stream_failure_reaches_view_subscribers() {
    let (remote, store, key) = setup();
    let live = store.listen(&key).unwrap();
    let failed = Arc::new(std::sync::Mutex::new(false));
    let flag = Arc::clone(&failed);
    let _sub = live.subscribe(move |update| {
        if let Update::Failed(_) = update {
            *flag.lock().unwrap() = true;
        }
    });

    remote.sever(ACTIONS, "stream closed");

    assert!(*failed.lock().unwrap());
}

#[test]
fn last_update_date_reads_last_element_of_published_order() {
    let (_remote, store, key) = setup();
    let live = store.listen(&key).unwrap();
    store
        .add(&key, Action::new(ActionType::Prune, date(2022, 1, 1), ""))
        .unwrap();
    store
        .add(&key, Action::new(ActionType::Harvest, date(2023, 9, 1), ""))
        .unwrap();

    let descending = live.get();
    assert_eq!(last_update_date(&descending), Some(date(2022, 1, 1)));

    let ascending: Vec<Action> = descending.into_iter().rev().collect();
    assert_eq!(last_update_date(&ascending), Some(date(2023, 9, 1)));
}

#[test]
fn vintages_follow_remote_writes() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let shared: Arc<dyn RemoteStore> = remote.clone();
    let vintages = VintageStore::new(shared);
    let key = ParcelKey::new("u1", "p1");
    let live = vintages.listen(&key).unwrap();

    remote
        .add(
            "users/u1/vineyards/p1/vintages",
            json!({"year": 2022, "name": "Riserva", "status": "vinified"}),
        )
        .unwrap();
    vintages
        .add(&key, Vintage::new(2022, "Rosato", VintageStatus::Bottled))
        .unwrap();

    assert_eq!(live.get().len(), 2);
    let names: Vec<String> = vintages
        .for_season(2022)
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(names, vec!["Riserva", "Rosato"]);
    assert!(vintages.for_season(2021).is_empty());
}
