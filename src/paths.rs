//! Remote collection layout.
//!
//! ```text
//! users/{uid}/vineyards/{id}
//! users/{uid}/vineyards/{id}/actions/{actionId}
//! users/{uid}/vineyards/{id}/vintages/{vintageId}
//! users/{uid}/sharedVineyards/{id}
//! ```

use crate::model::{Action, Document, ParcelDoc, ParcelKey, SharedParcelRef, Vintage};

pub fn parcels(uid: &str) -> String {
    format!("users/{}/{}", uid, ParcelDoc::COLLECTION)
}

pub fn parcel(key: &ParcelKey) -> String {
    format!("{}/{}", parcels(&key.owner), key.parcel_id)
}

pub fn shared_refs(uid: &str) -> String {
    format!("users/{}/{}", uid, SharedParcelRef::COLLECTION)
}

pub fn shared_ref(uid: &str, reference_id: &str) -> String {
    format!("{}/{}", shared_refs(uid), reference_id)
}

pub fn actions(key: &ParcelKey) -> String {
    format!("{}/{}", parcel(key), Action::COLLECTION)
}

pub fn action(key: &ParcelKey, action_id: &str) -> String {
    format!("{}/{}", actions(key), action_id)
}

pub fn vintages(key: &ParcelKey) -> String {
    format!("{}/{}", parcel(key), Vintage::COLLECTION)
}

pub fn vintage(key: &ParcelKey, vintage_id: &str) -> String {
    format!("{}/{}", vintages(key), vintage_id)
}
