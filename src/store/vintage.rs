use std::sync::Arc;

use tracing::debug;

use super::{Feed, FeedSlot};
use crate::error::StoreError;
use crate::live::Live;
use crate::model::{Document, ParcelKey, Vintage};
use crate::paths;
use crate::remote::RemoteStore;

/// Live vintages of one parcel at a time, in remote store order.
pub struct VintageStore {
    store: Arc<dyn RemoteStore>,
    slot: FeedSlot<Vintage>,
}

impl VintageStore {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            slot: FeedSlot::new(),
        }
    }

    /// Mirror the vintages of `key`, replacing any previous parcel's feed.
    pub fn listen(&self, key: &ParcelKey) -> Result<Live<Vec<Vintage>>, StoreError> {
        let view = self.slot.replace(|| {
            Feed::open(
                self.store.as_ref(),
                key.clone(),
                paths::vintages(key),
                |vintages: &[Vintage]| vintages.to_vec(),
            )
        })?;
        debug!(owner = %key.owner, parcel_id = %key.parcel_id, "listening to vintages");
        Ok(view)
    }

    pub fn listening(&self) -> Option<ParcelKey> {
        self.slot.key()
    }

    /// Latest vintages of the parcel listened to; empty when not listening.
    pub fn vintages(&self) -> Vec<Vintage> {
        self.slot.view().map(|view| view.get()).unwrap_or_default()
    }

    /// Every vintage recorded for `year`. Duplicates are possible.
    pub fn for_season(&self, year: i32) -> Vec<Vintage> {
        self.vintages()
            .into_iter()
            .filter(|v| v.year == year)
            .collect()
    }

    pub fn add(&self, key: &ParcelKey, vintage: Vintage) -> Result<Vintage, StoreError> {
        let id = self.store.add(&paths::vintages(key), vintage.encode()?)?;
        let mut added = vintage;
        added.id = id;
        Ok(added)
    }

    /// Replace a vintage wholesale.
    pub fn update(&self, key: &ParcelKey, vintage: Vintage) -> Result<Vintage, StoreError> {
        if vintage.id.is_empty() {
            return Err(StoreError::not_found(Vintage::COLLECTION, ""));
        }
        self.store
            .set(&paths::vintage(key, &vintage.id), vintage.encode()?)?;
        Ok(vintage)
    }

    pub fn remove(&self, key: &ParcelKey, vintage_id: &str) -> Result<(), StoreError> {
        self.store.delete(&paths::vintage(key, vintage_id))?;
        Ok(())
    }

    /// Stop the current feed. Idempotent.
    pub fn close(&self) {
        self.slot.close();
    }
}

impl Drop for VintageStore {
    fn drop(&mut self) {
        self.close();
    }
}
