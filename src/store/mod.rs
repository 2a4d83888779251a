//! Stores - live, writable views over the mirrored collections.
//!
//! - [`VineyardStore`]: own and shared parcels, merged, plus selection state.
//! - [`ActionStore`]: the action log of one parcel, most recent first.
//! - [`VintageStore`]: the per-season vintages of one parcel.
//!
//! Writes go straight to the remote store. The live views change only when
//! the corresponding mirror republishes.

mod action;
mod vineyard;
mod vintage;

pub use action::{last_update_date, ActionStore};
pub use vineyard::VineyardStore;
pub use vintage::VintageStore;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::live::{Live, Subscription, Update};
use crate::mirror::CollectionMirror;
use crate::model::{Document, ParcelKey};
use crate::remote::RemoteStore;

/// A mirror of one parcel sub-collection, reshaped into a view.
struct Feed<T: Document> {
    key: ParcelKey,
    mirror: CollectionMirror<T>,
    view: Live<Vec<T>>,
    _forward: Subscription,
}

impl<T: Document> Feed<T> {
    fn open<F>(
        store: &dyn RemoteStore,
        key: ParcelKey,
        path: String,
        shape: F,
    ) -> Result<Self, StoreError>
    where
        F: Fn(&[T]) -> Vec<T> + Send + Sync + 'static,
    {
        let mirror = CollectionMirror::open(store, path)?;
        let view = Live::new(Vec::new());
        let sink = view.clone();
        let forward = mirror.subscribe(move |update| match update {
            Update::Value(documents) => sink.publish(shape(documents.as_slice())),
            Update::Failed(err) => sink.fail(err.clone()),
        });
        Ok(Self {
            key,
            mirror,
            view,
            _forward: forward,
        })
    }

    fn close(&self) {
        self.mirror.close();
        self.view.close();
    }
}

/// Slot holding the feed of the parcel currently listened to.
struct FeedSlot<T: Document> {
    feed: Mutex<Option<Feed<T>>>,
}

impl<T: Document> FeedSlot<T> {
    fn new() -> Self {
        Self {
            feed: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Feed<T>>> {
        self.feed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the current feed, if any, then install the one `open` builds.
    ///
    /// The slot is not locked while the old feed closes or the new one opens.
    fn replace(
        &self,
        open: impl FnOnce() -> Result<Feed<T>, StoreError>,
    ) -> Result<Live<Vec<T>>, StoreError> {
        let previous = self.lock().take();
        if let Some(previous) = previous {
            previous.close();
        }
        let feed = open()?;
        let view = feed.view.clone();
        *self.lock() = Some(feed);
        Ok(view)
    }

    fn view(&self) -> Option<Live<Vec<T>>> {
        self.lock().as_ref().map(|feed| feed.view.clone())
    }

    fn key(&self) -> Option<ParcelKey> {
        self.lock().as_ref().map(|feed| feed.key.clone())
    }

    fn close(&self) {
        let feed = self.lock().take();
        if let Some(feed) = feed {
            feed.close();
        }
    }
}
