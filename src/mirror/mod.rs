//! Collection mirrors - live local replicas of remote collections.
//!
//! A [`CollectionMirror`] subscribes to one remote collection, folds every
//! tagged change notification into an ordered snapshot, and republishes the
//! whole snapshot through a [`Live`] cell. Before the first notification the
//! snapshot is empty. A transport error terminates the mirror; it does not
//! reconnect.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use vineyard_sync::mirror::CollectionMirror;
//! use vineyard_sync::model::Vintage;
//! use vineyard_sync::remote::{InMemoryRemoteStore, RemoteStore};
//!
//! let store = Arc::new(InMemoryRemoteStore::new());
//! let mirror = CollectionMirror::<Vintage>::open(store.as_ref(), "users/u1/vineyards/p1/vintages").unwrap();
//!
//! store
//!     .add("users/u1/vineyards/p1/vintages", json!({"year": 2023, "status": "growing"}))
//!     .unwrap();
//!
//! assert_eq!(mirror.snapshot().len(), 1);
//! mirror.close();
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, warn};

use crate::live::{Live, Subscription, Update};
use crate::model::Document;
use crate::remote::{
    ChangeBatch, ChangeKind, ChangeSink, RemoteStore, RemoteSubscription, TransportError,
};

/// Live mirror of one remote collection.
pub struct CollectionMirror<T: Document> {
    path: String,
    snapshot: Live<Vec<T>>,
    subscription: Mutex<Option<RemoteSubscription>>,
}

impl<T: Document> CollectionMirror<T> {
    /// Start listening on `path`.
    pub fn open(store: &dyn RemoteStore, path: impl Into<String>) -> Result<Self, TransportError> {
        let path = path.into();
        let snapshot: Live<Vec<T>> = Live::new(Vec::new());

        let sink_snapshot = snapshot.clone();
        let sink_path = path.clone();
        let sink: ChangeSink = Arc::new(move |batch: Result<ChangeBatch, TransportError>| {
            match batch {
                Ok(batch) => {
                    sink_snapshot.update(|documents| fold_changes(documents, &batch, &sink_path));
                }
                Err(err) => {
                    error!(collection = %sink_path, error = %err, "mirror stream failed");
                    sink_snapshot.fail(err);
                }
            }
        });

        let subscription = store.subscribe(&path, sink)?;
        debug!(collection = %path, "mirror opened");

        Ok(Self {
            path,
            snapshot,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Vec<T> {
        self.snapshot.get()
    }

    /// The underlying live cell, for wiring into other stores.
    pub fn live(&self) -> &Live<Vec<T>> {
        &self.snapshot
    }

    /// Observe full-snapshot publications, starting with the latest one.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Update<'_, Vec<T>>) + Send + Sync + 'static,
    {
        self.snapshot.subscribe(listener)
    }

    /// Release the remote subscription. Idempotent; nothing is published after it.
    pub fn close(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut subscription) = subscription {
            subscription.cancel();
            debug!(collection = %self.path, "mirror closed");
        }
        self.snapshot.close();
    }

    pub fn is_closed(&self) -> bool {
        self.snapshot.is_closed()
    }
}

impl<T: Document> Drop for CollectionMirror<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fold one notification into the snapshot, in change order.
///
/// Removed documents drop out, modified documents replace in place by id,
/// added documents append. An addition whose id is already present replaces
/// that document in place, so an id appears at most once. Undecodable
/// documents are skipped; an undecodable modification also evicts the stale
/// copy.
pub fn fold_changes<T: Document>(documents: &mut Vec<T>, batch: &ChangeBatch, collection: &str) {
    for change in &batch.changes {
        let id = change.document.id.as_str();
        match change.kind {
            ChangeKind::Removed => documents.retain(|d| d.id() != id),
            ChangeKind::Added | ChangeKind::Modified => match T::decode(&change.document) {
                Ok(decoded) => match documents.iter_mut().find(|d| d.id() == id) {
                    Some(slot) => {
                        if change.kind == ChangeKind::Added {
                            debug!(
                                collection = %collection,
                                document = %id,
                                "added document already mirrored, replacing in place"
                            );
                        }
                        *slot = decoded;
                    }
                    None => documents.push(decoded),
                },
                Err(err) => {
                    warn!(
                        collection = %collection,
                        document = %id,
                        change = %change.kind,
                        error = %err,
                        "skipping undecodable document"
                    );
                    if change.kind == ChangeKind::Modified {
                        documents.retain(|d| d.id() != id);
                    }
                }
            },
        }
    }
}
