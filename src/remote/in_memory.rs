//! InMemoryRemoteStore - HashMap-backed remote store for testing and development.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::thread;
use std::time::Duration;

use serde_json::Value;

use super::{
    split_document_path, ChangeBatch, ChangeSink, DocumentChange, RawDocument, RemoteStore,
    RemoteSubscription, TransportError,
};

struct Subscriber {
    id: u64,
    collection: String,
    sink: ChangeSink,
}

#[derive(Default)]
struct Faults {
    fail_writes: Option<String>,
    denied: HashSet<String>,
    get_delay: Option<Duration>,
}

struct Inner {
    collections: RwLock<HashMap<String, Vec<RawDocument>>>,
    subscribers: RwLock<Vec<Subscriber>>,
    faults: RwLock<Faults>,
    next_document: AtomicU64,
    next_subscriber: AtomicU64,
}

/// In-memory remote store with synchronous change delivery.
///
/// Features:
/// - Collections keep insertion order; `set` on an existing id replaces in place
/// - Every write notifies the collection's subscribers before returning
/// - A new subscription immediately receives the current documents as `Added`
/// - Fault injection: rejected writes, denied paths, slow reads, severed streams
///
/// Clone-friendly via `Arc`; clones share state.
#[derive(Clone)]
pub struct InMemoryRemoteStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                subscribers: RwLock::new(Vec::new()),
                faults: RwLock::new(Faults::default()),
                next_document: AtomicU64::new(1),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// Documents of a collection in remote order.
    pub fn documents(&self, collection: &str) -> Vec<RawDocument> {
        self.inner
            .collections
            .read()
            .map(|c| c.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Number of open subscriptions on a collection.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.inner
            .subscribers
            .read()
            .map(|s| s.iter().filter(|s| s.collection == collection).count())
            .unwrap_or_default()
    }

    /// Reject every write with `reason` until cleared with `None`.
    pub fn fail_writes(&self, reason: Option<&str>) {
        if let Ok(mut faults) = self.inner.faults.write() {
            faults.fail_writes = reason.map(str::to_string);
        }
    }

    /// Deny reads and subscriptions on a document or collection path.
    pub fn deny(&self, path: &str) {
        if let Ok(mut faults) = self.inner.faults.write() {
            faults.denied.insert(path.to_string());
        }
    }

    /// Delay every one-time `get` by `delay`.
    pub fn delay_gets(&self, delay: Option<Duration>) {
        if let Ok(mut faults) = self.inner.faults.write() {
            faults.get_delay = delay;
        }
    }

    /// Terminate every subscription on `collection` with a transport error.
    pub fn sever(&self, collection: &str, reason: &str) {
        let severed: Vec<ChangeSink> = match self.inner.subscribers.write() {
            Ok(mut subscribers) => {
                let (severed, kept): (Vec<_>, Vec<_>) = subscribers
                    .drain(..)
                    .partition(|s| s.collection == collection);
                *subscribers = kept;
                severed.into_iter().map(|s| s.sink).collect()
            }
            Err(_) => return,
        };

        for sink in severed {
            sink(Err(TransportError::Disconnected(reason.to_string())));
        }
    }

    fn check_writable(&self, path: &str) -> Result<(), TransportError> {
        let faults = self
            .inner
            .faults
            .read()
            .map_err(|_| TransportError::LockPoisoned("faults read"))?;
        if let Some(reason) = &faults.fail_writes {
            return Err(TransportError::WriteRejected {
                path: path.to_string(),
                reason: reason.clone(),
            });
        }
        if faults.denied.contains(path) {
            return Err(TransportError::PermissionDenied {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn is_denied(&self, path: &str) -> Result<bool, TransportError> {
        let faults = self
            .inner
            .faults
            .read()
            .map_err(|_| TransportError::LockPoisoned("faults read"))?;
        Ok(faults.denied.contains(path))
    }

    fn notify(&self, collection: &str, changes: Vec<DocumentChange>) -> Result<(), TransportError> {
        if changes.is_empty() {
            return Ok(());
        }

        let documents = self.documents(collection);
        let sinks: Vec<ChangeSink> = self
            .inner
            .subscribers
            .read()
            .map_err(|_| TransportError::LockPoisoned("subscribers read"))?
            .iter()
            .filter(|s| s.collection == collection)
            .map(|s| Arc::clone(&s.sink))
            .collect();

        for sink in sinks {
            sink(Ok(ChangeBatch {
                changes: changes.clone(),
                documents: documents.clone(),
            }));
        }

        Ok(())
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn subscribe(
        &self,
        collection: &str,
        sink: ChangeSink,
    ) -> Result<RemoteSubscription, TransportError> {
        if self.is_denied(collection)? {
            return Err(TransportError::PermissionDenied {
                path: collection.to_string(),
            });
        }

        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .map_err(|_| TransportError::LockPoisoned("subscribers write"))?
            .push(Subscriber {
                id,
                collection: collection.to_string(),
                sink: Arc::clone(&sink),
            });

        let documents = self.documents(collection);
        sink(Ok(ChangeBatch {
            changes: documents.iter().cloned().map(DocumentChange::added).collect(),
            documents,
        }));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(RemoteSubscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut subscribers) = inner.subscribers.write() {
                    subscribers.retain(|s| s.id != id);
                }
            }
        }))
    }

    fn get(&self, document: &str) -> Result<Option<RawDocument>, TransportError> {
        let delay = self
            .inner
            .faults
            .read()
            .map_err(|_| TransportError::LockPoisoned("faults read"))?
            .get_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        if self.is_denied(document)? {
            return Err(TransportError::PermissionDenied {
                path: document.to_string(),
            });
        }

        let Some((collection, id)) = split_document_path(document) else {
            return Ok(None);
        };

        let collections = self
            .inner
            .collections
            .read()
            .map_err(|_| TransportError::LockPoisoned("read"))?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    fn add(&self, collection: &str, data: Value) -> Result<String, TransportError> {
        self.check_writable(collection)?;

        let id = format!(
            "doc-{}",
            self.inner.next_document.fetch_add(1, Ordering::Relaxed)
        );
        let document = RawDocument::new(id.clone(), data);
        self.inner
            .collections
            .write()
            .map_err(|_| TransportError::LockPoisoned("write"))?
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());

        self.notify(collection, vec![DocumentChange::added(document)])?;
        Ok(id)
    }

    fn set(&self, document: &str, data: Value) -> Result<(), TransportError> {
        self.check_writable(document)?;
        let (collection, id) =
            split_document_path(document).ok_or_else(|| TransportError::WriteRejected {
                path: document.to_string(),
                reason: "not a document path".to_string(),
            })?;

        let change = {
            let mut collections = self
                .inner
                .collections
                .write()
                .map_err(|_| TransportError::LockPoisoned("write"))?;
            let docs = collections.entry(collection.to_string()).or_default();
            let replacement = RawDocument::new(id, data);
            match docs.iter_mut().find(|d| d.id == id) {
                Some(existing) => {
                    *existing = replacement.clone();
                    DocumentChange::modified(replacement)
                }
                None => {
                    docs.push(replacement.clone());
                    DocumentChange::added(replacement)
                }
            }
        };

        self.notify(collection, vec![change])
    }

    fn delete(&self, document: &str) -> Result<(), TransportError> {
        self.check_writable(document)?;
        let Some((collection, id)) = split_document_path(document) else {
            return Ok(());
        };

        let removed = {
            let mut collections = self
                .inner
                .collections
                .write()
                .map_err(|_| TransportError::LockPoisoned("write"))?;
            collections.get_mut(collection).and_then(|docs| {
                let index = docs.iter().position(|d| d.id == id)?;
                Some(docs.remove(index))
            })
        };

        match removed {
            Some(document) => self.notify(collection, vec![DocumentChange::removed(document)]),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ChangeKind;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording_sink() -> (Arc<Mutex<Vec<Result<ChangeBatch, TransportError>>>>, ChangeSink) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ChangeSink = Arc::new(move |batch: Result<ChangeBatch, TransportError>| {
            sink_seen.lock().unwrap().push(batch)
        });
        (seen, sink)
    }

    #[test]
    fn subscribe_delivers_current_documents_first() {
        let store = InMemoryRemoteStore::new();
        store.set("users/u1/vineyards/a", json!({"name": "A"})).unwrap();

        let (seen, sink) = recording_sink();
        let _sub = store.subscribe("users/u1/vineyards", sink).unwrap();

        let seen = seen.lock().unwrap();
        let batch = seen[0].as_ref().unwrap();
        assert_eq!(batch.changes.len(), 1);
        assert_eq!(batch.changes[0].kind, ChangeKind::Added);
        assert_eq!(batch.documents[0].id, "a");
    }

    #[test]
    fn writes_are_tagged() {
        let store = InMemoryRemoteStore::new();
        let (seen, sink) = recording_sink();
        let _sub = store.subscribe("c", sink).unwrap();

        let id = store.add("c", json!({"v": 1})).unwrap();
        store.set(&format!("c/{}", id), json!({"v": 2})).unwrap();
        store.delete(&format!("c/{}", id)).unwrap();
        store.delete("c/missing").unwrap();

        let kinds: Vec<ChangeKind> = seen
            .lock()
            .unwrap()
            .iter()
            .skip(1)
            .map(|b| b.as_ref().unwrap().changes[0].kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Added, ChangeKind::Modified, ChangeKind::Removed]
        );
    }

    #[test]
    fn set_replaces_in_place() {
        let store = InMemoryRemoteStore::new();
        store.set("c/a", json!(1)).unwrap();
        store.set("c/b", json!(2)).unwrap();
        store.set("c/a", json!(3)).unwrap();

        let docs = store.documents("c");
        assert_eq!(docs[0], RawDocument::new("a", json!(3)));
        assert_eq!(docs[1].id, "b");
    }

    #[test]
    fn faults_are_reported() {
        let store = InMemoryRemoteStore::new();
        store.set("c/a", json!(1)).unwrap();

        store.deny("c/a");
        assert!(matches!(
            store.get("c/a"),
            Err(TransportError::PermissionDenied { .. })
        ));

        store.fail_writes(Some("offline"));
        assert!(matches!(
            store.add("c", json!(1)),
            Err(TransportError::WriteRejected { .. })
        ));
        store.fail_writes(None);
        assert!(store.add("c", json!(1)).is_ok());
    }

    #[test]
    fn sever_terminates_and_unsubscribes() {
        let store = InMemoryRemoteStore::new();
        let (seen, sink) = recording_sink();
        let _sub = store.subscribe("c", sink).unwrap();

        store.sever("c", "network lost");
        store.add("c", json!(1)).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[1],
            Err(TransportError::Disconnected("network lost".into()))
        );
        assert_eq!(store.subscriber_count("c"), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = InMemoryRemoteStore::new();
        let (_seen, sink) = recording_sink();
        let sub = store.subscribe("c", sink).unwrap();
        assert_eq!(store.subscriber_count("c"), 1);
        drop(sub);
        assert_eq!(store.subscriber_count("c"), 0);
    }
}
