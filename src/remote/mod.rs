//! Remote document store - the narrow boundary to persistence.
//!
//! The synchronization layer only ever talks to a [`RemoteStore`]: push
//! subscriptions on collections, one-time reads of single documents, and
//! per-document writes. Documents travel as raw JSON; typed decoding happens
//! in the mirrors and stores.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   subscribe(collection)   ┌───────────────────┐
//! │  CollectionMirror<T> │ <──────── ChangeBatch ─── │    RemoteStore    │
//! └──────────────────────┘                           │  (Firestore-like) │
//! ┌──────────────────────┐   get / add / set / delete│                   │
//! │ Vineyard/Action/...  │ ────────────────────────> │                   │
//! └──────────────────────┘                           └───────────────────┘
//! ```

mod in_memory;

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use in_memory::InMemoryRemoteStore;

/// Failure on the remote stream or on a remote write/read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("remote stream disconnected: {0}")]
    Disconnected(String),
    #[error("permission denied for {path}")]
    PermissionDenied { path: String },
    #[error("remote write rejected for {path}: {reason}")]
    WriteRejected { path: String, reason: String },
    #[error("remote request timed out after {millis} ms: {path}")]
    Timeout { path: String, millis: u64 },
    #[error("remote lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// A document as the remote store reports it: its id plus its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub data: Value,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// How a document changed in one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Removed => write!(f, "removed"),
        }
    }
}

/// One tagged document change. Removed changes carry the last known body.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: RawDocument,
}

impl DocumentChange {
    pub fn added(document: RawDocument) -> Self {
        Self {
            kind: ChangeKind::Added,
            document,
        }
    }

    pub fn modified(document: RawDocument) -> Self {
        Self {
            kind: ChangeKind::Modified,
            document,
        }
    }

    pub fn removed(document: RawDocument) -> Self {
        Self {
            kind: ChangeKind::Removed,
            document,
        }
    }
}

/// One push notification: the tagged changes since the previous
/// notification, plus the full current document set in remote order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeBatch {
    pub changes: Vec<DocumentChange>,
    pub documents: Vec<RawDocument>,
}

impl ChangeBatch {
    pub fn added(&self) -> impl Iterator<Item = &RawDocument> {
        self.of_kind(ChangeKind::Added)
    }

    pub fn modified(&self) -> impl Iterator<Item = &RawDocument> {
        self.of_kind(ChangeKind::Modified)
    }

    pub fn removed_ids(&self) -> impl Iterator<Item = &str> {
        self.of_kind(ChangeKind::Removed).map(|d| d.id.as_str())
    }

    fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &RawDocument> {
        self.changes
            .iter()
            .filter(move |c| c.kind == kind)
            .map(|c| &c.document)
    }
}

/// Callback the remote store pushes notifications into. An `Err` is terminal.
pub type ChangeSink = Arc<dyn Fn(Result<ChangeBatch, TransportError>) + Send + Sync>;

/// Handle on an open remote subscription. Dropping it unsubscribes.
pub struct RemoteSubscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl RemoteSubscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Release the subscription. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for RemoteSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The remote document store collaborator.
///
/// Paths are slash-separated: collections have an odd number of segments
/// (`users/u1/vineyards`), documents an even number
/// (`users/u1/vineyards/v1`).
pub trait RemoteStore: Send + Sync {
    /// Start pushing change notifications for a collection into `sink`.
    fn subscribe(
        &self,
        collection: &str,
        sink: ChangeSink,
    ) -> Result<RemoteSubscription, TransportError>;

    /// One-time read of a single document.
    fn get(&self, document: &str) -> Result<Option<RawDocument>, TransportError>;

    /// Create a document with a store-assigned id. Returns the id.
    fn add(&self, collection: &str, data: Value) -> Result<String, TransportError>;

    /// Create or wholesale replace a document.
    fn set(&self, document: &str, data: Value) -> Result<(), TransportError>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&self, document: &str) -> Result<(), TransportError>;
}

/// Split a document path into its collection path and document id.
pub fn split_document_path(path: &str) -> Option<(&str, &str)> {
    let (collection, id) = path.rsplit_once('/')?;
    if collection.is_empty() || id.is_empty() {
        return None;
    }
    Some((collection, id))
}
