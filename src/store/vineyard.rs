use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use chrono::{Datelike, Local};
use tracing::{debug, error, warn};

use crate::config::SyncConfig;
use crate::error::StoreError;
use crate::geometry::{self, geojson, Point, Polygon};
use crate::live::{Live, Subscription, Update};
use crate::mirror::CollectionMirror;
use crate::model::{Document, Meteo, Parcel, ParcelDoc, ParcelKey, SharedParcelRef};
use crate::paths;
use crate::remote::{RemoteStore, TransportError};

/// Latest inputs to the parcel union.
#[derive(Default)]
struct Sources {
    own: Vec<ParcelDoc>,
    /// Resolved shared parcels with their owner uid, in reference order.
    shared: Vec<(String, ParcelDoc)>,
}

struct Inner {
    store: Arc<dyn RemoteStore>,
    user_id: String,
    config: SyncConfig,
    sources: Mutex<Sources>,
    parcels: Live<Vec<Parcel>>,
    active_id: Mutex<Option<String>>,
    active: Live<Option<Parcel>>,
    seasons: Live<Vec<i32>>,
}

/// The user's own and shared parcels, merged into one live set.
///
/// ```text
///   users/{uid}/vineyards ───────► own mirror ──────────────┐
///                                                            ├─► union ─► list()
///   users/{uid}/sharedVineyards ─► shared mirror ─► get() ───┘
///                                    (one fetch per reference)
/// ```
///
/// Every resident parcel carries its boundary in the working projection.
/// Writes go to the remote store; the union only changes when a mirror
/// republishes, except for [`update_boundary`](Self::update_boundary) and
/// [`delete`](Self::delete).
pub struct VineyardStore {
    inner: Arc<Inner>,
    own: CollectionMirror<ParcelDoc>,
    shared: CollectionMirror<SharedParcelRef>,
    _own_listener: Subscription,
    _shared_listener: Subscription,
}

impl VineyardStore {
    /// Start mirroring the parcels of `user_id`.
    pub fn open(
        store: Arc<dyn RemoteStore>,
        user_id: impl Into<String>,
        config: SyncConfig,
    ) -> Result<Self, StoreError> {
        let user_id = user_id.into();
        let own = CollectionMirror::open(store.as_ref(), paths::parcels(&user_id))?;
        let shared = CollectionMirror::open(store.as_ref(), paths::shared_refs(&user_id))?;

        let inner = Arc::new(Inner {
            store,
            user_id,
            config,
            sources: Mutex::new(Sources::default()),
            parcels: Live::new(Vec::new()),
            active_id: Mutex::new(None),
            active: Live::new(None),
            seasons: Live::new(vec![Local::now().year()]),
        });

        let own_inner = Arc::clone(&inner);
        let own_listener = own.subscribe(move |update| match update {
            Update::Value(docs) => {
                own_inner.sources().own = docs.clone();
                own_inner.recompute();
            }
            Update::Failed(err) => own_inner.fail(err.clone()),
        });

        let shared_inner = Arc::clone(&inner);
        let shared_listener = shared.subscribe(move |update| match update {
            Update::Value(references) => {
                let resolved = shared_inner.resolve_shared(references);
                shared_inner.sources().shared = resolved;
                shared_inner.recompute();
            }
            Update::Failed(err) => shared_inner.fail(err.clone()),
        });

        Ok(Self {
            inner,
            own,
            shared,
            _own_listener: own_listener,
            _shared_listener: shared_listener,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Live union: own parcels first, then resolved shared parcels.
    pub fn list(&self) -> Live<Vec<Parcel>> {
        self.inner.parcels.clone()
    }

    /// The last published union.
    pub fn parcels(&self) -> Vec<Parcel> {
        self.inner.parcels.get()
    }

    pub fn get(&self, id: &str) -> Option<Parcel> {
        self.inner
            .parcels
            .with(|parcels| parcels.iter().find(|p| p.id == id).cloned())
    }

    /// Select a parcel by id, or clear the selection.
    pub fn set_active(&self, id: Option<&str>) -> Result<(), StoreError> {
        let selected = match id {
            Some(id) => Some(
                self.get(id)
                    .ok_or_else(|| StoreError::not_found(ParcelDoc::COLLECTION, id))?,
            ),
            None => None,
        };
        *self.inner.active_id() = id.map(str::to_string);
        self.inner.active.publish(selected);
        Ok(())
    }

    /// Live selection. Follows the union: refreshed when the selected parcel
    /// changes, `None` once it leaves the union.
    pub fn active_parcel(&self) -> Live<Option<Parcel>> {
        self.inner.active.clone()
    }

    pub fn set_active_seasons(&self, seasons: Vec<i32>) {
        self.inner.seasons.publish(seasons);
    }

    /// Live season selection; starts with the current calendar year.
    pub fn active_seasons(&self) -> Live<Vec<i32>> {
        self.inner.seasons.clone()
    }

    /// Replace a resident boundary without persisting it.
    ///
    /// The union republishes immediately. A mirror republication before
    /// [`save`](Self::save) overwrites the edit.
    pub fn update_boundary(&self, id: &str, boundary: Polygon) -> Result<(), StoreError> {
        let found = self
            .inner
            .parcels
            .with(|parcels| parcels.iter().any(|p| p.id == id));
        if !found {
            return Err(StoreError::not_found(ParcelDoc::COLLECTION, id));
        }

        self.inner.parcels.update(|parcels| {
            if let Some(parcel) = parcels.iter_mut().find(|p| p.id == id) {
                parcel.boundary = boundary;
            }
        });
        self.inner.refresh_active();
        Ok(())
    }

    /// Write the listed parcels, boundaries projected back to storage, to
    /// their owners' collections.
    ///
    /// Returns once the writes are accepted; the union reflects them only
    /// after the mirror echoes them back.
    pub fn save(&self, ids: &[&str]) -> Result<(), StoreError> {
        let parcels = self.inner.parcels.get();
        let mut selected = Vec::with_capacity(ids.len());
        for id in ids {
            let parcel = parcels
                .iter()
                .find(|p| p.id == *id)
                .ok_or_else(|| StoreError::not_found(ParcelDoc::COLLECTION, *id))?;
            selected.push(parcel);
        }

        let config = &self.inner.config;
        for parcel in selected {
            let doc = parcel.to_doc(config.working_projection, config.storage_projection)?;
            self.inner
                .store
                .set(&paths::parcel(&parcel.key()), doc.encode()?)?;
            debug!(parcel_id = %parcel.id, owner = %parcel.owner, "parcel saved");
        }
        Ok(())
    }

    /// Create an empty parcel in the user's own collection. Returns its id.
    ///
    /// The parcel shows up in [`list`](Self::list) once the mirror republishes.
    pub fn create(
        &self,
        name: &str,
        address: Option<&str>,
        boundary: &Polygon,
    ) -> Result<String, StoreError> {
        let config = &self.inner.config;
        let stored =
            geometry::to_storage(boundary, config.working_projection, config.storage_projection)?;
        let doc = ParcelDoc {
            id: String::new(),
            name: name.to_string(),
            address: address.map(str::to_string),
            location: geojson::write_polygon(&stored)?,
            actions: Vec::new(),
            varieties: Vec::new(),
            meteo: Meteo::default(),
        };

        let id = self
            .inner
            .store
            .add(&paths::parcels(&self.inner.user_id), doc.encode()?)?;
        debug!(parcel_id = %id, "parcel created");
        Ok(id)
    }

    /// Delete an owned parcel remotely and drop it from the union right away.
    ///
    /// For a shared parcel only the viewer's references to it are deleted;
    /// the owner's document is left alone.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let user_id = &self.inner.user_id;
        let shared = self.get(id).filter(|p| p.shared);
        match &shared {
            Some(parcel) => {
                let references: Vec<String> = self
                    .shared
                    .snapshot()
                    .into_iter()
                    .filter(|r| r.vineyard == parcel.id && r.user == parcel.owner)
                    .map(|r| r.id)
                    .collect();
                for reference in &references {
                    self.inner.store.delete(&paths::shared_ref(user_id, reference))?;
                }
                debug!(
                    parcel_id = %id,
                    owner = %parcel.owner,
                    references = references.len(),
                    "shared parcel unlinked"
                );
            }
            None => {
                let key = ParcelKey::new(user_id.clone(), id);
                self.inner.store.delete(&paths::parcel(&key))?;
                debug!(parcel_id = %id, "parcel deleted");
            }
        }

        let is_shared = shared.is_some();
        {
            let mut sources = self.inner.sources();
            if is_shared {
                sources.shared.retain(|(_, d)| d.id != id);
            } else {
                sources.own.retain(|d| d.id != id);
            }
        }
        self.inner
            .parcels
            .update(|parcels| parcels.retain(|p| p.id != id || p.shared != is_shared));
        self.inner.refresh_active();
        Ok(())
    }

    /// Center of the parcel's extent, in the storage projection.
    pub fn location(&self, parcel: &Parcel) -> Result<Point, StoreError> {
        let config = &self.inner.config;
        Ok(geometry::extent_center(
            &parcel.boundary,
            config.working_projection,
            config.storage_projection,
        )?)
    }

    /// Stop both mirrors and every live value. Idempotent.
    pub fn close(&self) {
        self.own.close();
        self.shared.close();
        self.inner.parcels.close();
        self.inner.active.close();
        self.inner.seasons.close();
    }
}

impl Drop for VineyardStore {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    fn sources(&self) -> MutexGuard<'_, Sources> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_id(&self) -> MutexGuard<'_, Option<String>> {
        self.active_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild the union from the latest sources and publish it.
    ///
    /// Runs inside the live update so concurrent rebuilds publish in the
    /// order they read their sources.
    fn recompute(&self) {
        let config = &self.config;
        self.parcels.update(|parcels| {
            let sources = self.sources();
            let mut union = Vec::with_capacity(sources.own.len() + sources.shared.len());

            let own = sources.own.iter().map(|doc| (self.user_id.as_str(), doc, false));
            let shared = sources.shared.iter().map(|(owner, doc)| (owner.as_str(), doc, true));
            for (owner, doc, is_shared) in own.chain(shared) {
                match Parcel::from_doc(
                    doc.clone(),
                    owner,
                    is_shared,
                    config.storage_projection,
                    config.working_projection,
                ) {
                    Ok(parcel) => union.push(parcel),
                    Err(err) => warn!(
                        parcel_id = %doc.id,
                        owner = %owner,
                        error = %err,
                        "dropping parcel with invalid boundary"
                    ),
                }
            }

            debug!(
                own = sources.own.len(),
                shared = sources.shared.len(),
                published = union.len(),
                "parcel union recomputed"
            );
            *parcels = union;
        });
        self.refresh_active();
    }

    fn refresh_active(&self) {
        let Some(id) = self.active_id().clone() else {
            return;
        };
        let current = self
            .parcels
            .with(|parcels| parcels.iter().find(|p| p.id == id).cloned());
        if self.active.with(|active| *active != current) {
            self.active.publish(current);
        }
    }

    fn fail(&self, err: TransportError) {
        error!(user_id = %self.user_id, error = %err, "parcel union stopped");
        self.parcels.fail(err);
    }

    /// Fetch every referenced parcel once, concurrently, bounded by the
    /// configured timeout. Unresolvable references are logged and dropped.
    fn resolve_shared(&self, references: &[SharedParcelRef]) -> Vec<(String, ParcelDoc)> {
        if references.is_empty() {
            return Vec::new();
        }

        let (tx, rx) = mpsc::channel();
        let targets: Vec<String> = references
            .iter()
            .map(|r| paths::parcel(&ParcelKey::new(r.user.clone(), r.vineyard.clone())))
            .collect();

        for (index, path) in targets.iter().enumerate() {
            let tx = tx.clone();
            let store = Arc::clone(&self.store);
            let path = path.clone();
            thread::spawn(move || {
                let outcome = fetch_parcel(store.as_ref(), &path);
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);

        let timeout = self.config.shared_fetch_timeout;
        let deadline = Instant::now() + timeout;
        let mut outcomes: Vec<Option<Result<ParcelDoc, StoreError>>> =
            (0..references.len()).map(|_| None).collect();
        let mut pending = references.len();
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((index, outcome)) => {
                    outcomes[index] = Some(outcome);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut resolved = Vec::with_capacity(references.len());
        for ((reference, path), outcome) in references.iter().zip(&targets).zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                Err(StoreError::Resolution {
                    path: path.clone(),
                    reason: format!("no answer within {} ms", timeout.as_millis()),
                })
            });
            match outcome {
                Ok(doc) => resolved.push((reference.user.clone(), doc)),
                Err(err) => warn!(
                    reference = %reference.id,
                    owner = %reference.user,
                    parcel_id = %reference.vineyard,
                    error = %err,
                    "dropping unresolvable shared parcel"
                ),
            }
        }
        resolved
    }
}

fn fetch_parcel(store: &dyn RemoteStore, path: &str) -> Result<ParcelDoc, StoreError> {
    let resolution = |reason: String| StoreError::Resolution {
        path: path.to_string(),
        reason,
    };
    let raw = store
        .get(path)
        .map_err(|err| resolution(err.to_string()))?
        .ok_or_else(|| resolution("document not found".to_string()))?;
    ParcelDoc::decode(&raw).map_err(|err| resolution(err.to_string()))
}
