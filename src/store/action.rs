use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use super::{Feed, FeedSlot};
use crate::error::StoreError;
use crate::live::Live;
use crate::model::{Action, Document, ParcelKey};
use crate::paths;
use crate::remote::RemoteStore;
use crate::render::{Markdown, MarkupRenderer};

/// Live action log of one parcel at a time.
///
/// Published actions are sorted by date, most recent first; actions on the
/// same date keep the order the remote store reports them in. Each carries
/// its rendered description in `html`.
pub struct ActionStore {
    store: Arc<dyn RemoteStore>,
    renderer: Arc<dyn MarkupRenderer>,
    slot: FeedSlot<Action>,
}

impl ActionStore {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            renderer: Arc::new(Markdown),
            slot: FeedSlot::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: impl MarkupRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Mirror the actions of `key`, replacing any previous parcel's feed.
    ///
    /// The view returned for the previous parcel is closed.
    pub fn listen(&self, key: &ParcelKey) -> Result<Live<Vec<Action>>, StoreError> {
        let renderer = Arc::clone(&self.renderer);
        let view = self.slot.replace(|| {
            Feed::open(
                self.store.as_ref(),
                key.clone(),
                paths::actions(key),
                move |actions: &[Action]| present(actions, renderer.as_ref()),
            )
        })?;
        debug!(owner = %key.owner, parcel_id = %key.parcel_id, "listening to actions");
        Ok(view)
    }

    /// View of the parcel currently listened to.
    pub fn actions(&self) -> Option<Live<Vec<Action>>> {
        self.slot.view()
    }

    pub fn listening(&self) -> Option<ParcelKey> {
        self.slot.key()
    }

    /// Create an action. Returns it with its new id and rendered text.
    pub fn add(&self, key: &ParcelKey, action: Action) -> Result<Action, StoreError> {
        let id = self.store.add(&paths::actions(key), action.encode()?)?;
        let mut added = action;
        added.id = id;
        Ok(self.render(added))
    }

    /// Replace an action wholesale.
    pub fn update(&self, key: &ParcelKey, action: Action) -> Result<Action, StoreError> {
        if action.id.is_empty() {
            return Err(StoreError::not_found(Action::COLLECTION, ""));
        }
        self.store
            .set(&paths::action(key, &action.id), action.encode()?)?;
        Ok(self.render(action))
    }

    pub fn remove(&self, key: &ParcelKey, action_id: &str) -> Result<(), StoreError> {
        self.store.delete(&paths::action(key, action_id))?;
        Ok(())
    }

    /// Stop the current feed. Idempotent.
    pub fn close(&self) {
        self.slot.close();
    }

    fn render(&self, mut action: Action) -> Action {
        action.html = self.renderer.render(&action.description);
        action
    }
}

impl Drop for ActionStore {
    fn drop(&mut self) {
        self.close();
    }
}

fn present(actions: &[Action], renderer: &dyn MarkupRenderer) -> Vec<Action> {
    let mut sorted = actions.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    for action in &mut sorted {
        action.html = renderer.render(&action.description);
    }
    sorted
}

/// Date of the last action in the given order.
///
/// This is the most recent date only for an ascending slice; on the
/// store's descending view it is the oldest.
pub fn last_update_date(actions: &[Action]) -> Option<NaiveDate> {
    actions.last().map(|a| a.date)
}
