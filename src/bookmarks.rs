//! Bookmarked desserts persisted across launches
//!
//! The whole bookmark map is stored as one JSON blob in a [`KeyValueStore`]
//! and rewritten on every toggle; removing the last bookmark deletes the
//! blob. Observers subscribe to a watch channel that
//! always holds the latest committed map.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::data::Dessert;
use crate::storage::{KeyValueStore, StorageError};

/// Settings key of the serialized bookmark map
pub const BOOKMARKS_KEY: &str = "bookmarks";

/// Bookmarked desserts keyed by dessert id
pub type Bookmarks = BTreeMap<String, Dessert>;

/// Durable, observable set of bookmarked desserts
///
/// Each entry is a snapshot of the dessert at the time it was bookmarked.
/// Mutations take `&mut self`, so all writes go through the store's owner.
pub struct BookmarkStore {
    settings: Arc<dyn KeyValueStore>,
    sender: watch::Sender<Bookmarks>,
}

impl BookmarkStore {
    /// Loads persisted bookmarks; missing or unreadable data yields an empty store
    pub fn open(settings: Arc<dyn KeyValueStore>) -> Self {
        let bookmarks = load(settings.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "discarding unreadable bookmarks");
            Bookmarks::new()
        });
        tracing::debug!(count = bookmarks.len(), "bookmarks loaded");

        let (sender, _) = watch::channel(bookmarks);
        Self { settings, sender }
    }

    pub fn is_bookmarked(&self, dessert_id: &str) -> bool {
        self.sender.borrow().contains_key(dessert_id)
    }

    /// Bookmarks `dessert` if it is not bookmarked, otherwise removes it
    ///
    /// The new map is persisted before it is published. If persisting fails
    /// nothing changes and the current membership is returned. Returns whether
    /// the dessert is bookmarked afterwards.
    pub fn toggle(&mut self, dessert: &Dessert) -> bool {
        if dessert.id.is_empty() {
            tracing::warn!(name = %dessert.name, "refusing to bookmark a dessert without an id");
            return false;
        }

        let was_bookmarked = self.is_bookmarked(&dessert.id);
        let mut next = self.current();
        if was_bookmarked {
            next.remove(&dessert.id);
        } else {
            next.insert(dessert.id.clone(), dessert.clone());
        }

        if let Err(e) = self.persist(&next) {
            tracing::warn!(id = %dessert.id, error = %e, "failed to save bookmarks");
            return was_bookmarked;
        }

        self.sender.send_replace(next);
        tracing::debug!(id = %dessert.id, bookmarked = !was_bookmarked, "bookmark toggled");
        !was_bookmarked
    }

    /// Snapshot of the current bookmark map
    pub fn current(&self) -> Bookmarks {
        self.sender.borrow().clone()
    }

    /// Receiver that observes every committed change to the bookmark map
    pub fn subscribe(&self) -> watch::Receiver<Bookmarks> {
        self.sender.subscribe()
    }

    /// An empty map removes the stored blob
    fn persist(&self, bookmarks: &Bookmarks) -> Result<(), StorageError> {
        if bookmarks.is_empty() {
            return self.settings.remove(BOOKMARKS_KEY);
        }
        let bytes = serde_json::to_vec(bookmarks)?;
        self.settings.set(BOOKMARKS_KEY, &bytes)
    }
}

/// Bookmarked desserts ordered by name for display
pub fn sorted_by_name(bookmarks: &Bookmarks) -> Vec<Dessert> {
    let mut desserts: Vec<Dessert> = bookmarks.values().cloned().collect();
    desserts.sort_by(|a, b| a.name.cmp(&b.name));
    desserts
}

fn load(settings: &dyn KeyValueStore) -> Result<Bookmarks, StorageError> {
    match settings.get(BOOKMARKS_KEY)? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(Bookmarks::new()),
    }
}
