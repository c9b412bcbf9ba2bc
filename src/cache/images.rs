//! Persistent image cache with a weekly full purge
//!
//! Maps an image's source URL to the bytes downloaded for it. The cache is
//! advisory: storage failures are logged and the cache behaves as if the
//! image were not there, so callers fall back to the network.

use chrono::{DateTime, Local, Utc};
use std::sync::Arc;

use super::policy::{Clock, RefreshPolicy};
use crate::storage::{CachedImage, ImageRecordStore, KeyValueStore, StorageError};

/// Settings key of the last purge timestamp
pub const LAST_REFRESH_KEY: &str = "imageCacheLastRefreshDate";

/// URL-keyed image cache
///
/// Mutations take `&mut self`; the cache is meant to have a single owner that
/// every insert is funneled through.
pub struct ImageCache {
    records: Box<dyn ImageRecordStore>,
    settings: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
    last_refresh: DateTime<Local>,
}

impl ImageCache {
    /// Opens the cache and loads the refresh marker
    ///
    /// On first run there is no marker yet; it is set to the current time
    /// without purging.
    pub fn open(
        records: Box<dyn ImageRecordStore>,
        settings: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        policy: RefreshPolicy,
    ) -> Self {
        let stored = read_marker(settings.as_ref());

        let mut cache = Self {
            records,
            settings,
            last_refresh: stored.unwrap_or_else(|| clock.now()),
            clock,
            policy,
        };

        if stored.is_none() {
            tracing::debug!("no image cache refresh marker, starting a new one");
            cache.commit_marker(cache.last_refresh);
        }

        cache
    }

    /// Returns the cached bytes for `url`, if any
    pub fn lookup(&self, url: &str) -> Option<Vec<u8>> {
        match self.records.fetch(url) {
            Ok(Some(image)) => {
                tracing::debug!(url, "image cache hit");
                Some(image.data)
            }
            Ok(None) => {
                tracing::debug!(url, "image cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "image cache read failed");
                None
            }
        }
    }

    /// Stores `data` for `url`, replacing any earlier entry
    pub fn insert(&mut self, url: &str, data: Vec<u8>) {
        let image = CachedImage {
            url: url.to_string(),
            data,
        };
        if let Err(e) = self.records.insert(image) {
            tracing::warn!(url, error = %e, "failed to cache image");
        }
    }

    /// Purges every cached image if the refresh policy says it is time
    ///
    /// Call on launch and whenever the application comes back to the
    /// foreground. Returns whether a purge ran.
    pub fn refresh_if_due(&mut self) -> bool {
        let now = self.clock.now();
        if !self.policy.should_purge(self.last_refresh, now) {
            return false;
        }

        match self.records.delete_all() {
            Ok(removed) => {
                tracing::info!(removed, "image cache purged");
                self.commit_marker(now);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "image cache purge failed");
                false
            }
        }
    }

    /// Number of cached images; 0 if the store cannot be read
    pub fn len(&self) -> usize {
        self.records.count().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to count cached images");
            0
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the cache was last purged (or first created)
    pub fn last_refresh(&self) -> DateTime<Local> {
        self.last_refresh
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    fn commit_marker(&mut self, at: DateTime<Local>) {
        self.last_refresh = at;

        let result = serde_json::to_vec(&at.with_timezone(&Utc))
            .map_err(StorageError::from)
            .and_then(|bytes| self.settings.set(LAST_REFRESH_KEY, &bytes));

        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist image cache refresh marker");
        }
    }
}

fn read_marker(settings: &dyn KeyValueStore) -> Option<DateTime<Local>> {
    let bytes = match settings.get(LAST_REFRESH_KEY) {
        Ok(bytes) => bytes?,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read image cache refresh marker");
            return None;
        }
    };

    match serde_json::from_slice::<DateTime<Utc>>(&bytes) {
        Ok(at) => Some(at.with_timezone(&Local)),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed image cache refresh marker");
            None
        }
    }
}
