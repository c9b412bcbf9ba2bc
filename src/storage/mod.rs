//! Durable storage collaborators
//!
//! The image cache and the bookmark store never touch the filesystem or the
//! database directly. They talk to the two traits defined here, which keeps
//! the stores testable with in-memory doubles that can be told to fail.

mod memory;
mod settings;
mod sqlite;

pub use memory::{MemoryImageStore, MemorySettingsStore};
pub use settings::FileSettingsStore;
pub use sqlite::SqliteImageStore;

use thiserror::Error;

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite query failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable byte store addressed by string key
///
/// Backs small pieces of application state such as the bookmark blob and the
/// image cache refresh marker. A `set` replaces any previous value.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, or `None` if nothing is stored
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Removes the value stored under `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A downloaded image keyed by its source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub url: String,
    pub data: Vec<u8>,
}

/// Durable record set of cached images
///
/// At most one record exists per URL; inserting a URL that is already stored
/// replaces its data.
pub trait ImageRecordStore: Send {
    /// Inserts or replaces the record for `image.url`
    fn insert(&mut self, image: CachedImage) -> Result<(), StorageError>;

    /// Fetches the record whose URL equals `url` exactly
    fn fetch(&self, url: &str) -> Result<Option<CachedImage>, StorageError>;

    /// Deletes every record, returning how many were removed
    fn delete_all(&mut self) -> Result<usize, StorageError>;

    /// Number of stored records
    fn count(&self) -> Result<usize, StorageError>;
}
