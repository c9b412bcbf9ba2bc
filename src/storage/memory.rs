//! In-process storage backends
//!
//! Used when no durable location is available and by tests. Both stores can
//! be switched into a failing mode to simulate a full or unreadable device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{CachedImage, ImageRecordStore, KeyValueStore, StorageError};

/// Key-value store held in memory
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set` and `remove` fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn values(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StorageError> {
        self.values
            .lock()
            .map_err(|_| StorageError::Unavailable("settings lock poisoned".to_string()))
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.check_writable()?;
        self.values()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.values()?.remove(key);
        Ok(())
    }
}

/// Image records held in memory
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    records: HashMap<String, Vec<u8>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `fetch` and `count` fail until switched back
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Makes every subsequent `insert` and `delete_all` fail until switched back
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn check(&self, failing: bool, op: &str) -> Result<(), StorageError> {
        if failing {
            return Err(StorageError::Unavailable(format!("{} disabled", op)));
        }
        Ok(())
    }
}

impl ImageRecordStore for MemoryImageStore {
    fn insert(&mut self, image: CachedImage) -> Result<(), StorageError> {
        self.check(self.fail_writes, "writes")?;
        self.records.insert(image.url, image.data);
        Ok(())
    }

    fn fetch(&self, url: &str) -> Result<Option<CachedImage>, StorageError> {
        self.check(self.fail_reads, "reads")?;
        Ok(self.records.get(url).map(|data| CachedImage {
            url: url.to_string(),
            data: data.clone(),
        }))
    }

    fn delete_all(&mut self) -> Result<usize, StorageError> {
        self.check(self.fail_writes, "writes")?;
        let removed = self.records.len();
        self.records.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize, StorageError> {
        self.check(self.fail_reads, "reads")?;
        Ok(self.records.len())
    }
}
