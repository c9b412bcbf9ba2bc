//! SQLite-backed image record store
//!
//! Images live in a single table keyed by their source URL. The primary key
//! gives the one-record-per-URL guarantee and an upsert gives last-write-wins.

use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};

use super::{CachedImage, ImageRecordStore, StorageError};

/// Image records stored in a SQLite database file
pub struct SqliteImageStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteImageStore {
    /// Opens (or creates) the database at `path` and initializes the schema
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            db_path: Some(path.to_path_buf()),
        };
        store.init_schema()?;

        tracing::debug!(path = %path.display(), "image store opened");
        Ok(store)
    }

    /// Opens a private in-memory database
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Path of the database file, if it is file-backed
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS cached_images (
                url_string      TEXT PRIMARY KEY NOT NULL,
                data            BLOB NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl ImageRecordStore for SqliteImageStore {
    fn insert(&mut self, image: CachedImage) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO cached_images (url_string, data) VALUES (?1, ?2)
             ON CONFLICT(url_string) DO UPDATE SET data = excluded.data",
            params![image.url, image.data],
        )?;
        Ok(())
    }

    fn fetch(&self, url: &str) -> Result<Option<CachedImage>, StorageError> {
        let data: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT data FROM cached_images WHERE url_string = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        Ok(data.map(|data| CachedImage {
            url: url.to_string(),
            data,
        }))
    }

    fn delete_all(&mut self) -> Result<usize, StorageError> {
        Ok(self.conn.execute("DELETE FROM cached_images", [])?)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cached_images", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn image(url: &str, data: &[u8]) -> CachedImage {
        CachedImage {
            url: url.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_insert_then_fetch_returns_data() {
        let mut store = SqliteImageStore::in_memory().expect("Store should open");

        store.insert(image("https://example.com/a.jpg", &[1, 2, 3])).unwrap();

        let fetched = store.fetch("https://example.com/a.jpg").unwrap();
        assert_eq!(fetched, Some(image("https://example.com/a.jpg", &[1, 2, 3])));
    }

    #[test]
    fn test_fetch_requires_exact_url_match() {
        let mut store = SqliteImageStore::in_memory().expect("Store should open");

        store.insert(image("https://example.com/a.jpg", &[1])).unwrap();

        assert!(store.fetch("https://example.com/a.jpg?size=small").unwrap().is_none());
        assert!(store.fetch("https://EXAMPLE.com/a.jpg").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_keeps_one_record_with_latest_data() {
        let mut store = SqliteImageStore::in_memory().expect("Store should open");

        store.insert(image("https://example.com/a.jpg", &[1])).unwrap();
        store.insert(image("https://example.com/a.jpg", &[2])).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(
            store.fetch("https://example.com/a.jpg").unwrap().unwrap().data,
            vec![2]
        );
    }

    #[test]
    fn test_delete_all_removes_every_record() {
        let mut store = SqliteImageStore::in_memory().expect("Store should open");
        store.insert(image("https://example.com/a.jpg", &[1])).unwrap();
        store.insert(image("https://example.com/b.jpg", &[2])).unwrap();

        let removed = store.delete_all().unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.fetch("https://example.com/a.jpg").unwrap().is_none());
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache").join("images.sqlite3");

        {
            let mut store = SqliteImageStore::open(&path).expect("Store should open");
            store.insert(image("https://example.com/a.jpg", &[9, 9])).unwrap();
        }

        let store = SqliteImageStore::open(&path).expect("Store should reopen");
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(
            store.fetch("https://example.com/a.jpg").unwrap().unwrap().data,
            vec![9, 9]
        );
    }
}
