//! Durable key-value storage backing the credential vault.
//!
//! Values are plain strings; callers own the encoding (JSON, ciphertext).

#[cfg(test)]
mod memory;

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::platform::{NativePlatform, Platform};

#[cfg(test)]
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// String-keyed durable store. Implementations must be safe to share across panels.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let db = Connection::open(path)?;
        NativePlatform::restrict_file_permissions(path);
        debug!("Opened key-value store at {}", path.display());
        Self::with_connection(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> Result<Self, StorageError> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self { db: Mutex::new(db) })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let db = self.db.lock().map_err(|_| StorageError::Poisoned)?;
        let value = db
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let db = self.db.lock().map_err(|_| StorageError::Poisoned)?;
        db.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let db = self.db.lock().map_err(|_| StorageError::Poisoned)?;
        db.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("alpha", "1").unwrap();
        assert_eq!(store.get("alpha").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn get_missing_key_returns_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("ghost").unwrap(), None);
    }

    #[test]
    fn set_overwrites_existing_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("key", "old").unwrap();
        store.set("key", "new").unwrap();
        assert_eq!(store.get("key").unwrap(), Some("new".to_string()));
    }

    #[test]
    fn remove_deletes_key_and_tolerates_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("ephemeral", "val").unwrap();
        store.remove("ephemeral").unwrap();
        assert_eq!(store.get("ephemeral").unwrap(), None);
        store.remove("nope").unwrap();
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("persisted", "yes").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("persisted").unwrap(), Some("yes".to_string()));
    }
}
