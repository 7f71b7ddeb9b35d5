//! SQLite-backed key/value persistence for all state slots.
//!
//! Every piece of persisted state lives in its own slot and is read and
//! written independently. Reads never fail: a missing or unparsable slot
//! yields the caller's default. Writes are synchronous and best-effort;
//! the in-memory value stays authoritative when a write is dropped.

use directories::ProjectDirs;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Slot keys. One slot per persisted value, no multi-slot transactions.
pub mod slot {
    pub const FOCUS_MINUTES: &str = "focus_minutes";
    pub const BREAK_MINUTES: &str = "break_minutes";
    pub const VOLUME: &str = "volume";
    pub const SOUND_KIND: &str = "sound_kind";
    pub const CURRENT_TASK: &str = "current_task";
    pub const TODOS: &str = "todos";
    pub const PHASE: &str = "phase";
    pub const REMAINING_SECS: &str = "remaining_secs";
    pub const SESSION_LOG: &str = "session_log";
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory")]
    DirectoryCreation,
}

/// Minimal storage surface the state store runs on. Implementations may
/// fail to read; the typed layer above turns that into defaults.
pub trait StorageBackend: Send {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

/// On-disk backend: a single key/value table in the platform data dir.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Opens the database at the platform data path, creating it if needed.
    pub fn open_default() -> Result<Self, StorageError> {
        let db_path = Self::db_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|_| StorageError::DirectoryCreation)?;
        }
        Self::open(&db_path)
    }

    pub fn open(path: &std::path::Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::initialize(&conn)?;
        Ok(Self { conn })
    }

    fn initialize(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    fn db_path() -> PathBuf {
        ProjectDirs::from("com", "tomatick", "Tomatick")
            .map(|dirs| dirs.data_dir().join("tomatick.db"))
            .unwrap_or_else(|| PathBuf::from("tomatick.db"))
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.conn
            .query_row("SELECT value FROM state WHERE key = ?", [key], |row| {
                row.get::<_, String>(0)
            })
            .ok()
            .map(String::into_bytes)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        // Slot values are serde_json documents, so lossy is a no-op here.
        let text = String::from_utf8_lossy(value);
        self.conn.execute(
            "INSERT OR REPLACE INTO state (key, value) VALUES (?, ?)",
            rusqlite::params![key, text.as_ref()],
        )?;
        Ok(())
    }
}

/// In-memory backend. Used in tests and as a fallback when the on-disk
/// database cannot be opened. Cloning shares the underlying map, which
/// lets a test reload state through the same backend.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    map: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if let Ok(mut map) = self.map.lock() {
            map.insert(key.to_string(), value.to_vec());
        }
        Ok(())
    }
}

/// Typed slot access on top of a storage backend. Values are serialized
/// with serde_json, one document per slot.
pub struct StateStore {
    backend: Box<dyn StorageBackend>,
}

impl StateStore {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Reads a slot, falling back to `default` on a missing or corrupt value.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.backend.get(key) {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or(default),
            None => default,
        }
    }

    /// Writes a slot. Failures are swallowed; in-memory state is authoritative.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            let _ = self.backend.set(key, &bytes);
        }
    }
}
