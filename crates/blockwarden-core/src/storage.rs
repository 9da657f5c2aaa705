//! Key-value persistence substrate.
//!
//! Two partitions with different replication scope: `Synced` holds the
//! singleton settings record, `Local` holds the unblock ledger and the
//! reroll state. Writers notify in-process subscribers after every change
//! that actually altered a value, mirroring the host storage contract the
//! controller reacts to.
//!
//! `MemoryStore` backs tests and ephemeral embedders; `SqliteStore` persists
//! to a `kv` table at `~/.config/blockwarden/blockwarden.db`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StorageError};

/// Singleton settings record (synced partition).
pub const SETTINGS_KEY: &str = "settings";
/// Temporary-unblock ledger (local partition).
pub const UNBLOCKS_KEY: &str = "temporaryUnblocks";
/// Reroll/gamble state (local partition).
pub const REROLL_STATE_KEY: &str = "rerollState";

/// Replication scope of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Synced,
    Local,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Synced => "synced",
            Partition::Local => "local",
        }
    }
}

/// A change notification: which partition+key was written or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub partition: Partition,
    pub key: String,
}

pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Abstract key-value persistence with change subscription.
///
/// Implementations must only notify subscribers for writes that changed the
/// stored value, so a reactor that writes back from inside a change handler
/// converges instead of looping.
pub trait StorageArea: Send + Sync {
    fn get(&self, partition: Partition, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&self, partition: Partition, key: &str, value: Value) -> Result<(), StorageError>;
    fn remove(&self, partition: Partition, key: &str) -> Result<(), StorageError>;
    fn subscribe(&self, listener: ChangeListener);
}

/// Read a typed record; storage failures and malformed payloads degrade to
/// `None` so read paths never crash the reactor.
pub fn read_opt<T: DeserializeOwned>(
    store: &dyn StorageArea,
    partition: Partition,
    key: &str,
) -> Option<T> {
    match store.get(partition, key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "malformed persisted record, using defaults");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, error = %e, "storage read failed, using defaults");
            None
        }
    }
}

/// Read a typed record, substituting `T::default()` when absent or unreadable.
pub fn read_or_default<T: DeserializeOwned + Default>(
    store: &dyn StorageArea,
    partition: Partition,
    key: &str,
) -> T {
    read_opt(store, partition, key).unwrap_or_default()
}

/// Serialize and persist a typed record.
pub fn write_json<T: Serialize>(
    store: &dyn StorageArea,
    partition: Partition,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value)?;
    store.set(partition, key, value)?;
    Ok(())
}

/// Returns `~/.config/blockwarden[-dev]/` based on BLOCKWARDEN_ENV.
///
/// BLOCKWARDEN_DATA_DIR overrides the location entirely.
pub fn data_dir() -> std::io::Result<PathBuf> {
    if let Ok(dir) = std::env::var("BLOCKWARDEN_DATA_DIR") {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir)?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("BLOCKWARDEN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("blockwarden-dev")
    } else {
        base_dir.join("blockwarden")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

// ── In-memory store ──────────────────────────────────────────────────

/// In-memory store for tests and ephemeral embedders.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<(Partition, String), Value>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, partition: Partition, key: &str) {
        let event = ChangeEvent {
            partition,
            key: key.to_string(),
        };
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener(&event);
            }
        }
    }
}

impl StorageArea for MemoryStore {
    fn get(&self, partition: Partition, key: &str) -> Result<Option<Value>, StorageError> {
        let data = self.data.lock().map_err(|_| StorageError::Locked)?;
        Ok(data.get(&(partition, key.to_string())).cloned())
    }

    fn set(&self, partition: Partition, key: &str, value: Value) -> Result<(), StorageError> {
        {
            let mut data = self.data.lock().map_err(|_| StorageError::Locked)?;
            let slot = (partition, key.to_string());
            if data.get(&slot) == Some(&value) {
                return Ok(());
            }
            data.insert(slot, value);
        }
        self.notify(partition, key);
        Ok(())
    }

    fn remove(&self, partition: Partition, key: &str) -> Result<(), StorageError> {
        let removed = {
            let mut data = self.data.lock().map_err(|_| StorageError::Locked)?;
            data.remove(&(partition, key.to_string())).is_some()
        };
        if removed {
            self.notify(partition, key);
        }
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }
}

// ── SQLite store ─────────────────────────────────────────────────────

/// SQLite-backed store: one `kv` table keyed by (partition, key).
pub struct SqliteStore {
    conn: Mutex<Connection>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl SqliteStore {
    /// Open the store at `~/.config/blockwarden/blockwarden.db`, creating
    /// the file and schema if they don't exist.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("blockwarden.db");
        Self::open_at(&path)
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_conn(conn)
    }

    /// Open an in-memory store (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_conn(conn)
    }

    fn from_conn(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                partition TEXT NOT NULL,
                key       TEXT NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY (partition, key)
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            listeners: Mutex::new(Vec::new()),
        })
    }

    fn notify(&self, partition: Partition, key: &str) {
        let event = ChangeEvent {
            partition,
            key: key.to_string(),
        };
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener(&event);
            }
        }
    }
}

impl StorageArea for SqliteStore {
    fn get(&self, partition: Partition, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Locked)?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE partition = ?1 AND key = ?2")?;
        let mut rows = stmt.query(params![partition.as_str(), key])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let raw: String = row.get(0)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "unparseable stored value treated as absent");
                Ok(None)
            }
        }
    }

    fn set(&self, partition: Partition, key: &str, value: Value) -> Result<(), StorageError> {
        let raw = value.to_string();
        let changed = {
            let conn = self.conn.lock().map_err(|_| StorageError::Locked)?;
            let existing: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv WHERE partition = ?1 AND key = ?2",
                    params![partition.as_str(), key],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            if existing.as_deref() == Some(raw.as_str()) {
                false
            } else {
                conn.execute(
                    "INSERT OR REPLACE INTO kv (partition, key, value) VALUES (?1, ?2, ?3)",
                    params![partition.as_str(), key, raw],
                )?;
                true
            }
        };
        if changed {
            self.notify(partition, key);
        }
        Ok(())
    }

    fn remove(&self, partition: Partition, key: &str) -> Result<(), StorageError> {
        let removed = {
            let conn = self.conn.lock().map_err(|_| StorageError::Locked)?;
            conn.execute(
                "DELETE FROM kv WHERE partition = ?1 AND key = ?2",
                params![partition.as_str(), key],
            )? > 0
        };
        if removed {
            self.notify(partition, key);
        }
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }
}
