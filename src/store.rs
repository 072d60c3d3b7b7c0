//! Local settings store
//!
//! A small SQLite key/value table under the data directory. It holds what a
//! browser client would keep in local storage: the backend override and the
//! signed-in staff member.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::config::BackendEndpoint;
use crate::model::StaffId;

const KEY_BACKEND: &str = "backend_endpoint";
const KEY_CURRENT_USER: &str = "current_user";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("creating data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value for {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
}

pub struct LocalStore {
    db: Mutex<Connection>,
}

impl LocalStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let db = Connection::open(path)?;

        // WAL so a running dashboard and a CLI invocation can share the file
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(db)?;

        info!(path = %path.display(), "Local store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );",
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-written in SQLite
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let db = self.conn();
        let mut stmt = db.prepare_cached("SELECT value FROM settings WHERE key = ?1")?;
        Ok(stmt.query_row([key], |row| row.get(0)).optional()?)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = strftime('%s', 'now')",
            rusqlite::params![key, value],
        )?;
        debug!(key, "Setting saved");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn()
            .execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Saved backend endpoint, if any
    pub fn backend_override(&self) -> Result<Option<BackendEndpoint>, StoreError> {
        self.get(KEY_BACKEND)?
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                    key: KEY_BACKEND.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Persist a validated endpoint; it takes effect on the next start
    pub fn set_backend_override(&self, endpoint: &BackendEndpoint) -> Result<(), StoreError> {
        let raw = serde_json::to_string(endpoint).map_err(|source| StoreError::Corrupt {
            key: KEY_BACKEND.to_string(),
            source,
        })?;
        self.set(KEY_BACKEND, &raw)
    }

    pub fn clear_backend_override(&self) -> Result<(), StoreError> {
        self.remove(KEY_BACKEND)
    }

    pub fn current_user(&self) -> Result<Option<StaffId>, StoreError> {
        self.get(KEY_CURRENT_USER)
    }

    pub fn set_current_user(&self, id: &str) -> Result<(), StoreError> {
        self.set(KEY_CURRENT_USER, id)
    }

    pub fn clear_current_user(&self) -> Result<(), StoreError> {
        self.remove(KEY_CURRENT_USER)
    }
}
