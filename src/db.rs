use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::models::{Event, EventId, UserIdentity};
use crate::utils;

pub const EVENTS_KEY: &str = "shoreSquadEvents";
pub const USER_NAME_KEY: &str = "userName";
pub const EVENTS_JOINED_KEY: &str = "eventsJoined";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Opaque key-value durability. `save_all` is all-or-nothing.
pub trait KvStore: Send {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn save_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError>;

    fn save(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.save_all(&[(key, value)])
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        utils::ensure_parent(path);
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at_utc TEXT NOT NULL
            );",
        )
    }
}

impl KvStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn save_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv (key, value, updated_at_utc)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at_utc = excluded.updated_at_utc",
                params![key, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    data: HashMap<String, String>,
}

impl KvStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn save_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.data.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }
}

/// Typed access to the board's three records.
///
/// Reads never fail: an unreadable or unparsable record is logged and
/// reported as absent, which callers treat as a fresh install. The first
/// failed write flips the session to in-memory-only and later writes are
/// skipped.
pub struct Persistence {
    store: Box<dyn KvStore>,
    degraded: bool,
}

impl Persistence {
    pub fn new(store: Box<dyn KvStore>) -> Self {
        Self {
            store,
            degraded: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::<MemoryStore>::default())
    }

    /// Opens the SQLite file, or falls back to a memory-only session.
    pub fn open_default(path: &Path) -> Self {
        match SqliteStore::open(path) {
            Ok(store) => Self::new(Box::new(store)),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "storage unavailable, running in memory");
                let mut persistence = Self::in_memory();
                persistence.degraded = true;
                persistence
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn load_events(&self) -> Option<Vec<Event>> {
        self.load_json(EVENTS_KEY)
    }

    /// Name and joined ids, each `None` when never stored.
    pub fn load_identity(&self) -> (Option<String>, Option<BTreeSet<EventId>>) {
        let name = self.load_raw(USER_NAME_KEY);
        let joined = self.load_json(EVENTS_JOINED_KEY);
        (name, joined)
    }

    pub fn save_identity(&mut self, identity: &UserIdentity) {
        if let Some(joined) = encode(EVENTS_JOINED_KEY, &identity.events_joined) {
            self.write(&[
                (USER_NAME_KEY, identity.name.clone()),
                (EVENTS_JOINED_KEY, joined),
            ]);
        }
    }

    /// Writes the collection and the identity as one batch.
    pub fn save_board(&mut self, events: &[Event], identity: &UserIdentity) {
        let (Some(events_value), Some(joined)) = (
            encode(EVENTS_KEY, events),
            encode(EVENTS_JOINED_KEY, &identity.events_joined),
        ) else {
            return;
        };
        self.write(&[
            (EVENTS_KEY, events_value),
            (USER_NAME_KEY, identity.name.clone()),
            (EVENTS_JOINED_KEY, joined),
        ]);
    }

    fn write(&mut self, entries: &[(&str, String)]) {
        if self.degraded {
            tracing::debug!(keys = entries.len(), "skipping write in degraded session");
            return;
        }
        if let Err(err) = self.store.save_all(entries) {
            tracing::warn!(%err, "storage write failed, continuing in memory");
            self.degraded = true;
        }
    }

    fn load_raw(&self, key: &str) -> Option<String> {
        match self.store.load(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, %err, "storage read failed, treating as absent");
                None
            }
        }
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.load_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, %err, "stored record is corrupt, treating as absent");
                None
            }
        }
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(encoded) => Some(encoded),
        Err(err) => {
            tracing::warn!(key, %err, "failed to encode record");
            None
        }
    }
}
