//! # Stage: Persistence Adapter
//!
//! ## Responsibility
//! Durable string-keyed storage for the three pieces of user state
//! (`settings`, `liked`, `seen`), and a fire-and-forget writer that applies
//! writes off the caller's path.
//!
//! ## Guarantees
//! - Per-key fallback: an absent or malformed value yields the default for
//!   that key only; loading never fails startup
//! - Ordered: writes are applied in the order they were enqueued, so the
//!   last mutation wins
//! - Non-blocking: [`Persister::persist`] only enqueues
//!
//! ## NOT Responsible For
//! - Durability of the most recent write across a crash (call
//!   [`Persister::flush`] before a normal exit)

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MatchError, Result};

/// Key holding the serialized preference config.
pub const KEY_SETTINGS: &str = "settings";
/// Key holding the ordered list of kept names.
pub const KEY_LIKED: &str = "liked";
/// Key holding the set of decided names.
pub const KEY_SEEN: &str = "seen";

// ---------------------------------------------------------------------------
// KeyValueStore trait
// ---------------------------------------------------------------------------

/// Durable string storage.  Implemented by [`MemoryStore`] and [`SqliteStore`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local store; contents vanish on exit.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key, mainly for tests and imports.
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        if let Ok(mut guard) = self.entries.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.lock().map_err(|_| MatchError::Poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.entries.lock().map_err(|_| MatchError::Poisoned)?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Single-table SQLite key-value store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| MatchError::Poisoned)?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| MatchError::Poisoned)?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading with per-key fallback
// ---------------------------------------------------------------------------

/// Parse the value stored under `key`.
///
/// Returns `Ok(None)` when the key is absent and
/// [`MatchError::MalformedState`] when it does not parse.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| MatchError::MalformedState { key: key.to_string(), detail: e.to_string() }),
    }
}

/// Like [`load`] but never fails: absent, unreadable, or malformed values all
/// fall back to `T::default()` for this key alone.
pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    match load(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!(key, "no persisted value, using default");
            T::default()
        }
        Err(e) => {
            warn!(key, error = %e, "persisted value unusable, using default");
            T::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Persister: fire-and-forget writer
// ---------------------------------------------------------------------------

enum PersistOp {
    Write { key: String, value: String },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
enum Sink {
    /// Writes applied on the caller's thread.
    Inline(Arc<dyn KeyValueStore>),
    /// Writes drained by a dedicated blocking task.
    Background(mpsc::UnboundedSender<PersistOp>),
}

/// Handle used by the decision store and settings to schedule writes.
#[derive(Clone)]
pub struct Persister {
    sink: Sink,
}

impl Persister {
    /// Apply every write synchronously.  Useful without a tokio runtime.
    pub fn inline(store: Arc<dyn KeyValueStore>) -> Self {
        Self { sink: Sink::Inline(store) }
    }

    /// Start a background writer on the blocking pool.
    ///
    /// The returned handle completes once every `Persister` clone has been
    /// dropped and the queue is drained.  Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PersistOp>();
        let handle = tokio::task::spawn_blocking(move || {
            while let Some(op) = rx.blocking_recv() {
                match op {
                    PersistOp::Write { key, value } => write_logged(store.as_ref(), &key, &value),
                    PersistOp::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("persistence writer drained");
        });
        (Self { sink: Sink::Background(tx) }, handle)
    }

    /// Schedule `value` to be written under `key`.  Never blocks on storage
    /// when running in background mode; failures are logged.
    pub fn persist(&self, key: &str, value: String) {
        match &self.sink {
            Sink::Inline(store) => write_logged(store.as_ref(), key, &value),
            Sink::Background(tx) => {
                let op = PersistOp::Write { key: key.to_string(), value };
                if tx.send(op).is_err() {
                    warn!(key, "persistence writer has stopped; write dropped");
                }
            }
        }
    }

    /// Wait until every write enqueued before this call has been applied.
    pub async fn flush(&self) {
        if let Sink::Background(tx) = &self.sink {
            let (ack, done) = oneshot::channel();
            if tx.send(PersistOp::Flush(ack)).is_ok() {
                let _ = done.await;
            }
        }
    }
}

fn write_logged(store: &dyn KeyValueStore, key: &str, value: &str) {
    match store.set(key, value) {
        Ok(()) => debug!(key, bytes = value.len(), "persisted"),
        Err(e) => warn!(key, error = %e, "persist failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("liked").unwrap().is_none());
        store.set("liked", "[\"Eva\"]").unwrap();
        assert_eq!(store.get("liked").unwrap().as_deref(), Some("[\"Eva\"]"));
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new().with_entry("seen", "[]");
        store.set("seen", "[\"Sam\"]").unwrap();
        assert_eq!(store.get("seen").unwrap().as_deref(), Some("[\"Sam\"]"));
    }

    #[test]
    fn test_sqlite_store_in_memory_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get(KEY_SETTINGS).unwrap().is_none());
        store.set(KEY_SETTINGS, "{}").unwrap();
        store.set(KEY_SETTINGS, "{\"surname\":\"Novák\"}").unwrap();
        assert_eq!(
            store.get(KEY_SETTINGS).unwrap().as_deref(),
            Some("{\"surname\":\"Novák\"}")
        );
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set(KEY_LIKED, "[\"Eva\",\"Sam\"]").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(KEY_LIKED).unwrap().as_deref(), Some("[\"Eva\",\"Sam\"]"));
    }

    #[test]
    fn test_load_absent_is_none() {
        let store = MemoryStore::new();
        let v: Option<Vec<String>> = load(&store, KEY_LIKED).unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_load_malformed_is_error() {
        let store = MemoryStore::new().with_entry(KEY_LIKED, "{oops");
        let err = load::<Vec<String>>(&store, KEY_LIKED).unwrap_err();
        assert!(matches!(err, MatchError::MalformedState { ref key, .. } if key == "liked"));
    }

    #[test]
    fn test_load_or_default_falls_back_on_wrong_shape() {
        let store = MemoryStore::new().with_entry(KEY_SEEN, "{\"not\":\"a list\"}");
        let v: Vec<String> = load_or_default(&store, KEY_SEEN);
        assert!(v.is_empty());
    }

    #[test]
    fn test_inline_persister_writes_immediately() {
        let store = Arc::new(MemoryStore::new());
        let p = Persister::inline(store.clone());
        p.persist(KEY_LIKED, "[]".to_string());
        assert_eq!(store.get(KEY_LIKED).unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_background_persister_flush_applies_writes_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (p, handle) = Persister::spawn(store.clone());
        for i in 0..50 {
            p.persist(KEY_SEEN, format!("[{i}]"));
        }
        p.flush().await;
        assert_eq!(store.get(KEY_SEEN).unwrap().as_deref(), Some("[49]"));
        drop(p);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_background_persister_drains_on_drop() {
        let store = Arc::new(MemoryStore::new());
        let (p, handle) = Persister::spawn(store.clone());
        p.persist(KEY_LIKED, "[\"Eva\"]".to_string());
        drop(p);
        handle.await.unwrap();
        assert_eq!(store.get(KEY_LIKED).unwrap().as_deref(), Some("[\"Eva\"]"));
    }
}
