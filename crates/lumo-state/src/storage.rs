#![forbid(unsafe_code)]

//! Key-value storage backends for persisted atoms.
//!
//! Two process-wide stores back persistence: a durable store that survives
//! restarts and a session store the platform clears at session end. Both
//! are plain string-to-string maps behind [`KeyValueStore`], injected into
//! each atom rather than reached through a global, so tests can hand every
//! atom its own isolated store.
//!
//! Keys are namespaced to keep instances from colliding:
//!
//! - durable entries use a caller-chosen identifier: `AtomicState\n<id>`
//! - session entries use a per-process counter: `AtomicState:<hex>\r`
//!
//! The session layout is kept byte-for-byte so values written by earlier
//! builds of the same session remain readable.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// Namespace prefix shared by both key layouts.
const KEY_NAMESPACE: &str = "AtomicState";

/// A process-wide string key-value store.
///
/// Implementations take `&self`; single-threaded interior mutability is
/// expected (the whole subsystem runs on the UI event loop).
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Shared handle to a store.
pub type StoreHandle = Rc<dyn KeyValueStore>;

/// Build the durable-store key for a caller-supplied identifier.
#[must_use]
pub fn durable_key(id: &str) -> String {
    format!("{KEY_NAMESPACE}\n{id}")
}

/// Allocate a fresh session-store key, unique for the process lifetime.
#[must_use]
pub fn next_session_key() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{KEY_NAMESPACE}:{n:x}\r")
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// HashMap-backed store. Doubles as the session store (the map dies with
/// the process) and as the durable store in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Snapshot of the stored keys, in arbitrary order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Durable store persisting its entries as one JSON object on disk.
///
/// The whole map is read once at open and rewritten on every `set`. An
/// absent or unreadable file degrades to an empty store (logged) rather
/// than failing construction; write failures surface as [`StoreError`].
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RefCell<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store backed by `path`, loading any existing entries.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<HashMap<String, String>>(&text) {
                Ok(map) => map,
                Err(err) => {
                    warn!(
                        target: "lumo.state",
                        path = %path.display(),
                        error = %err,
                        "store file is not valid JSON, starting empty"
                    );
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                warn!(
                    target: "lumo.state",
                    path = %path.display(),
                    error = %err,
                    "store file unreadable, starting empty"
                );
                HashMap::new()
            }
        };
        Self {
            path,
            entries: RefCell::new(entries),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let text = serde_json::to_string(&*self.entries.borrow()).map_err(StoreError::Encode)?;
        std::fs::write(&self.path, text).map_err(StoreError::Io)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        self.flush()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur writing to a store.
#[derive(Debug)]
pub enum StoreError {
    /// I/O failure persisting the backing file.
    Io(std::io::Error),
    /// The entry map could not be encoded.
    Encode(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "store I/O error: {err}"),
            Self::Encode(err) => write!(f, "store encode error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("k").is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn durable_keys_are_namespaced() {
        assert_eq!(durable_key("Language"), "AtomicState\nLanguage");
        assert_ne!(durable_key("a"), durable_key("b"));
    }

    #[test]
    fn session_keys_are_unique_and_shaped() {
        let a = next_session_key();
        let b = next_session_key();
        assert_ne!(a, b);
        assert!(a.starts_with("AtomicState:"));
        assert!(a.ends_with('\r'));
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = FileStore::open(&path);
            store.set("alpha", "1").unwrap();
            store.set("beta", "2").unwrap();
        }
        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("alpha").as_deref(), Some("1"));
        assert_eq!(reopened.get("beta").as_deref(), Some("2"));
    }

    #[test]
    fn file_store_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("absent.json"));
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn file_store_garbage_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json at all").unwrap();
        let store = FileStore::open(&path);
        assert!(store.get("anything").is_none());
        // A write replaces the garbage with a valid map.
        store.set("k", "v").unwrap();
        assert_eq!(FileStore::open(&path).get("k").as_deref(), Some("v"));
    }

    #[test]
    fn file_store_write_to_bad_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        // Directory path as the backing file: writes must fail, not panic.
        let store = FileStore::open(dir.path());
        assert!(matches!(store.set("k", "v"), Err(StoreError::Io(_))));
    }
}
