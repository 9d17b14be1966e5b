#![forbid(unsafe_code)]

//! Persistence bindings for [`AtomicState`](crate::AtomicState).
//!
//! An atom mirrors its value into exactly one of two store variants:
//!
//! - **Durable**: keyed by a caller-chosen identifier, value stored as
//!   plain JSON. Restoration re-validates the decoded value before
//!   trusting it.
//! - **Session**: keyed by a per-process generated identifier, value
//!   stored as `checksum ++ JSON` (see [`crate::hash_guard`]).
//!   Restoration recomputes the checksum and treats a mismatch as
//!   corruption.
//!
//! Hydration failure is never fatal: a missing, malformed, rejected, or
//! corrupt entry is logged and the atom keeps its constructor-supplied
//! initial value. Write failures are logged and never roll back the
//! in-memory value.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use crate::hash_guard;
use crate::storage::{KeyValueStore, StoreHandle, durable_key, next_session_key};

/// Refines a deserialized value before it is accepted during hydration.
///
/// Deserialization already enforces the value's shape; a validator adds
/// domain checks on top (ranges, non-emptiness, known variants). The
/// returned string is the rejection reason, used only for logging.
pub type Validator<T> = Box<dyn Fn(&T) -> Result<(), String>>;

/// Durable persistence configuration.
pub struct DurableConfig<T> {
    /// Store the value is mirrored into.
    pub store: StoreHandle,
    /// Stable identifier; becomes part of the storage key.
    pub id: String,
    /// Optional refinement applied to hydrated values.
    pub validate: Option<Validator<T>>,
}

impl<T> DurableConfig<T> {
    /// Durable binding with no extra validation.
    pub fn new(store: StoreHandle, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
            validate: None,
        }
    }

    /// Attach a hydration validator.
    #[must_use]
    pub fn with_validator(mut self, validate: impl Fn(&T) -> Result<(), String> + 'static) -> Self {
        self.validate = Some(Box::new(validate));
        self
    }
}

/// Session persistence configuration.
pub struct SessionConfig {
    /// Store the value is mirrored into. Cleared by the platform at
    /// session end.
    pub store: StoreHandle,
    /// Explicit storage key. `None` allocates the next per-process key.
    ///
    /// Auto-allocated keys line up across reloads only when atoms are
    /// constructed in a deterministic order; callers with a less
    /// predictable construction order pin the key instead.
    pub key: Option<String>,
}

impl SessionConfig {
    /// Session binding over `store` with an auto-allocated key.
    pub fn new(store: StoreHandle) -> Self {
        Self { store, key: None }
    }

    /// Pin the storage key instead of allocating one.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// The persistence variant an atom is constructed with.
pub enum Persistence<T> {
    /// Survives restarts; caller-keyed, validated on restore.
    Durable(DurableConfig<T>),
    /// Survives reloads within one session; auto-keyed, checksummed.
    Session(SessionConfig),
}

/// How a binding restored its stored value, if it did.
///
/// The two variants re-enter the atom differently: a durable value is
/// assigned directly, a session value runs through the public setter so
/// it notifies and re-persists.
pub(crate) enum Hydrated<T> {
    None,
    Direct(T),
    ViaSetter(T),
}

// ---------------------------------------------------------------------------
// Write sink
// ---------------------------------------------------------------------------

/// Object-safe write seam between the atom and its binding.
///
/// Serialization bounds live on the concrete sinks, so the atom's setter
/// needs no serde bounds of its own.
pub(crate) trait PersistSink<T> {
    fn write(&self, value: &T);
}

pub(crate) struct DurableSink<T> {
    store: StoreHandle,
    key: String,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T: Serialize> PersistSink<T> for DurableSink<T> {
    fn write(&self, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                error!(target: "lumo.state", key = %self.key, error = %err, "unable to encode value for durable store");
                return;
            }
        };
        if let Err(err) = self.store.set(&self.key, &json) {
            error!(target: "lumo.state", key = %self.key, error = %err, "durable store write failed");
        }
    }
}

pub(crate) struct SessionSink<T> {
    store: StoreHandle,
    key: String,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T: Serialize> PersistSink<T> for SessionSink<T> {
    fn write(&self, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                warn!(target: "lumo.state", key = %self.key, error = %err, "unable to encode value for session store");
                return;
            }
        };
        if let Err(err) = self.store.set(&self.key, &hash_guard::seal(&json)) {
            warn!(target: "lumo.state", key = %self.key, error = %err, "session store write failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Binding resolution and hydration
// ---------------------------------------------------------------------------

/// Resolve a [`Persistence`] into its sink, hydrating the stored value.
pub(crate) fn bind<T: Serialize + DeserializeOwned + 'static>(
    persistence: Persistence<T>,
) -> (Box<dyn PersistSink<T>>, Hydrated<T>) {
    match persistence {
        Persistence::Durable(config) => {
            let key = durable_key(&config.id);
            let hydrated = match hydrate_durable(&config, &key) {
                Some(value) => Hydrated::Direct(value),
                None => Hydrated::None,
            };
            let sink = DurableSink {
                store: config.store,
                key,
                _marker: std::marker::PhantomData,
            };
            (Box::new(sink), hydrated)
        }
        Persistence::Session(config) => {
            let key = config.key.unwrap_or_else(next_session_key);
            let hydrated = match hydrate_session::<T>(&config.store, &key) {
                Some(value) => Hydrated::ViaSetter(value),
                None => Hydrated::None,
            };
            let sink = SessionSink {
                store: config.store,
                key,
                _marker: std::marker::PhantomData,
            };
            (Box::new(sink), hydrated)
        }
    }
}

fn hydrate_durable<T: DeserializeOwned>(config: &DurableConfig<T>, key: &str) -> Option<T> {
    let text = config.store.get(key)?;
    let value: T = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            error!(target: "lumo.state", id = %config.id, error = %err, "unable to restore durable value");
            return None;
        }
    };
    if let Some(validate) = &config.validate {
        if let Err(reason) = validate(&value) {
            error!(target: "lumo.state", id = %config.id, %reason, "restored durable value rejected");
            return None;
        }
    }
    Some(value)
}

fn hydrate_session<T: DeserializeOwned>(store: &StoreHandle, key: &str) -> Option<T> {
    let text = store.get(key)?;
    let payload = match hash_guard::open(&text) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(target: "lumo.state", %key, error = %err, "session value corrupt, discarding");
            return None;
        }
    };
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(err) => {
            error!(target: "lumo.state", %key, error = %err, "unable to restore session value");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::rc::Rc;

    fn store() -> StoreHandle {
        Rc::new(MemoryStore::new())
    }

    #[test]
    fn durable_sink_writes_plain_json() {
        let store = store();
        let (sink, _) = bind::<u32>(Persistence::Durable(DurableConfig::new(
            Rc::clone(&store),
            "counter",
        )));
        sink.write(&7);
        assert_eq!(store.get("AtomicState\ncounter").as_deref(), Some("7"));
    }

    #[test]
    fn durable_hydration_restores() {
        let store = store();
        store.set(&durable_key("counter"), "41").unwrap();
        let (_, hydrated) = bind::<u32>(Persistence::Durable(DurableConfig::new(
            Rc::clone(&store),
            "counter",
        )));
        assert!(matches!(hydrated, Hydrated::Direct(41)));
    }

    #[test]
    fn durable_hydration_rejects_wrong_shape() {
        // "42" decodes as a number, not a string; hydration must discard.
        let store = store();
        store.set(&durable_key("name"), "42").unwrap();
        let (_, hydrated) = bind::<String>(Persistence::Durable(DurableConfig::new(
            Rc::clone(&store),
            "name",
        )));
        assert!(matches!(hydrated, Hydrated::None));
    }

    #[test]
    fn durable_hydration_applies_validator() {
        let store = store();
        store.set(&durable_key("percent"), "250").unwrap();
        let config = DurableConfig::new(Rc::clone(&store), "percent").with_validator(|v: &u32| {
            if *v <= 100 {
                Ok(())
            } else {
                Err(format!("{v} out of range"))
            }
        });
        let (_, hydrated) = bind::<u32>(Persistence::Durable(config));
        assert!(matches!(hydrated, Hydrated::None));
    }

    #[test]
    fn session_sink_seals_payload() {
        let store = Rc::new(MemoryStore::new());
        let handle: StoreHandle = store.clone();
        let (sink, _) = bind::<String>(Persistence::Session(SessionConfig::new(handle)));
        sink.write(&"hi".to_owned());
        // One auto-keyed entry, stored as checksum ++ JSON.
        let keys = store.keys();
        assert_eq!(keys.len(), 1);
        let stored = store.get(&keys[0]).unwrap();
        assert_eq!(hash_guard::open(&stored).unwrap(), "\"hi\"");
    }

    #[test]
    fn session_round_trip_through_fresh_binding() {
        // Session keys are per-instance, so exercise restore by writing
        // a sealed value under a known key directly.
        let store = store();
        let sealed = hash_guard::seal("\"bonjour\"");
        store.set("manual", &sealed).unwrap();
        assert_eq!(
            hydrate_session::<String>(&store, "manual").as_deref(),
            Some("bonjour")
        );
    }

    #[test]
    fn session_corruption_is_discarded() {
        let store = store();
        let mut sealed = hash_guard::seal("\"bonjour\"");
        // Flip a payload character; the stored checksum no longer matches.
        sealed.pop();
        sealed.push('X');
        store.set("manual", &sealed).unwrap();
        assert!(hydrate_session::<String>(&store, "manual").is_none());
    }

    #[test]
    fn session_bad_json_is_discarded() {
        let store = store();
        store.set("manual", &hash_guard::seal("not json")).unwrap();
        assert!(hydrate_session::<String>(&store, "manual").is_none());
    }
}
