#![forbid(unsafe_code)]

//! Reactive atomic state for Lumo.
//!
//! This crate provides the single-value reactive primitive the rest of
//! Lumo is built on:
//!
//! - [`AtomicState`]: a shared value wrapper with change notification via
//!   subscriber callbacks and an optional canonicalizing transform.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Persistence`]: per-atom mirroring into a durable store (caller-keyed
//!   JSON, validated on restore) or a session store (auto-keyed,
//!   checksum-guarded JSON).
//! - [`KeyValueStore`]: the injected storage seam, with [`MemoryStore`]
//!   and a JSON-file [`FileStore`] backend.
//!
//! # Architecture
//!
//! `AtomicState<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership; the whole crate assumes the UI event loop and does no
//! locking. Subscribers are stored as `Weak` function pointers and
//! cleaned up lazily during notification. Every failure on the
//! persistence path degrades to a safe in-memory value and a `tracing`
//! report; nothing on that path panics or propagates.

pub mod atomic;
pub mod hash_guard;
pub mod persist;
pub mod storage;

pub use atomic::{AtomicState, StateOptions, Subscription, Transform};
pub use hash_guard::{CHECKSUM_WIDTH, CorruptPayload};
pub use persist::{DurableConfig, Persistence, SessionConfig, Validator};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StoreError, StoreHandle};
