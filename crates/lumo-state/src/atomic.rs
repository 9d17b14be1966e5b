#![forbid(unsafe_code)]

//! Atomic value container with change notification and persistence.
//!
//! # Design
//!
//! [`AtomicState<T>`] wraps a single value in shared, reference-counted
//! storage (`Rc<RefCell<..>>`). When the value changes (determined by
//! `PartialEq`), the configured persistence binding writes the new value,
//! then all live subscribers are notified in registration order — before
//! the setter returns.
//!
//! # Invariants
//!
//! 1. With a transform configured, the held value always equals
//!    `transform(last assigned value)`; hydrated values included.
//! 2. Assigning a value equal to the current one is a complete no-op:
//!    no persistence write, no version bump, no notification.
//! 3. `version` increments by exactly 1 per value-changing mutation.
//! 4. Subscribers are notified in registration order; dead subscribers
//!    (dropped [`Subscription`] guards) are pruned lazily during notify.
//!
//! # Failure modes
//!
//! - **Re-entrant set**: calling `set()` from within a subscriber callback
//!   recurses without protection; a transform or store callback that
//!   touches the same atom panics on the `RefCell` borrow. Both indicate
//!   a design bug in the caller's subscriber graph.
//! - **Panicking subscriber**: propagates to the `set()` caller.
//!   Notification is not isolated per subscriber.
//! - **Persistence failure**: logged and swallowed; the in-memory update
//!   and the notification round always complete.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::persist::{Hydrated, Persistence, PersistSink, bind};

/// A subscriber callback stored as a strong `Rc` by its [`Subscription`]
/// guard, handed to the atom as `Weak`.
type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

/// Canonicalizes every value assigned to an atom.
pub type Transform<T> = Box<dyn Fn(T) -> T>;

/// Construction options for [`AtomicState::with_options`].
pub struct StateOptions<T> {
    /// Persistence binding, if the value should be mirrored into a store.
    pub persistence: Option<Persistence<T>>,
    /// Canonicalization applied to the initial value and every assignment.
    pub transform: Option<Transform<T>>,
}

impl<T> Default for StateOptions<T> {
    fn default() -> Self {
        Self {
            persistence: None,
            transform: None,
        }
    }
}

impl<T> StateOptions<T> {
    /// Empty options: ephemeral, untransformed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror the value through the given persistence binding.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Persistence<T>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Canonicalize assigned values through `transform`.
    #[must_use]
    pub fn with_transform(mut self, transform: impl Fn(T) -> T + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }
}

/// Shared interior for [`AtomicState<T>`].
struct Inner<T> {
    value: T,
    version: u64,
    /// Subscribers stored as weak references; dead entries pruned on notify.
    subscribers: Vec<CallbackWeak<T>>,
    transform: Option<Transform<T>>,
    persist: Option<Box<dyn PersistSink<T>>>,
}

/// A shared, persistable value with change notification.
///
/// Cloning an `AtomicState` creates a new handle to the **same** inner
/// state — both handles see the same value and share subscribers and the
/// persistence binding.
pub struct AtomicState<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

// Manual Clone: shares the same Rc.
impl<T> Clone for AtomicState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for AtomicState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("AtomicState")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> AtomicState<T> {
    /// Create an ephemeral atom: no persistence, no transform.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                version: 0,
                subscribers: Vec::new(),
                transform: None,
                persist: None,
            })),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Assign a new value.
    ///
    /// The transform (if any) is applied first. If the result equals the
    /// current value, nothing happens. Otherwise the value is stored,
    /// persisted, and all live subscribers are notified before this
    /// method returns.
    pub fn set(&self, value: T) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let value = match &inner.transform {
                Some(transform) => transform(value),
                None => value,
            };
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
            if let Some(sink) = &inner.persist {
                sink.write(&inner.value);
            }
            true
        };
        if changed {
            self.notify();
        }
    }

    /// Modify the value in place via a closure.
    ///
    /// The mutated value counts as an assignment: the transform is
    /// applied to it, and persistence and notification follow the same
    /// rules as [`set`](Self::set).
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let mut candidate = inner.value.clone();
            f(&mut candidate);
            if let Some(transform) = &inner.transform {
                candidate = transform(candidate);
            }
            if inner.value == candidate {
                false
            } else {
                inner.value = candidate;
                inner.version += 1;
                if let Some(sink) = &inner.persist {
                    sink.write(&inner.value);
                }
                true
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Subscribe to value changes. The callback is invoked with a
    /// reference to the new value each time it changes.
    ///
    /// Returns a [`Subscription`] guard. Dropping the guard unsubscribes
    /// the callback; it will not be called after drop, though its slot
    /// may linger in the subscriber list until the next notify prunes it.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        self.inner.borrow_mut().subscribers.push(weak);
        // `Rc<dyn Fn(&T)>` cannot coerce to `Rc<dyn Any>` directly, so the
        // guard boxes the strong handle behind `dyn Any` instead.
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Current version number. Increments by 1 on each value-changing
    /// mutation. Useful for dirty-checking.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of currently registered subscribers, including dead ones
    /// not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Notify live subscribers and prune dead ones.
    fn notify(&self) {
        // Collect live callbacks first, to avoid holding the borrow
        // while subscriber code runs.
        let callbacks: Vec<CallbackRc<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|weak| weak.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(|weak| weak.upgrade())
                .collect()
        };
        if callbacks.is_empty() {
            return;
        }

        trace!(
            target: "lumo.state",
            subscribers = callbacks.len(),
            "value changed, notifying"
        );

        // Clone the value once for all callbacks.
        let value = self.inner.borrow().value.clone();
        for callback in &callbacks {
            callback(&value);
        }
    }
}

impl<T> AtomicState<T>
where
    T: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
{
    /// Create an atom with persistence and/or a transform.
    ///
    /// The transform is applied to `initial` first. If a persistence
    /// binding is configured, hydration runs before the constructor
    /// returns: a durable value is validated and assigned directly,
    /// a session value is routed through [`set`](Self::set) (so it is
    /// re-persisted). Hydration failure keeps the transformed initial
    /// value; it is never fatal.
    #[must_use]
    pub fn with_options(initial: T, options: StateOptions<T>) -> Self {
        let StateOptions {
            persistence,
            transform,
        } = options;

        let initial = match &transform {
            Some(transform) => transform(initial),
            None => initial,
        };

        let (persist, hydrated) = match persistence {
            Some(persistence) => {
                let (sink, hydrated) = bind(persistence);
                (Some(sink), hydrated)
            }
            None => (None, Hydrated::None),
        };

        let state = Self {
            inner: Rc::new(RefCell::new(Inner {
                value: initial,
                version: 0,
                subscribers: Vec::new(),
                transform,
                persist,
            })),
        };

        match hydrated {
            Hydrated::None => {}
            Hydrated::Direct(value) => {
                // Restored durable value: assigned in place, no write-back.
                let mut inner = state.inner.borrow_mut();
                let value = match &inner.transform {
                    Some(transform) => transform(value),
                    None => value,
                };
                if inner.value != value {
                    inner.value = value;
                    inner.version += 1;
                }
            }
            Hydrated::ViaSetter(value) => {
                // Restored session value: runs through the public setter,
                // which re-persists it under this instance's key.
                state.set(value);
            }
        }

        state
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the `Subscription` drops the only strong reference to the
/// callback, so the `Weak` held by the atom fails to upgrade on the next
/// notification cycle.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
