#![forbid(unsafe_code)]

//! String-keyed, dynamically typed state that outlives a single view.
//!
//! Values are stored type-erased and checked on read: [`SavedStateHandle::get`]
//! names the expected type and fails with
//! [`StoreError::TypeMismatch`](crate::StoreError::TypeMismatch) when the
//! stored value is something else.
//!
//! [`SavedStateHandle::live`] exposes a key as an [`Observable`]. The binding
//! is two-way: writes through the handle reach the observable, and values set
//! on the observable are written back under the key.
//!
//! # Invariants
//!
//! 1. At most one live observable exists per key; repeated `live` calls return
//!    the same one.
//! 2. A key's live observable always has the type the key was first bound with.
//! 3. No internal borrow is held while an observable is notified.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use ripple_core::logging::{trace, warn};
use ripple_core::{Observable, Subscription};

use crate::error::{Result, StoreError};

type Value = Rc<dyn Any>;

struct LiveBinding {
    observable: Rc<dyn Any>,
    type_name: &'static str,
    _write_back: Subscription,
}

#[derive(Default)]
struct State {
    values: BTreeMap<String, Value>,
    live: BTreeMap<String, LiveBinding>,
}

/// Shared handle to a saved-state map. Clones share the same map.
#[derive(Clone, Default)]
pub struct SavedStateHandle {
    state: Rc<RefCell<State>>,
}

impl SavedStateHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle pre-populated with restored values.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = (String, Rc<dyn Any>)>) -> Self {
        let handle = Self::new();
        handle.state.borrow_mut().values.extend(values);
        handle
    }

    /// Store `value` under `key` and push it to the key's live observable.
    ///
    /// If the key is already bound to a live observable of another type the
    /// value is still stored; the observable is left untouched.
    pub fn set<T: Clone + 'static>(&self, key: &str, value: T) {
        self.state
            .borrow_mut()
            .values
            .insert(key.to_owned(), Rc::new(value.clone()));

        let observable = self.live_observable::<T>(key);
        match observable {
            Some(Ok(observable)) => observable.set(value),
            Some(Err(_)) => {
                warn!(
                    key,
                    written = type_name::<T>(),
                    "live binding type differs from written value"
                );
            }
            None => {}
        }
    }

    /// The value under `key` as a `T`.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Result<T> {
        let value = self
            .state
            .borrow()
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::missing(key))?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| StoreError::mismatch::<T>(key))
    }

    /// [`get`](Self::get), with `default` for a missing key. A value of the
    /// wrong type is still an error.
    pub fn get_or<T: Clone + 'static>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Err(StoreError::NoSuchElement { .. }) => Ok(default),
            other => other,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.borrow().values.contains_key(key)
    }

    /// Remove the value and any live binding under `key`.
    ///
    /// A detached live observable keeps its last value but is no longer
    /// written back. Returns whether a value was present.
    pub fn remove(&self, key: &str) -> bool {
        let (value, binding) = {
            let mut state = self.state.borrow_mut();
            (state.values.remove(key), state.live.remove(key))
        };
        // The binding's subscription is dropped here, outside the borrow.
        drop(binding);
        value.is_some()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.borrow().values.keys().cloned().collect()
    }

    /// The observable bound to `key`, creating it on first use.
    ///
    /// A new observable starts with the stored value, or empty if the key
    /// has none. Fails with `TypeMismatch` if the stored value or an existing
    /// binding has another type.
    pub fn live<T: Clone + 'static>(&self, key: &str) -> Result<Observable<T>> {
        match self.live_observable::<T>(key) {
            Some(Ok(observable)) => return Ok(observable),
            Some(Err(_)) => return Err(StoreError::mismatch::<T>(key)),
            None => {}
        }

        let observable = match self.get::<T>(key) {
            Ok(value) => Observable::with_value(value),
            Err(StoreError::NoSuchElement { .. }) => Observable::new(),
            Err(err) => return Err(err),
        };

        let weak: Weak<RefCell<State>> = Rc::downgrade(&self.state);
        let owned_key = key.to_owned();
        let write_back = observable.observe_forever_changes(move |value: &T| {
            if let Some(state) = weak.upgrade() {
                state
                    .borrow_mut()
                    .values
                    .insert(owned_key.clone(), Rc::new(value.clone()));
            }
        });

        trace!(key, "saved state key bound to observable");
        self.state.borrow_mut().live.insert(
            key.to_owned(),
            LiveBinding {
                observable: Rc::new(observable.clone()),
                type_name: type_name::<T>(),
                _write_back: write_back,
            },
        );
        Ok(observable)
    }

    /// A typed accessor for `key`.
    #[must_use]
    pub fn property<T: Clone + 'static>(&self, key: impl Into<String>) -> SavedStateProperty<T> {
        SavedStateProperty {
            handle: self.clone(),
            key: key.into(),
            _marker: PhantomData,
        }
    }

    /// `None` if `key` is unbound, `Err(bound type)` if bound to another type.
    fn live_observable<T: Clone + 'static>(
        &self,
        key: &str,
    ) -> Option<std::result::Result<Observable<T>, &'static str>> {
        let state = self.state.borrow();
        let binding = state.live.get(key)?;
        Some(
            binding
                .observable
                .downcast_ref::<Observable<T>>()
                .cloned()
                .ok_or(binding.type_name),
        )
    }
}

impl fmt::Debug for SavedStateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SavedStateHandle")
            .field("keys", &state.values.keys().collect::<Vec<_>>())
            .field("live", &state.live.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Typed read/write access to one key of a [`SavedStateHandle`].
pub struct SavedStateProperty<T> {
    handle: SavedStateHandle,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + 'static> SavedStateProperty<T> {
    /// Fails with `NoSuchElement` if the key is unset.
    pub fn get(&self) -> Result<T> {
        self.handle.get(&self.key)
    }

    pub fn set(&self, value: T) {
        self.handle.set(&self.key, value);
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn live(&self) -> Result<Observable<T>> {
        self.handle.live(&self.key)
    }
}

impl<T> fmt::Debug for SavedStateProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavedStateProperty")
            .field("key", &self.key)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
