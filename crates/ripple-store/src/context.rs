#![forbid(unsafe_code)]

//! Per-scope bundle of store, saved state, and lifecycle.
//!
//! Call sites receive a [`StoreContext`] explicitly instead of looking up a
//! process-wide registry. The context clears its [`ViewModelStore`] when its
//! lifecycle is destroyed.

use std::fmt;

use ripple_core::logging::debug;
use ripple_core::{Lifecycle, LifecycleOwner, LifecycleState, ListenerId};

use crate::error::Result;
use crate::saved_state::SavedStateHandle;
use crate::view_model::{TypedProvider, ViewModel, ViewModelProvider, ViewModelStore};

pub struct StoreContext {
    lifecycle: Lifecycle,
    store: ViewModelStore,
    saved_state: SavedStateHandle,
    listener: Option<ListenerId>,
}

impl StoreContext {
    /// A context with an empty store and saved state, scoped to `lifecycle`.
    #[must_use]
    pub fn new(lifecycle: &Lifecycle) -> Self {
        Self::with_parts(lifecycle, ViewModelStore::new(), SavedStateHandle::new())
    }

    /// A context over existing parts, e.g. a saved state restored from an
    /// earlier scope.
    #[must_use]
    pub fn with_parts(
        lifecycle: &Lifecycle,
        store: ViewModelStore,
        saved_state: SavedStateHandle,
    ) -> Self {
        let listener = if lifecycle.is_destroyed() {
            store.clear();
            None
        } else {
            let weak = store.downgrade();
            Some(lifecycle.add_listener(move |state| {
                if state != LifecycleState::Destroyed {
                    return;
                }
                if let Some(store) = weak.upgrade() {
                    debug!(count = store.len(), "scope destroyed, clearing view models");
                    store.clear();
                }
            }))
        };
        Self {
            lifecycle: lifecycle.clone(),
            store,
            saved_state,
            listener,
        }
    }

    #[must_use]
    pub fn store(&self) -> &ViewModelStore {
        &self.store
    }

    #[must_use]
    pub fn saved_state(&self) -> &SavedStateHandle {
        &self.saved_state
    }

    #[must_use]
    pub fn provider(&self) -> ViewModelProvider {
        ViewModelProvider::new(self.store.clone())
    }

    /// Shorthand for `self.provider().typed(factory)`.
    pub fn typed<T: ViewModel>(&self, factory: impl Fn() -> T + 'static) -> Result<TypedProvider<T>> {
        self.provider().typed(factory)
    }
}

impl LifecycleOwner for StoreContext {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

impl Drop for StoreContext {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.lifecycle.remove_listener(listener);
        }
    }
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("lifecycle", &self.lifecycle)
            .field("store", &self.store)
            .field("saved_state", &self.saved_state)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
