#![forbid(unsafe_code)]

//! Keyed, scope-owned cache of view models.
//!
//! A [`ViewModelStore`] maps string keys to shared instances. A
//! [`ViewModelProvider`] looks an instance up by key and type, creating it with
//! a caller-supplied factory on a miss. [`TypedProvider`] fixes the type and
//! derives keys from the type name.
//!
//! # Invariants
//!
//! 1. A key maps to at most one instance.
//! 2. Every instance that leaves the store (replaced or cleared) has
//!    [`ViewModel::on_cleared`] called exactly once.
//! 3. `on_cleared` runs with no internal borrow held, so it may use the store.
//!
//! # Failure Modes
//!
//! - A lookup that finds an instance of another type under the key replaces
//!   it (clearing the old one) and logs a warning.
//! - [`TypedProvider::new`] rejects types without a stable name (closures and
//!   other compiler-generated types).

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use ripple_core::logging::{debug, warn};

use crate::error::{Result, StoreError};
use crate::lazy::LazyValue;

/// A cached object whose lifetime is bound to a [`ViewModelStore`].
pub trait ViewModel: 'static {
    /// Called once when the instance is removed from its store.
    fn on_cleared(&self) {}
}

struct Entry {
    model: Rc<dyn ViewModel>,
    any: Rc<dyn Any>,
    type_name: &'static str,
}

impl Entry {
    fn new<T: ViewModel>(model: Rc<T>) -> Self {
        Self {
            model: model.clone(),
            any: model,
            type_name: type_name::<T>(),
        }
    }
}

/// Shared handle to a keyed view-model cache.
///
/// Cloning yields another handle to the **same** cache.
#[derive(Clone, Default)]
pub struct ViewModelStore {
    entries: Rc<RefCell<BTreeMap<String, Entry>>>,
}

impl ViewModelStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `model` under `key`, clearing any instance it replaces.
    pub fn put<T: ViewModel>(&self, key: impl Into<String>, model: Rc<T>) {
        let key = key.into();
        let previous = self
            .entries
            .borrow_mut()
            .insert(key.clone(), Entry::new(model));
        if let Some(previous) = previous {
            debug!(%key, replaced = previous.type_name, "view model replaced");
            previous.model.on_cleared();
        }
    }

    /// The instance under `key`, if there is one of type `T`.
    #[must_use]
    pub fn get<T: ViewModel>(&self, key: &str) -> Option<Rc<T>> {
        let any = self.entries.borrow().get(key).map(|e| Rc::clone(&e.any))?;
        any.downcast::<T>().ok()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Remove every instance, calling `on_cleared` on each in key order.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.entries.borrow_mut());
        if !drained.is_empty() {
            debug!(count = drained.len(), "view model store cleared");
        }
        for entry in drained.into_values() {
            entry.model.on_cleared();
        }
    }

    pub(crate) fn downgrade(&self) -> WeakViewModelStore {
        WeakViewModelStore(Rc::downgrade(&self.entries))
    }

    fn type_name_of(&self, key: &str) -> Option<&'static str> {
        self.entries.borrow().get(key).map(|e| e.type_name)
    }
}

impl fmt::Debug for ViewModelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModelStore")
            .field("keys", &self.keys())
            .finish()
    }
}

pub(crate) struct WeakViewModelStore(Weak<RefCell<BTreeMap<String, Entry>>>);

impl WeakViewModelStore {
    pub(crate) fn upgrade(&self) -> Option<ViewModelStore> {
        self.0.upgrade().map(|entries| ViewModelStore { entries })
    }
}

/// Get-or-create access to a [`ViewModelStore`].
#[derive(Clone, Debug)]
pub struct ViewModelProvider {
    store: ViewModelStore,
}

impl ViewModelProvider {
    #[must_use]
    pub fn new(store: ViewModelStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &ViewModelStore {
        &self.store
    }

    /// The `T` stored under `key`, or a new one from `factory`.
    ///
    /// An instance of a different type under `key` is replaced.
    pub fn get_or_create<T: ViewModel>(&self, key: &str, factory: impl FnOnce() -> T) -> Rc<T> {
        if let Some(model) = self.store.get::<T>(key) {
            return model;
        }
        if self.store.contains(key) {
            warn!(
                key,
                existing = ?self.store.type_name_of(key),
                wanted = type_name::<T>(),
                "replacing view model of another type"
            );
        }
        let model = Rc::new(factory());
        self.store.put(key, Rc::clone(&model));
        model
    }

    /// Fallible [`get_or_create`](Self::get_or_create). Nothing is stored
    /// when `factory` fails.
    pub fn try_get_or_create<T: ViewModel, E>(
        &self,
        key: &str,
        factory: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<Rc<T>, E> {
        if let Some(model) = self.store.get::<T>(key) {
            return Ok(model);
        }
        let model = Rc::new(factory()?);
        self.store.put(key, Rc::clone(&model));
        Ok(model)
    }

    /// A provider fixed to `T`, creating instances with `factory`.
    pub fn typed<T: ViewModel>(&self, factory: impl Fn() -> T + 'static) -> Result<TypedProvider<T>> {
        TypedProvider::new(self.clone(), factory)
    }

    /// Defer `get_or_create` until first access.
    pub fn lazy<T: ViewModel>(
        &self,
        key: impl Into<String>,
        factory: impl Fn() -> T + 'static,
    ) -> LazyValue<Rc<T>> {
        let provider = self.clone();
        let key = key.into();
        LazyValue::new(move || provider.get_or_create(&key, &factory))
    }
}

/// A [`ViewModelProvider`] bound to one type, keyed by that type's name.
pub struct TypedProvider<T> {
    provider: ViewModelProvider,
    type_key: &'static str,
    factory: Rc<dyn Fn() -> T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ViewModel> TypedProvider<T> {
    pub fn new(provider: ViewModelProvider, factory: impl Fn() -> T + 'static) -> Result<Self> {
        let type_key = stable_type_name(type_name::<T>())?;
        Ok(Self {
            provider,
            type_key,
            factory: Rc::new(factory),
            _marker: PhantomData,
        })
    }

    /// The instance keyed by the type name, or by `"<type name>:<name>"`
    /// when `name` is given.
    pub fn get(&self, name: Option<&str>) -> Rc<T> {
        let key = self.key(name);
        self.provider.get_or_create(&key, || (self.factory)())
    }

    #[must_use]
    pub fn key(&self, name: Option<&str>) -> String {
        match name {
            Some(name) => format!("{}:{name}", self.type_key),
            None => self.type_key.to_owned(),
        }
    }
}

impl<T> fmt::Debug for TypedProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedProvider")
            .field("type_key", &self.type_key)
            .finish()
    }
}

/// Reject compiler-generated type names, which are not stable keys.
fn stable_type_name(name: &'static str) -> Result<&'static str> {
    if name.contains("{{") || name.contains("{closure") {
        return Err(StoreError::invalid(format!(
            "anonymous types cannot be view models: {name}"
        )));
    }
    Ok(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
