#![forbid(unsafe_code)]

//! Scope-owned state for Ripple applications.
//!
//! - [`ViewModelStore`] / [`ViewModelProvider`] / [`TypedProvider`]: a keyed
//!   cache of shared view models, cleared with its scope.
//! - [`LazyValue`]: explicit first-use initialisation.
//! - [`SavedStateHandle`]: string-keyed dynamic values with typed reads and
//!   observable bindings.
//! - [`StoreContext`]: the bundle a scope hands to its call sites.
//!
//! Fallible operations return [`Result`] with a [`StoreError`].

pub mod context;
pub mod error;
pub mod lazy;
pub mod saved_state;
pub mod view_model;

pub use context::StoreContext;
pub use error::{Result, StoreError};
pub use lazy::LazyValue;
pub use saved_state::{SavedStateHandle, SavedStateProperty};
pub use view_model::{TypedProvider, ViewModel, ViewModelProvider, ViewModelStore};
