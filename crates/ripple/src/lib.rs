#![forbid(unsafe_code)]

//! Ripple public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.
//! `use ripple::prelude::*;` brings every operator trait into scope together
//! with the core types they act on.

pub use ripple_core as core;
pub use ripple_ops as ops;
#[cfg(feature = "store")]
pub use ripple_store as store;

pub use ripple_core::{
    Lifecycle, LifecycleEvent, LifecycleOwner, LifecycleState, Mediator, Observable, Subscription,
};

pub mod prelude {
    pub use ripple_ops::prelude::*;

    pub use ripple_core::{LifecycleEvent, LifecycleState, Mediator};

    #[cfg(feature = "store")]
    pub use ripple_store::{
        LazyValue, SavedStateHandle, StoreContext, StoreError, ViewModel, ViewModelProvider,
        ViewModelStore,
    };
}
