#![forbid(unsafe_code)]

//! Core primitives for Ripple: observable values and the machinery combinators
//! are built from.
//!
//! - [`Observable`]: a shared, revision-tracked single-value slot with
//!   synchronous, ordered observer notification.
//! - [`Mediator`]: an observable driven by callbacks on upstream sources,
//!   attached only while it has active observers.
//! - [`Lifecycle`]: an external activity signal that gates scoped observers.
//! - [`Subscription`]: RAII guard returned by every observer registration.
//!
//! # Threading
//!
//! Everything here is `!Send` and `!Sync` (`Rc<RefCell<..>>` storage). All
//! mutation, registration, and delivery happen on the thread that created the
//! values, synchronously, before the triggering call returns.

pub mod lifecycle;
pub mod logging;
pub mod mediator;
pub mod observable;
pub mod subscription;

pub use lifecycle::{Lifecycle, LifecycleEvent, LifecycleOwner, LifecycleState, ListenerId};
pub use mediator::{Mediator, WeakMediator};
pub use observable::{
    ActivationListener, ActivityHooks, Callback, Observable, START_VERSION, WeakObservable,
};
pub use subscription::Subscription;
