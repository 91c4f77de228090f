#![forbid(unsafe_code)]

//! Reactive combinators over [`Observable`].
//!
//! Every combinator builds a new [`Mediator`](ripple_core::Mediator) over its
//! receiver (and, for the combining family, a second source) and returns the
//! mediator's output. The returned observable attaches to its sources only
//! while it has active observers, so an unobserved chain does no work.
//!
//! Operators are grouped into extension traits, all re-exported from
//! [`prelude`]:
//!
//! - [`TransformExt`]: `map`, `map_not_null`, `switch_map`
//! - [`FilterExt`]: `filter`, `distinct*`, `skip*`, `take*`
//! - [`FilterNotNullExt`], [`FilterIsInstanceExt`]
//! - [`CombineExt`]: `plus`, `zip*`, `combine_latest*`, `with_latest_from*`
//! - [`TapExt`]: `do_on_active`, `do_on_inactive`, `do_on_changed`
//! - [`SubscribeExt`]: `subscribe`, `subscribe_changes`, and scoped variants
//!
//! # Invariants
//!
//! 1. A combinator only ever emits values derived from values its sources
//!    have already delivered.
//! 2. Per-combinator state (buffers, latches, counters) is private to the
//!    returned observable and mutated only from source callbacks.
//! 3. No combinator introduces threads, locks, or deferred dispatch.

pub mod combine;
pub mod filter;
pub mod subscribe;
pub mod tap;
pub mod transform;

use ripple_core::{Mediator, Observable};

pub use combine::CombineExt;
pub use filter::{FilterExt, FilterIsInstanceExt, FilterNotNullExt};
pub use subscribe::SubscribeExt;
pub use tap::TapExt;
pub use transform::TransformExt;

/// Import this to get every operator in scope.
pub mod prelude {
    pub use crate::{
        CombineExt, FilterExt, FilterIsInstanceExt, FilterNotNullExt, SubscribeExt, TapExt,
        TransformExt, observable_of,
    };
    pub use ripple_core::{Lifecycle, LifecycleOwner, Observable, Subscription};
}

/// An observable already holding `value`.
#[must_use]
pub fn observable_of<T: Clone + 'static>(value: T) -> Observable<T> {
    Observable::with_value(value)
}

/// Build a single-source mediator whose source callback is `on_value`.
///
/// The callback receives a live handle to the mediator; it is skipped once
/// the returned observable has been dropped.
pub(crate) fn relay<S, T>(
    source: &Observable<S>,
    on_value: impl Fn(&Mediator<T>, &S) + 'static,
) -> Observable<T>
where
    S: Clone + 'static,
    T: Clone + 'static,
{
    let mediator = Mediator::new();
    let weak = mediator.downgrade();
    mediator.add_source(source, move |value| {
        if let Some(mediator) = weak.upgrade() {
            on_value(&mediator, value);
        }
    });
    mediator.into_observable()
}
