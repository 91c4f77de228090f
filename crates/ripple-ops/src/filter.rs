#![forbid(unsafe_code)]

//! Filtering combinators.
//!
//! Each combinator forwards an upstream value only when its own predicate or
//! state allows it. State lives in the returned observable and is never
//! reset: a `skip_while` that has stopped skipping, or a `take` that has met
//! its quota, stays that way for the life of the observable.
//!
//! # Equality
//!
//! The `distinct*` family compares keys structurally (`Eq + Hash` for the
//! full-history variants, `PartialEq` for the until-changed variants). For
//! identity semantics, select a pointer key such as
//! `|v: &Rc<Item>| Rc::as_ptr(v) as usize`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::hash::Hash;
use std::rc::Rc;

use ripple_core::Observable;
use ripple_core::logging::trace;

use crate::relay;

/// Predicate-, history-, and count-based filters.
pub trait FilterExt<T> {
    /// Forward values for which `predicate` holds.
    fn filter<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static;

    /// Forward values for which `predicate` does not hold.
    fn filter_not<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static;

    /// Forward only the first occurrence of each value.
    fn distinct(&self) -> Observable<T>
    where
        T: Eq + Hash;

    /// Forward only the first value seen for each key.
    fn distinct_by<K, S>(&self, selector: S) -> Observable<T>
    where
        K: Eq + Hash + 'static,
        S: Fn(&T) -> K + 'static;

    /// Forward values that differ from the immediately preceding one.
    fn distinct_until_changed(&self) -> Observable<T>
    where
        T: PartialEq;

    /// Forward values whose key differs from the preceding value's key.
    ///
    /// The first value is always forwarded.
    fn distinct_until_changed_by<K, S>(&self, selector: S) -> Observable<T>
    where
        K: PartialEq + 'static,
        S: Fn(&T) -> K + 'static;

    /// Suppress the first `n` values.
    fn skip(&self, n: usize) -> Observable<T>;

    /// Suppress values until `predicate` first fails, then forward everything.
    fn skip_while<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static;

    /// Forward the first `n` values, then detach from upstream.
    fn take(&self, n: usize) -> Observable<T>;

    /// Forward values while `predicate` holds; detach at the first failure.
    fn take_while<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static;
}

impl<T: Clone + 'static> FilterExt<T> for Observable<T> {
    fn filter<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        relay(self, move |out, value| {
            if predicate(value) {
                out.set(value.clone());
            }
        })
    }

    fn filter_not<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        self.filter(move |value| !predicate(value))
    }

    fn distinct(&self) -> Observable<T>
    where
        T: Eq + Hash,
    {
        self.distinct_by(T::clone)
    }

    fn distinct_by<K, S>(&self, selector: S) -> Observable<T>
    where
        K: Eq + Hash + 'static,
        S: Fn(&T) -> K + 'static,
    {
        let seen: RefCell<HashSet<K>> = RefCell::new(HashSet::new());
        self.filter(move |value| {
            let key = selector(value);
            seen.borrow_mut().insert(key)
        })
    }

    fn distinct_until_changed(&self) -> Observable<T>
    where
        T: PartialEq,
    {
        self.distinct_until_changed_by(T::clone)
    }

    fn distinct_until_changed_by<K, S>(&self, selector: S) -> Observable<T>
    where
        K: PartialEq + 'static,
        S: Fn(&T) -> K + 'static,
    {
        // `None` is "no key yet", distinct from every key including `K`'s own
        // empty values.
        let last: RefCell<Option<K>> = RefCell::new(None);
        self.filter(move |value| {
            let key = selector(value);
            let changed = last.borrow().as_ref() != Some(&key);
            last.replace(Some(key));
            changed
        })
    }

    fn skip(&self, n: usize) -> Observable<T> {
        let skipped = Cell::new(0usize);
        self.filter(move |_| {
            if skipped.get() < n {
                skipped.set(skipped.get() + 1);
                false
            } else {
                true
            }
        })
    }

    fn skip_while<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let skipping = Cell::new(true);
        self.filter(move |value| {
            if skipping.get() {
                skipping.set(predicate(value));
            }
            !skipping.get()
        })
    }

    fn take(&self, n: usize) -> Observable<T> {
        let taken = Cell::new(0usize);
        let source = self.downgrade();
        relay(self, move |out, value| {
            if taken.get() < n {
                taken.set(taken.get() + 1);
                out.set(value.clone());
            }
            if taken.get() >= n {
                trace!(n, "take quota reached, detaching");
                if let Some(source) = source.upgrade() {
                    out.remove_source(&source);
                }
            }
        })
    }

    fn take_while<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let source = self.downgrade();
        relay(self, move |out, value| {
            if predicate(value) {
                out.set(value.clone());
            } else if let Some(source) = source.upgrade() {
                trace!("take_while predicate failed, detaching");
                out.remove_source(&source);
            }
        })
    }
}

/// Unwrap `Some` values of an `Observable<Option<T>>`, dropping `None`.
pub trait FilterNotNullExt<T> {
    fn filter_not_null(&self) -> Observable<T>;
}

impl<T: Clone + 'static> FilterNotNullExt<T> for Observable<Option<T>> {
    fn filter_not_null(&self) -> Observable<T> {
        relay(self, |out, value: &Option<T>| {
            if let Some(value) = value {
                out.set(value.clone());
            }
        })
    }
}

/// Runtime type filtering for dynamically typed streams.
///
/// The target type is the explicit type parameter of
/// [`filter_is_instance`](Self::filter_is_instance), checked against each
/// value with [`Any::downcast_ref`].
pub trait FilterIsInstanceExt {
    /// Forward values whose concrete type is `R`, as `R`.
    fn filter_is_instance<R: Clone + 'static>(&self) -> Observable<R>;
}

impl FilterIsInstanceExt for Observable<Rc<dyn Any>> {
    fn filter_is_instance<R: Clone + 'static>(&self) -> Observable<R> {
        relay(self, |out, value: &Rc<dyn Any>| {
            if let Some(value) = value.downcast_ref::<R>() {
                out.set(value.clone());
            }
        })
    }
}
