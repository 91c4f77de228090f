#![forbid(unsafe_code)]

//! Value-transforming combinators.

use std::cell::RefCell;
use std::rc::Rc;

use ripple_core::Observable;
use ripple_core::logging::trace;

use crate::relay;

/// `map`, `map_not_null`, and `switch_map`.
pub trait TransformExt<T> {
    /// Emit `transform(v)` for every upstream value `v`.
    fn map<R, F>(&self, transform: F) -> Observable<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> R + 'static;

    /// Emit `r` whenever `transform(v)` returns `Some(r)`; drop the value
    /// otherwise.
    fn map_not_null<R, F>(&self, transform: F) -> Observable<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> Option<R> + 'static;

    /// Re-point the output at the observable returned for each upstream value.
    ///
    /// Only values from the most recently returned observable are forwarded.
    /// Returning `None` detaches from the previous one and forwards nothing
    /// until a later upstream value yields `Some`. Returning the observable
    /// that is already attached changes nothing.
    fn switch_map<R, F>(&self, transform: F) -> Observable<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> Option<Observable<R>> + 'static;
}

impl<T: Clone + 'static> TransformExt<T> for Observable<T> {
    fn map<R, F>(&self, transform: F) -> Observable<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> R + 'static,
    {
        relay(self, move |out, value| out.set(transform(value)))
    }

    fn map_not_null<R, F>(&self, transform: F) -> Observable<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> Option<R> + 'static,
    {
        relay(self, move |out, value| {
            if let Some(mapped) = transform(value) {
                out.set(mapped);
            }
        })
    }

    fn switch_map<R, F>(&self, transform: F) -> Observable<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> Option<Observable<R>> + 'static,
    {
        let current: Rc<RefCell<Option<Observable<R>>>> = Rc::new(RefCell::new(None));
        relay(self, move |out, value| {
            let next = transform(value);
            let previous = current.borrow().clone();
            if matches!((&previous, &next), (Some(p), Some(n)) if p.ptr_eq(n)) {
                return;
            }
            if let Some(previous) = previous {
                out.remove_source(&previous);
            }
            let attached = match next {
                Some(next) => {
                    let weak = out.downgrade();
                    let bound = out.add_source(&next, move |inner: &R| {
                        if let Some(out) = weak.upgrade() {
                            out.set(inner.clone());
                        }
                    });
                    // Only the upstream itself is already bound here; it must
                    // never be unbound by a later switch.
                    if !bound {
                        trace!("switch_map inner is the upstream, ignored");
                    }
                    bound.then_some(next)
                }
                None => {
                    trace!("switch_map detached");
                    None
                }
            };
            current.replace(attached);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Recorder, push_all};

    #[test]
    fn map_applies_in_order() {
        let source = Observable::new();
        let doubled = source.map(|v: &i32| v * 2);
        let rec = Recorder::attach(&doubled);

        push_all(&source, &[1, 2, 3]);
        assert_eq!(rec.take(), vec![2, 4, 6]);
    }

    #[test]
    fn map_is_lazy_until_observed() {
        let calls = Rc::new(std::cell::Cell::new(0));
        let counter = Rc::clone(&calls);
        let source = Observable::with_value(1);
        let mapped = source.map(move |v: &i32| {
            counter.set(counter.get() + 1);
            *v
        });

        source.set(2);
        assert_eq!(calls.get(), 0);

        let rec = Recorder::attach(&mapped);
        assert_eq!(rec.take(), vec![2]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn map_not_null_drops_none() {
        let source = Observable::new();
        let parsed = source.map_not_null(|s: &&str| s.parse::<i32>().ok());
        let rec = Recorder::attach(&parsed);

        push_all(&source, &["1", "x", "3"]);
        assert_eq!(rec.take(), vec![1, 3]);
    }

    #[test]
    fn switch_map_follows_latest_inner() {
        let left = Observable::with_value("left-0");
        let right = Observable::with_value("right-0");
        let selector = Observable::new();

        let (l, r) = (left.clone(), right.clone());
        let switched = selector.switch_map(move |pick_left: &bool| {
            Some(if *pick_left { l.clone() } else { r.clone() })
        });
        let rec = Recorder::attach(&switched);

        selector.set(true);
        assert_eq!(rec.take(), vec!["left-0"]);

        left.set("left-1");
        selector.set(false);
        assert_eq!(rec.take(), vec!["left-1", "right-0"]);

        left.set("left-2");
        right.set("right-1");
        assert_eq!(rec.take(), vec!["right-1"]);
        assert!(!left.has_observers());
    }

    #[test]
    fn switch_map_none_detaches() {
        let inner = Observable::with_value(10);
        let selector = Observable::new();
        let handle = inner.clone();
        let switched =
            selector.switch_map(move |on: &bool| if *on { Some(handle.clone()) } else { None });
        let rec = Recorder::attach(&switched);

        selector.set(true);
        selector.set(false);
        inner.set(11);
        assert_eq!(rec.take(), vec![10]);
        assert!(!inner.has_observers());
    }

    #[test]
    fn switch_map_returning_upstream_keeps_following_it() {
        let source: Observable<i32> = Observable::new();
        let inner = Observable::with_value(100);
        let (upstream, handle) = (source.clone(), inner.clone());
        let switched = source.switch_map(move |v: &i32| {
            Some(if *v < 0 { upstream.clone() } else { handle.clone() })
        });
        let rec = Recorder::attach(&switched);

        source.set(1);
        source.set(-1);
        assert!(!inner.has_observers());
        assert_eq!(source.observer_count(), 1);

        source.set(2);
        inner.set(101);
        assert_eq!(rec.take(), vec![100, 100, 101]);

        source.set(-2);
        inner.set(102);
        assert!(rec.take().is_empty());
        assert!(!inner.has_observers());
    }

    #[test]
    fn switch_map_same_inner_is_not_reattached() {
        let inner = Observable::with_value(1);
        let selector = Observable::new();
        let handle = inner.clone();
        let switched = selector.switch_map(move |_: &u8| Some(handle.clone()));
        let rec = Recorder::attach(&switched);

        selector.set(0);
        selector.set(1);
        assert_eq!(rec.take(), vec![1]);
        assert_eq!(inner.observer_count(), 1);
    }
}
