#![forbid(unsafe_code)]

//! Combinators over two sources, and over adjacent values of one source.
//!
//! # Invariants
//!
//! 1. `zip` never drops or reorders an unpaired value: the i-th output is
//!    built from the i-th value of each side, emitted when the slower side
//!    delivers it.
//! 2. `combine_latest` emits nothing until both sides have delivered at least
//!    once; afterwards every delivery from either side recombines with the
//!    other side's current value.
//! 3. `with_latest_from` emits only on primary deliveries, and only after the
//!    secondary has delivered at least once.
//! 4. The "other side" of a pair is read from the source when the pair is
//!    built, never from a copy kept across deactivation.
//!
//! # Activation order
//!
//! The receiver is bound before `other`, so on first activation the
//! receiver's cached value is delivered first. For `with_latest_from` this
//! means a primary value cached before activation is not paired with the
//! secondary's cached value; the first pair is produced by the next primary
//! delivery.
//!
//! # Failure Modes
//!
//! Passing the same observable as both sides binds it once (a mediator never
//! binds a source twice). `zip` over a single binding never pairs and
//! `combine_latest` never sees its second side; use `zip_with_next` for
//! pairing a stream with itself.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use ripple_core::logging::trace;
use ripple_core::{Mediator, Observable};

use crate::relay;

/// Merging and pairing combinators.
pub trait CombineExt<T> {
    /// Forward every value from either observable. Same as `&self + other`.
    fn plus(&self, other: &Observable<T>) -> Observable<T>;

    /// Pair values index by index.
    fn zip<U>(&self, other: &Observable<U>) -> Observable<(T, U)>
    where
        U: Clone + 'static;

    /// [`zip`](Self::zip), combining each pair with `combine`.
    fn zip_with<U, R, F>(&self, other: &Observable<U>, combine: F) -> Observable<R>
    where
        U: Clone + 'static,
        R: Clone + 'static,
        F: Fn(&T, &U) -> R + 'static;

    /// Pair each value with the one before it. The first value only primes
    /// the pairing.
    fn zip_with_next(&self) -> Observable<(T, T)>;

    /// [`zip_with_next`](Self::zip_with_next), combining `(previous, current)`
    /// with `combine`.
    fn zip_with_next_by<R, F>(&self, combine: F) -> Observable<R>
    where
        R: Clone + 'static,
        F: Fn(&T, &T) -> R + 'static;

    /// Emit both latest values whenever either side emits, once both have.
    fn combine_latest<U>(&self, other: &Observable<U>) -> Observable<(T, U)>
    where
        U: Clone + 'static;

    /// [`combine_latest`](Self::combine_latest), combining with `combine`.
    fn combine_latest_with<U, R, F>(&self, other: &Observable<U>, combine: F) -> Observable<R>
    where
        U: Clone + 'static,
        R: Clone + 'static,
        F: Fn(&T, &U) -> R + 'static;

    /// On each value of `self`, emit it together with the latest value of
    /// `other`. Values of `other` alone emit nothing.
    fn with_latest_from<U>(&self, other: &Observable<U>) -> Observable<(T, U)>
    where
        U: Clone + 'static;

    /// [`with_latest_from`](Self::with_latest_from), combining with `combine`.
    fn with_latest_from_with<U, R, F>(&self, other: &Observable<U>, combine: F) -> Observable<R>
    where
        U: Clone + 'static,
        R: Clone + 'static,
        F: Fn(&T, &U) -> R + 'static;
}

/// Pending values of each side of a `zip`.
struct ZipQueues<T, U> {
    left: VecDeque<T>,
    right: VecDeque<U>,
}

impl<T, U> ZipQueues<T, U> {
    fn pop_pair(&mut self) -> Option<(T, U)> {
        if self.left.is_empty() || self.right.is_empty() {
            return None;
        }
        Some((self.left.pop_front()?, self.right.pop_front()?))
    }
}

impl<T: Clone + 'static> CombineExt<T> for Observable<T> {
    fn plus(&self, other: &Observable<T>) -> Observable<T> {
        self + other
    }

    fn zip<U>(&self, other: &Observable<U>) -> Observable<(T, U)>
    where
        U: Clone + 'static,
    {
        self.zip_with(other, |a, b| (a.clone(), b.clone()))
    }

    fn zip_with<U, R, F>(&self, other: &Observable<U>, combine: F) -> Observable<R>
    where
        U: Clone + 'static,
        R: Clone + 'static,
        F: Fn(&T, &U) -> R + 'static,
    {
        let mediator = Mediator::new();
        let queues = Rc::new(RefCell::new(ZipQueues {
            left: VecDeque::new(),
            right: VecDeque::new(),
        }));
        let emit: Rc<dyn Fn()> = {
            let weak = mediator.downgrade();
            let queues = Rc::clone(&queues);
            Rc::new(move || {
                // The borrow ends before `set` so downstream callbacks may
                // push into either side again.
                let pair = queues.borrow_mut().pop_pair();
                if let (Some((a, b)), Some(mediator)) = (pair, weak.upgrade()) {
                    mediator.set(combine(&a, &b));
                }
            })
        };

        let (left, on_left) = (Rc::clone(&queues), Rc::clone(&emit));
        mediator.add_source(self, move |a: &T| {
            left.borrow_mut().left.push_back(a.clone());
            on_left();
        });
        let right = queues;
        mediator.add_source(other, move |b: &U| {
            right.borrow_mut().right.push_back(b.clone());
            emit();
        });
        mediator.into_observable()
    }

    fn zip_with_next(&self) -> Observable<(T, T)> {
        self.zip_with_next_by(|previous, current| (previous.clone(), current.clone()))
    }

    fn zip_with_next_by<R, F>(&self, combine: F) -> Observable<R>
    where
        R: Clone + 'static,
        F: Fn(&T, &T) -> R + 'static,
    {
        // `None` means nothing seen yet, even when `T` is itself an `Option`.
        let previous: RefCell<Option<T>> = RefCell::new(None);
        relay(self, move |out, value: &T| {
            let before = previous.replace(Some(value.clone()));
            match before {
                Some(before) => out.set(combine(&before, value)),
                None => trace!("zip_with_next primed"),
            }
        })
    }

    fn combine_latest<U>(&self, other: &Observable<U>) -> Observable<(T, U)>
    where
        U: Clone + 'static,
    {
        self.combine_latest_with(other, |a, b| (a.clone(), b.clone()))
    }

    fn combine_latest_with<U, R, F>(&self, other: &Observable<U>, combine: F) -> Observable<R>
    where
        U: Clone + 'static,
        R: Clone + 'static,
        F: Fn(&T, &U) -> R + 'static,
    {
        let mediator = Mediator::new();
        let combine = Rc::new(combine);
        let (left_seen, right_seen) = (Rc::new(Cell::new(false)), Rc::new(Cell::new(false)));

        {
            let (weak, combine) = (mediator.downgrade(), Rc::clone(&combine));
            let (seen, other_seen) = (Rc::clone(&left_seen), Rc::clone(&right_seen));
            let other = other.clone();
            mediator.add_source(self, move |a: &T| {
                seen.set(true);
                if !other_seen.get() {
                    return;
                }
                if let (Some(b), Some(mediator)) = (other.get(), weak.upgrade()) {
                    mediator.set(combine(a, &b));
                }
            });
        }
        let weak = mediator.downgrade();
        let this = self.clone();
        mediator.add_source(other, move |b: &U| {
            right_seen.set(true);
            if !left_seen.get() {
                return;
            }
            if let (Some(a), Some(mediator)) = (this.get(), weak.upgrade()) {
                mediator.set(combine(&a, b));
            }
        });
        mediator.into_observable()
    }

    fn with_latest_from<U>(&self, other: &Observable<U>) -> Observable<(T, U)>
    where
        U: Clone + 'static,
    {
        self.with_latest_from_with(other, |a, b| (a.clone(), b.clone()))
    }

    fn with_latest_from_with<U, R, F>(&self, other: &Observable<U>, combine: F) -> Observable<R>
    where
        U: Clone + 'static,
        R: Clone + 'static,
        F: Fn(&T, &U) -> R + 'static,
    {
        let mediator = Mediator::new();
        let secondary_seen = Rc::new(Cell::new(false));

        let weak = mediator.downgrade();
        let (seen, secondary) = (Rc::clone(&secondary_seen), other.clone());
        mediator.add_source(self, move |a: &T| {
            if !seen.get() {
                return;
            }
            if let (Some(b), Some(mediator)) = (secondary.get(), weak.upgrade()) {
                mediator.set(combine(a, &b));
            }
        });
        mediator.add_source(other, move |_: &U| secondary_seen.set(true));
        mediator.into_observable()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Recorder, push_all};

    #[test]
    fn plus_forwards_both_sides_unsynchronised() {
        let a: Observable<i32> = Observable::new();
        let b: Observable<i32> = Observable::new();
        let rec = Recorder::attach(&a.plus(&b));

        a.set(1);
        a.set(2);
        b.set(10);
        a.set(3);
        assert_eq!(rec.take(), vec![1, 2, 10, 3]);
    }

    #[test]
    fn zip_pairs_by_index_and_buffers_the_faster_side() {
        let a: Observable<i32> = Observable::new();
        let b: Observable<char> = Observable::new();
        let rec = Recorder::attach(&a.zip(&b));

        push_all(&a, &[1, 2, 3]);
        assert!(rec.take().is_empty());

        b.set('x');
        assert_eq!(rec.take(), vec![(1, 'x')]);
        push_all(&b, &['y', 'z', 'w']);
        assert_eq!(rec.take(), vec![(2, 'y'), (3, 'z')]);

        a.set(4);
        assert_eq!(rec.take(), vec![(4, 'w')]);
    }

    #[test]
    fn zip_with_applies_combiner() {
        let a: Observable<i32> = Observable::new();
        let b: Observable<i32> = Observable::new();
        let rec = Recorder::attach(&a.zip_with(&b, |x, y| x * y));

        push_all(&a, &[2, 3]);
        push_all(&b, &[5, 7]);
        assert_eq!(rec.take(), vec![10, 21]);
    }

    #[test]
    fn zip_with_next_needs_two_values() {
        let source: Observable<i32> = Observable::new();
        let rec = Recorder::attach(&source.zip_with_next());

        source.set(1);
        assert!(rec.take().is_empty());
        push_all(&source, &[2, 3]);
        assert_eq!(rec.take(), vec![(1, 2), (2, 3)]);
    }

    #[test]
    fn zip_with_next_treats_leading_none_as_a_value() {
        let source: Observable<Option<i32>> = Observable::new();
        let rec = Recorder::attach(&source.zip_with_next());

        push_all(&source, &[None, Some(1)]);
        assert_eq!(rec.take(), vec![(None, Some(1))]);
    }

    #[test]
    fn zip_with_next_by_computes_deltas() {
        let source: Observable<i32> = Observable::new();
        let rec = Recorder::attach(&source.zip_with_next_by(|prev, cur| cur - prev));

        push_all(&source, &[1, 4, 9, 16]);
        assert_eq!(rec.take(), vec![3, 5, 7]);
    }

    #[test]
    fn combine_latest_waits_for_both_then_recombines() {
        let a: Observable<i32> = Observable::new();
        let b: Observable<char> = Observable::new();
        let rec = Recorder::attach(&a.combine_latest(&b));

        a.set(1);
        b.set('a');
        a.set(2);
        assert_eq!(rec.take(), vec![(1, 'a'), (2, 'a')]);

        b.set('b');
        assert_eq!(rec.take(), vec![(2, 'b')]);
    }

    #[test]
    fn combine_latest_uses_cached_values_on_activation() {
        let a = Observable::with_value(1);
        let b = Observable::with_value("one");
        let rec = Recorder::attach(&a.combine_latest_with(&b, |n, s| format!("{n}:{s}")));
        assert_eq!(rec.take(), vec![String::from("1:one")]);
    }

    #[test]
    fn with_latest_from_emits_only_on_primary() {
        let primary: Observable<i32> = Observable::new();
        let secondary: Observable<char> = Observable::new();
        let rec = Recorder::attach(&primary.with_latest_from(&secondary));

        primary.set(1);
        secondary.set('a');
        assert!(rec.take().is_empty());

        primary.set(2);
        secondary.set('b');
        secondary.set('c');
        primary.set(3);
        assert_eq!(rec.take(), vec![(2, 'a'), (3, 'c')]);
    }

    #[test]
    fn with_latest_from_with_applies_combiner() {
        let primary: Observable<i32> = Observable::new();
        let secondary = Observable::with_value(100);
        let rec = Recorder::attach(&primary.with_latest_from_with(&secondary, |a, b| a + b));

        push_all(&primary, &[1, 2]);
        assert_eq!(rec.take(), vec![101, 102]);
    }

    #[test]
    fn combine_latest_reactivation_pairs_current_values() {
        let a: Observable<i32> = Observable::new();
        let b: Observable<char> = Observable::new();
        let combined = a.combine_latest(&b);

        let rec = Recorder::attach(&combined);
        a.set(1);
        b.set('x');
        assert_eq!(rec.take(), vec![(1, 'x')]);
        drop(rec);

        b.set('y');
        a.set(2);
        let rec = Recorder::attach(&combined);
        assert_eq!(rec.take(), vec![(2, 'y'), (2, 'y')]);

        a.set(3);
        assert_eq!(rec.take(), vec![(3, 'y')]);
    }

    #[test]
    fn combine_latest_reactivation_without_changes_emits_nothing() {
        let a = Observable::with_value(1);
        let b = Observable::with_value('x');
        let combined = a.combine_latest(&b);

        drop(Recorder::attach(&combined));
        let revision = combined.version();
        let rec = Recorder::attach(&combined);
        assert_eq!(rec.take(), vec![(1, 'x')]);
        assert_eq!(combined.version(), revision);
    }

    #[test]
    fn with_latest_from_reactivation_reads_current_secondary() {
        let primary: Observable<i32> = Observable::new();
        let secondary: Observable<char> = Observable::new();
        let paired = primary.with_latest_from(&secondary);

        let rec = Recorder::attach(&paired);
        secondary.set('a');
        primary.set(1);
        assert_eq!(rec.take(), vec![(1, 'a')]);
        drop(rec);

        secondary.set('b');
        let rec = Recorder::attach(&paired);
        assert_eq!(rec.take(), vec![(1, 'a')]);
        primary.set(2);
        assert_eq!(rec.take(), vec![(2, 'b')]);
        drop(rec);

        secondary.set('c');
        primary.set(3);
        let rec = Recorder::attach(&paired);
        assert_eq!(rec.take(), vec![(3, 'c')]);
    }

    #[test]
    fn zip_reactivation_does_not_requeue_delivered_values() {
        let a: Observable<i32> = Observable::new();
        let b: Observable<char> = Observable::new();
        let zipped = a.zip(&b);

        let rec = Recorder::attach(&zipped);
        push_all(&a, &[1, 2]);
        drop(rec);

        let rec = Recorder::attach(&zipped);
        push_all(&b, &['x', 'y', 'z']);
        assert_eq!(rec.take(), vec![(1, 'x'), (2, 'y')]);
    }

    #[test]
    fn zip_with_next_reactivation_keeps_previous_value() {
        let source: Observable<i32> = Observable::new();
        let pairs = source.zip_with_next();

        let rec = Recorder::attach(&pairs);
        push_all(&source, &[1, 2]);
        assert_eq!(rec.take(), vec![(1, 2)]);
        drop(rec);

        let rec = Recorder::attach(&pairs);
        assert_eq!(rec.take(), vec![(1, 2)]);
        source.set(3);
        assert_eq!(rec.take(), vec![(2, 3)]);
    }

    #[test]
    fn combinators_release_sources_when_unobserved() {
        let a: Observable<i32> = Observable::new();
        let b: Observable<i32> = Observable::new();
        let zipped = a.zip(&b);
        let rec = Recorder::attach(&zipped);
        assert!(a.has_observers() && b.has_observers());

        drop(rec);
        assert!(!a.has_observers());
        assert!(!b.has_observers());
    }
}
