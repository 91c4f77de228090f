//! Property-based invariant tests for the ripple-ops combinators.
//!
//! Each property drives one or two plain observables with an arbitrary
//! sequence of values and compares what a combinator delivered against a
//! straightforward model of the same operator over a `Vec`:
//!
//! 1. `map` preserves count and order.
//! 2. `zip` pairs by index, for any interleaving of the two sides.
//! 3. `distinct` forwards first occurrences only.
//! 4. `distinct_until_changed_by` forwards exactly the key flips.
//! 5. `skip(n)` / `take(n)` split the sequence at `n`; `take` detaches.
//! 6. `combine_latest` and `with_latest_from` agree with a latest-value model.
//! 7. A subscribe/unsubscribe pair is net-neutral on activation state.
//! 8. Unsubscribing and re-subscribing at arbitrary points never replays a
//!    value a combinator has already consumed, and pairs read the sources'
//!    current values.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use proptest::prelude::*;
use ripple_ops::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Observe `observable` forever, collecting every delivered value.
fn record<T: Clone + 'static>(observable: &Observable<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
    let values = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&values);
    let subscription = observable.subscribe(move |v: &T| sink.borrow_mut().push(v.clone()));
    (values, subscription)
}

fn values() -> impl Strategy<Value = Vec<i16>> {
    proptest::collection::vec(-20i16..20, 0..64)
}

/// A value addressed to the left (`true`) or right (`false`) source.
fn interleaved() -> impl Strategy<Value = Vec<(bool, i16)>> {
    proptest::collection::vec((any::<bool>(), -20i16..20), 0..64)
}

// ═════════════════════════════════════════════════════════════════════════
// 1-4. Single-source operators
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn map_preserves_count_and_order(input in values()) {
        let source = Observable::new();
        let (seen, _sub) = record(&source.map(|v: &i16| i32::from(*v) * 3));
        for v in &input {
            source.set(*v);
        }
        let expected: Vec<i32> = input.iter().map(|v| i32::from(*v) * 3).collect();
        prop_assert_eq!(&*seen.borrow(), &expected);
    }

    #[test]
    fn distinct_forwards_first_occurrences(input in values()) {
        let source: Observable<i16> = Observable::new();
        let (seen, _sub) = record(&source.distinct());
        for v in &input {
            source.set(*v);
        }
        let mut first = HashSet::new();
        let expected: Vec<i16> = input.iter().copied().filter(|v| first.insert(*v)).collect();
        prop_assert_eq!(&*seen.borrow(), &expected);
    }

    #[test]
    fn distinct_until_changed_by_forwards_key_flips(input in values()) {
        let source = Observable::new();
        let (seen, _sub) = record(&source.distinct_until_changed_by(|v: &i16| v.rem_euclid(3)));
        for v in &input {
            source.set(*v);
        }
        let mut expected = Vec::new();
        let mut last_key = None;
        for v in &input {
            let key = Some(v.rem_euclid(3));
            if key != last_key {
                expected.push(*v);
                last_key = key;
            }
        }
        prop_assert_eq!(&*seen.borrow(), &expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. skip / take
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn skip_and_take_split_at_n(input in values(), n in 0usize..10) {
        let source: Observable<i16> = Observable::new();
        let (skipped, _skip_sub) = record(&source.skip(n));
        let taken_stream = source.take(n);
        let (taken, _take_sub) = record(&taken_stream);
        for v in &input {
            source.set(*v);
        }

        let split = n.min(input.len());
        prop_assert_eq!(&*taken.borrow(), &input[..split].to_vec());
        prop_assert_eq!(&*skipped.borrow(), &input[split..].to_vec());

        // Only the `skip` relay stays attached once `take` has detached.
        let take_attached = input.len() < n.max(1);
        let expected_observers = 1 + usize::from(take_attached);
        prop_assert_eq!(source.observer_count(), expected_observers);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2, 6. Two-source operators
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn zip_pairs_by_index(events in interleaved()) {
        let left: Observable<i16> = Observable::new();
        let right: Observable<i16> = Observable::new();
        let (seen, _sub) = record(&left.zip(&right));

        let (mut lefts, mut rights) = (Vec::new(), Vec::new());
        for (to_left, v) in &events {
            if *to_left {
                left.set(*v);
                lefts.push(*v);
            } else {
                right.set(*v);
                rights.push(*v);
            }
        }

        let expected: Vec<(i16, i16)> = lefts.into_iter().zip(rights).collect();
        prop_assert_eq!(&*seen.borrow(), &expected);
    }

    #[test]
    fn combine_latest_matches_latest_value_model(events in interleaved()) {
        let left: Observable<i16> = Observable::new();
        let right: Observable<i16> = Observable::new();
        let (seen, _sub) = record(&left.combine_latest(&right));

        let (mut last_left, mut last_right) = (None, None);
        let mut expected = Vec::new();
        for (to_left, v) in &events {
            if *to_left {
                left.set(*v);
                last_left = Some(*v);
            } else {
                right.set(*v);
                last_right = Some(*v);
            }
            if let (Some(a), Some(b)) = (last_left, last_right) {
                expected.push((a, b));
            }
        }
        prop_assert_eq!(&*seen.borrow(), &expected);
    }

    #[test]
    fn with_latest_from_emits_only_on_primary(events in interleaved()) {
        let primary: Observable<i16> = Observable::new();
        let secondary: Observable<i16> = Observable::new();
        let (seen, _sub) = record(&primary.with_latest_from(&secondary));

        let mut latest = None;
        let mut expected = Vec::new();
        for (to_primary, v) in &events {
            if *to_primary {
                primary.set(*v);
                if let Some(b) = latest {
                    expected.push((*v, b));
                }
            } else {
                secondary.set(*v);
                latest = Some(*v);
            }
        }
        prop_assert_eq!(&*seen.borrow(), &expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Subscription pairs are net-neutral
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn subscribe_unsubscribe_pairs_are_net_neutral(anchored in any::<bool>(), pairs in 1usize..8) {
        let source = Observable::with_value(0i16);
        let mapped = source.map(|v: &i16| *v + 1);
        let _anchor = anchored.then(|| mapped.subscribe(|_| {}));
        let before = (mapped.active_observer_count(), source.observer_count());

        for _ in 0..pairs {
            let extra = mapped.subscribe(|_| {});
            extra.unsubscribe();
        }

        prop_assert_eq!((mapped.active_observer_count(), source.observer_count()), before);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Deactivation and reactivation
// ═════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Step {
    Left(i16),
    Right(i16),
    /// Drop the only subscription, or subscribe again if there is none.
    Toggle,
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec(
        prop_oneof![
            4 => (-20i16..20).prop_map(Step::Left),
            4 => (-20i16..20).prop_map(Step::Right),
            1 => Just(Step::Toggle),
        ],
        0..64,
    )
}

fn sources() -> (Observable<i16>, Observable<i16>) {
    (Observable::new(), Observable::new())
}

/// Apply `steps` to the sources while toggling the single subscription to
/// `output`; returns every value `output` emitted while observed.
fn drive<R: Clone + 'static>(
    left: &Observable<i16>,
    right: &Observable<i16>,
    output: &Observable<R>,
    steps: &[Step],
) -> Vec<R> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let observe = || {
        let sink = Rc::clone(&log);
        output.subscribe_changes(move |v: &R| sink.borrow_mut().push(v.clone()))
    };
    let mut subscription = Some(observe());
    for step in steps {
        match step {
            Step::Left(v) => left.set(*v),
            Step::Right(v) => right.set(*v),
            Step::Toggle => {
                subscription = match subscription.take() {
                    Some(active) => {
                        drop(active);
                        None
                    }
                    None => Some(observe()),
                };
            }
        }
    }
    drop(subscription);
    let emitted = log.borrow().clone();
    emitted
}

/// One source value as a combinator receives it, with both sources' current
/// values at that moment.
#[derive(Debug, Clone, Copy)]
struct Delivery {
    from_left: bool,
    left: Option<i16>,
    right: Option<i16>,
}

impl Delivery {
    fn value(self) -> Option<i16> {
        if self.from_left { self.left } else { self.right }
    }
}

/// What the combinator's source links receive: every value set while
/// observed, plus, on re-subscription, the latest value of each side that
/// changed while unobserved (receiver side first).
fn deliveries(steps: &[Step]) -> Vec<Delivery> {
    let mut observed = true;
    let (mut left, mut right) = (None, None);
    let (mut left_dirty, mut right_dirty) = (false, false);
    let mut out = Vec::new();
    for step in steps {
        match step {
            Step::Left(v) => {
                left = Some(*v);
                if observed {
                    out.push(Delivery { from_left: true, left, right });
                } else {
                    left_dirty = true;
                }
            }
            Step::Right(v) => {
                right = Some(*v);
                if observed {
                    out.push(Delivery { from_left: false, left, right });
                } else {
                    right_dirty = true;
                }
            }
            Step::Toggle => {
                observed = !observed;
                if observed {
                    if left_dirty {
                        out.push(Delivery { from_left: true, left, right });
                    }
                    if right_dirty {
                        out.push(Delivery { from_left: false, left, right });
                    }
                }
                left_dirty = false;
                right_dirty = false;
            }
        }
    }
    out
}

fn side(deliveries: &[Delivery], from_left: bool) -> Vec<i16> {
    deliveries
        .iter()
        .filter(|d| d.from_left == from_left)
        .filter_map(|d| d.value())
        .collect()
}

proptest! {
    #[test]
    fn zip_survives_reactivation(steps in steps()) {
        let (left, right) = sources();
        let zipped = left.zip(&right);
        let seen = drive(&left, &right, &zipped, &steps);

        let delivered = deliveries(&steps);
        let expected: Vec<(i16, i16)> =
            side(&delivered, true).into_iter().zip(side(&delivered, false)).collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn combine_latest_survives_reactivation(steps in steps()) {
        let (left, right) = sources();
        let combined = left.combine_latest(&right);
        let seen = drive(&left, &right, &combined, &steps);

        let (mut left_seen, mut right_seen) = (false, false);
        let mut expected = Vec::new();
        for d in deliveries(&steps) {
            if d.from_left {
                left_seen = true;
            } else {
                right_seen = true;
            }
            if let (true, true, Some(a), Some(b)) = (left_seen, right_seen, d.left, d.right) {
                expected.push((a, b));
            }
        }
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn with_latest_from_survives_reactivation(steps in steps()) {
        let (primary, secondary) = sources();
        let paired = primary.with_latest_from(&secondary);
        let seen = drive(&primary, &secondary, &paired, &steps);

        let mut secondary_seen = false;
        let mut expected = Vec::new();
        for d in deliveries(&steps) {
            if !d.from_left {
                secondary_seen = true;
                continue;
            }
            if let (true, Some(a), Some(b)) = (secondary_seen, d.left, d.right) {
                expected.push((a, b));
            }
        }
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn skip_and_take_survive_reactivation(steps in steps(), n in 0usize..10) {
        let (source, unused) = sources();
        let skipped = drive(&source, &unused, &source.skip(n), &steps);
        let (source, unused) = sources();
        let taken = drive(&source, &unused, &source.take(n), &steps);

        let delivered = side(&deliveries(&steps), true);
        let split = n.min(delivered.len());
        prop_assert_eq!(taken, delivered[..split].to_vec());
        prop_assert_eq!(skipped, delivered[split..].to_vec());
    }

    #[test]
    fn zip_with_next_survives_reactivation(steps in steps()) {
        let (source, unused) = sources();
        let pairs = source.zip_with_next();
        let seen = drive(&source, &unused, &pairs, &steps);

        let delivered = side(&deliveries(&steps), true);
        let expected: Vec<(i16, i16)> = delivered.windows(2).map(|w| (w[0], w[1])).collect();
        prop_assert_eq!(seen, expected);
    }
}
