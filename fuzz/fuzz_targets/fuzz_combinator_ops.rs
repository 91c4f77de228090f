#![no_main]

use std::cell::RefCell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ripple_core::{Lifecycle, LifecycleEvent, Observable, Subscription};
use ripple_ops::prelude::*;

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    SetLeft(u8),
    SetRight(u8),
    Observe,
    ObserveScoped,
    Drop(u8),
    Lifecycle(u8),
}

fn event(code: u8) -> LifecycleEvent {
    match code % 6 {
        0 => LifecycleEvent::Create,
        1 => LifecycleEvent::Start,
        2 => LifecycleEvent::Resume,
        3 => LifecycleEvent::Pause,
        4 => LifecycleEvent::Stop,
        _ => LifecycleEvent::Destroy,
    }
}

fuzz_target!(|ops: Vec<FuzzOp>| {
    let left: Observable<u8> = Observable::new();
    let right: Observable<u8> = Observable::new();
    let zipped = left.zip(&right);
    let latest = left.combine_latest(&right);
    let lifecycle = Lifecycle::new();

    // Every value the sources produced, for checking zip pairing.
    let (mut lefts, mut rights) = (Vec::new(), Vec::new());
    let pairs = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&pairs);
    let anchor = zipped.subscribe(move |pair: &(u8, u8)| sink.borrow_mut().push(*pair));

    let mut subs: Vec<Subscription> = Vec::new();
    for op in ops.into_iter().take(512) {
        match op {
            FuzzOp::SetLeft(v) => {
                lefts.push(v);
                left.set(v);
            }
            FuzzOp::SetRight(v) => {
                rights.push(v);
                right.set(v);
            }
            FuzzOp::Observe => subs.push(latest.subscribe(|_| {})),
            FuzzOp::ObserveScoped => subs.push(latest.subscribe_scoped(&lifecycle, |_| {})),
            FuzzOp::Drop(index) => {
                if !subs.is_empty() {
                    let index = usize::from(index) % subs.len();
                    subs.swap_remove(index);
                }
            }
            FuzzOp::Lifecycle(code) => lifecycle.handle_event(event(code)),
        }

        // zip is always attached; combine_latest only while it is active.
        let expected_links = 1 + usize::from(latest.has_active_observers());
        assert_eq!(right.observer_count(), expected_links);
    }

    let expected: Vec<(u8, u8)> = lefts.into_iter().zip(rights).collect();
    assert_eq!(*pairs.borrow(), expected);

    drop(subs);
    drop(anchor);
    assert!(!left.has_observers());
    assert!(!right.has_observers());
});
