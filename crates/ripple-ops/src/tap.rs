#![forbid(unsafe_code)]

//! Side-effect taps: activation listeners and per-value callbacks.
//!
//! `do_on_active` and `do_on_inactive` return a pass-through observable that
//! carries [`ActivityHooks`](ripple_core::ActivityHooks). Calling either on an
//! observable that already carries hooks adds to them instead of wrapping
//! again, so a chain such as
//!
//! ```ignore
//! source.do_on_active(a).do_on_inactive(b).do_on_active(c)
//! ```
//!
//! yields one observable whose active listeners run `a` then `c`. Hooks run
//! after the pass-through has attached to its source, so an active hook sees
//! the source already bound.

use ripple_core::Observable;

use crate::relay;

/// Activation and value taps.
pub trait TapExt<T> {
    /// Run `on_active` whenever the result gains its first active observer.
    fn do_on_active(&self, on_active: impl Fn() + 'static) -> Observable<T>;

    /// Run `on_inactive` whenever the result loses its last active observer.
    fn do_on_inactive(&self, on_inactive: impl Fn() + 'static) -> Observable<T>;

    /// Forward every value, then run `on_changed` with it.
    fn do_on_changed(&self, on_changed: impl Fn(&T) + 'static) -> Observable<T>;
}

/// `source` itself if it already carries hooks, otherwise a fresh pass-through.
fn tap_target<T: Clone + 'static>(source: &Observable<T>) -> Observable<T> {
    if source.activity_hooks().is_some() {
        return source.clone();
    }
    relay(source, |out, value: &T| out.set(value.clone()))
}

impl<T: Clone + 'static> TapExt<T> for Observable<T> {
    fn do_on_active(&self, on_active: impl Fn() + 'static) -> Observable<T> {
        let target = tap_target(self);
        target.install_activity_hooks().push_on_active(on_active);
        target
    }

    fn do_on_inactive(&self, on_inactive: impl Fn() + 'static) -> Observable<T> {
        let target = tap_target(self);
        target.install_activity_hooks().push_on_inactive(on_inactive);
        target
    }

    fn do_on_changed(&self, on_changed: impl Fn(&T) + 'static) -> Observable<T> {
        relay(self, move |out, value: &T| {
            out.set(value.clone());
            on_changed(value);
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::testing::{Recorder, push_all};

    fn journal() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let note = move |entry: &str| -> Box<dyn Fn()> {
            let sink = Rc::clone(&sink);
            let entry = entry.to_owned();
            Box::new(move || sink.borrow_mut().push(entry.clone()))
        };
        (log, note)
    }

    #[test]
    fn active_and_inactive_fire_on_edges_only() {
        let (log, note) = journal();
        let source = Observable::with_value(1);
        let tapped = source
            .do_on_active(note("active"))
            .do_on_inactive(note("inactive"));

        let first = Recorder::attach(&tapped);
        let second = Recorder::attach(&tapped);
        drop(first);
        assert_eq!(*log.borrow(), vec!["active"]);

        drop(second);
        assert_eq!(*log.borrow(), vec!["active", "inactive"]);
    }

    #[test]
    fn chained_taps_share_one_observable_in_registration_order() {
        let (log, note) = journal();
        let source = Observable::with_value(1);
        let once = source.do_on_active(note("a"));
        let twice = once.do_on_active(note("b"));
        assert!(once.ptr_eq(&twice));

        let rec = Recorder::attach(&twice);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(rec.take(), vec![1]);
        assert_eq!(source.observer_count(), 1);
    }

    #[test]
    fn active_hook_runs_after_source_is_bound() {
        let source = Observable::with_value(1);
        let bound = Rc::new(RefCell::new(None));
        let (probe, seen) = (source.clone(), Rc::clone(&bound));
        let tapped = source.do_on_active(move || {
            seen.replace(Some(probe.has_observers()));
        });

        let _rec = Recorder::attach(&tapped);
        assert_eq!(*bound.borrow(), Some(true));
    }

    #[test]
    fn taps_never_touch_the_receiver_hooks_of_a_plain_observable() {
        let source: Observable<i32> = Observable::new();
        let _tapped = source.do_on_inactive(|| {});
        assert!(source.activity_hooks().is_none());
    }

    #[test]
    fn do_on_changed_forwards_then_runs_side_effect() {
        let source: Observable<i32> = Observable::new();
        let effects = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&effects);
        let tapped = source.do_on_changed(move |v| sink.borrow_mut().push(*v));
        let rec = Recorder::attach(&tapped);

        push_all(&source, &[1, 2]);
        assert_eq!(rec.take(), vec![1, 2]);
        assert_eq!(*effects.borrow(), vec![1, 2]);
    }
}
