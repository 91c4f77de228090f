#![forbid(unsafe_code)]

//! Single-slot observable values with revision tracking.
//!
//! # Design
//!
//! [`Observable<T>`] is a cheap-clone handle to shared, single-threaded
//! storage holding at most one current value, a revision counter, and the
//! ordered list of registered observers. Every [`set`](Observable::set)
//! bumps the revision and synchronously notifies the active observers before
//! returning.
//!
//! Each observer remembers the last revision it was handed. A value is
//! delivered to an observer at most once per revision, which is also how
//! "changes only" registrations work: they start out having already seen the
//! revision current at registration time.
//!
//! Observers bound to a [`Lifecycle`] are active only while it is at least
//! `Started`; when it is destroyed they are removed. When the number of active
//! observers goes from zero to one (or one to zero) the registered
//! [`ActivationListener`]s fire; [`Mediator`](crate::Mediator) uses this to
//! attach to and detach from its upstream sources.
//!
//! # Invariants
//!
//! 1. The revision increments by exactly 1 per `set`.
//! 2. Observers are notified in registration order.
//! 3. An observer never receives the same revision twice.
//! 4. A `set` issued while a dispatch of the same observable is in flight does
//!    not recurse: the in-flight pass is restarted so every observer ends on
//!    the newest value.
//!
//! # Failure Modes
//!
//! - **Callback panics**: the in-flight dispatch is abandoned. Dispatch and
//!   activation flags are reset by drop guards, so later `set` calls still
//!   notify normally.
//! - **Borrow inside [`with`](Observable::with)**: calling `set` from inside
//!   the `with` closure panics (re-entrant borrow).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::lifecycle::{Lifecycle, LifecycleState, ListenerId};
use crate::logging::trace;
use crate::subscription::Subscription;

/// Revision of an observable that has never held a value.
pub const START_VERSION: u64 = 0;

/// Shared observer callback.
pub type Callback<T> = Rc<dyn Fn(&T)>;

/// Hooks fired when an observable gains its first active observer or loses
/// its last one.
pub trait ActivationListener {
    fn on_active(&self);
    fn on_inactive(&self);
}

/// Ordered user callbacks for activation transitions.
///
/// Installed at most once per observable via
/// [`Observable::install_activity_hooks`].
#[derive(Default)]
pub struct ActivityHooks {
    on_active: RefCell<Vec<Rc<dyn Fn()>>>,
    on_inactive: RefCell<Vec<Rc<dyn Fn()>>>,
}

impl ActivityHooks {
    /// Append a callback for the inactive → active transition.
    pub fn push_on_active(&self, hook: impl Fn() + 'static) {
        self.on_active.borrow_mut().push(Rc::new(hook));
    }

    /// Append a callback for the active → inactive transition.
    pub fn push_on_inactive(&self, hook: impl Fn() + 'static) {
        self.on_inactive.borrow_mut().push(Rc::new(hook));
    }

    fn run(hooks: &RefCell<Vec<Rc<dyn Fn()>>>) {
        let snapshot: Vec<Rc<dyn Fn()>> = hooks.borrow().clone();
        for hook in snapshot {
            hook();
        }
    }
}

impl ActivationListener for ActivityHooks {
    fn on_active(&self) {
        Self::run(&self.on_active);
    }

    fn on_inactive(&self) {
        Self::run(&self.on_inactive);
    }
}

/// Lifecycle binding of a scoped observer.
struct Gate {
    lifecycle: Lifecycle,
    listener: Cell<Option<ListenerId>>,
}

struct ObserverSlot<T> {
    id: u64,
    callback: Callback<T>,
    last_version: Cell<u64>,
    active: Cell<bool>,
    removed: Cell<bool>,
    gate: Option<Gate>,
}

impl<T> ObserverSlot<T> {
    fn should_be_active(&self) -> bool {
        self.gate
            .as_ref()
            .is_none_or(|gate| gate.lifecycle.current_state().is_active())
    }
}

/// Resets a flag when dropped, including during unwinding.
struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct Inner<T> {
    value: RefCell<Option<T>>,
    version: Cell<u64>,
    observers: RefCell<Vec<Rc<ObserverSlot<T>>>>,
    next_observer: Cell<u64>,
    active_count: Cell<usize>,
    activation: RefCell<Vec<Rc<dyn ActivationListener>>>,
    hooks: RefCell<Option<Rc<ActivityHooks>>>,
    dispatching: Cell<bool>,
    dispatch_invalidated: Cell<bool>,
    changing_active: Cell<bool>,
}

/// A shared, revision-tracked value with synchronous change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** slot.
pub struct Observable<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("observers", &self.inner.observers.borrow().len())
            .field("active", &self.inner.active_count.get())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Observable<T> {
    fn from_parts(value: Option<T>, version: u64) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                version: Cell::new(version),
                observers: RefCell::new(Vec::new()),
                next_observer: Cell::new(1),
                active_count: Cell::new(0),
                activation: RefCell::new(Vec::new()),
                hooks: RefCell::new(None),
                dispatching: Cell::new(false),
                dispatch_invalidated: Cell::new(false),
                changing_active: Cell::new(false),
            }),
        }
    }

    /// Current revision. [`START_VERSION`] until the first value is set.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Whether a value has ever been set.
    #[inline]
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Whether any observer (active or not) is registered.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        !self.inner.observers.borrow().is_empty()
    }

    /// Whether at least one registered observer is active.
    #[inline]
    #[must_use]
    pub fn has_active_observers(&self) -> bool {
        self.inner.active_count.get() > 0
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    /// Number of active observers.
    #[must_use]
    pub fn active_observer_count(&self) -> usize {
        self.inner.active_count.get()
    }

    /// Whether both handles point at the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Type-erased identity of the slot, stable for its lifetime.
    #[must_use]
    pub fn addr(&self) -> *const () {
        Rc::as_ptr(&self.inner).cast()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure calls [`set`](Self::set) on the same observable.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.value.borrow().as_ref())
    }

    /// Register a listener for activation transitions.
    pub fn add_activation_listener(&self, listener: Rc<dyn ActivationListener>) {
        self.inner.activation.borrow_mut().push(listener);
    }

    /// The activity hooks installed on this observable, if any.
    #[must_use]
    pub fn activity_hooks(&self) -> Option<Rc<ActivityHooks>> {
        self.inner.hooks.borrow().clone()
    }

    /// Install activity hooks on this observable, or return the existing ones.
    pub fn install_activity_hooks(&self) -> Rc<ActivityHooks> {
        if let Some(hooks) = self.activity_hooks() {
            return hooks;
        }
        let hooks = Rc::new(ActivityHooks::default());
        *self.inner.hooks.borrow_mut() = Some(Rc::clone(&hooks));
        self.add_activation_listener(hooks.clone());
        hooks
    }

    /// Non-owning handle, for callbacks that must not keep this slot alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakObservable<T> {
        WeakObservable {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create an observable with no value.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(None, START_VERSION)
    }

    /// Create an observable already holding `value` at revision 1.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self::from_parts(Some(value), START_VERSION + 1)
    }

    /// Clone of the current value, if any.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    /// Replace the value, bump the revision, and notify active observers.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = Some(value);
        self.inner.version.set(self.inner.version.get() + 1);
        self.dispatch(None);
    }

    /// Register an observer that is always active.
    ///
    /// The current value, if any, is delivered before this returns.
    pub fn observe_forever(&self, observer: impl Fn(&T) + 'static) -> Subscription {
        self.attach(Rc::new(observer), None, false)
    }

    /// Register an always-active observer that only sees values set after
    /// this call.
    pub fn observe_forever_changes(&self, observer: impl Fn(&T) + 'static) -> Subscription {
        self.attach(Rc::new(observer), None, true)
    }

    /// Register an observer gated by `lifecycle`.
    ///
    /// Values are delivered only while the lifecycle is at least `Started`;
    /// on becoming active the observer receives the cached value if it has
    /// not seen it yet. The observer is removed when the lifecycle is
    /// destroyed. Registering against a destroyed lifecycle does nothing.
    pub fn observe(&self, lifecycle: &Lifecycle, observer: impl Fn(&T) + 'static) -> Subscription {
        self.attach(Rc::new(observer), Some(lifecycle), false)
    }

    /// Lifecycle-gated variant of [`observe_forever_changes`](Self::observe_forever_changes).
    pub fn observe_changes(
        &self,
        lifecycle: &Lifecycle,
        observer: impl Fn(&T) + 'static,
    ) -> Subscription {
        self.attach(Rc::new(observer), Some(lifecycle), true)
    }

    /// Register a shared callback. Shared by every public registration path.
    pub fn attach(
        &self,
        callback: Callback<T>,
        lifecycle: Option<&Lifecycle>,
        changes_only: bool,
    ) -> Subscription {
        let start = if changes_only {
            self.version()
        } else {
            START_VERSION
        };
        self.attach_after(callback, lifecycle, start)
    }

    /// Register a callback that has already seen every revision up to and
    /// including `seen`.
    pub(crate) fn attach_after(
        &self,
        callback: Callback<T>,
        lifecycle: Option<&Lifecycle>,
        seen: u64,
    ) -> Subscription {
        if lifecycle.is_some_and(Lifecycle::is_destroyed) {
            trace!("observer registered against a destroyed lifecycle ignored");
            return Subscription::inert();
        }

        let id = self.inner.next_observer.get();
        self.inner.next_observer.set(id + 1);
        let slot = Rc::new(ObserverSlot {
            id,
            callback,
            last_version: Cell::new(seen),
            active: Cell::new(false),
            removed: Cell::new(false),
            gate: lifecycle.map(|lifecycle| Gate {
                lifecycle: lifecycle.clone(),
                listener: Cell::new(None),
            }),
        });
        self.inner.observers.borrow_mut().push(Rc::clone(&slot));

        if let Some(gate) = &slot.gate {
            let weak_self = self.downgrade();
            let weak_slot = Rc::downgrade(&slot);
            let listener = gate.lifecycle.add_listener(move |state| {
                let (Some(this), Some(slot)) = (weak_self.upgrade(), weak_slot.upgrade()) else {
                    return;
                };
                if state == LifecycleState::Destroyed {
                    this.remove_observer(slot.id);
                } else {
                    this.active_state_changed(&slot, slot.should_be_active());
                }
            });
            gate.listener.set(Some(listener));
        }

        self.active_state_changed(&slot, slot.should_be_active());

        let this = self.clone();
        Subscription::new(move || this.remove_observer(id))
    }

    fn remove_observer(&self, id: u64) {
        let removed = {
            let mut observers = self.inner.observers.borrow_mut();
            observers
                .iter()
                .position(|slot| slot.id == id)
                .map(|index| observers.remove(index))
        };
        let Some(slot) = removed else {
            return;
        };
        if let Some(gate) = &slot.gate {
            if let Some(listener) = gate.listener.take() {
                gate.lifecycle.remove_listener(listener);
            }
        }
        self.active_state_changed(&slot, false);
        slot.removed.set(true);
    }

    fn active_state_changed(&self, slot: &Rc<ObserverSlot<T>>, active: bool) {
        if slot.removed.get() || slot.active.get() == active {
            return;
        }
        slot.active.set(active);
        self.change_active_counter(active);
        if active {
            self.dispatch(Some(Rc::clone(slot)));
        }
    }

    fn change_active_counter(&self, increment: bool) {
        let mut previous = self.inner.active_count.get();
        let updated = if increment {
            previous + 1
        } else {
            previous.saturating_sub(1)
        };
        self.inner.active_count.set(updated);
        if self.inner.changing_active.get() {
            return;
        }

        let _guard = FlagGuard::raise(&self.inner.changing_active);
        loop {
            let current = self.inner.active_count.get();
            if previous == current {
                break;
            }
            let became_active = previous == 0 && current > 0;
            let became_inactive = previous > 0 && current == 0;
            previous = current;

            let listeners: Vec<Rc<dyn ActivationListener>> =
                self.inner.activation.borrow().clone();
            if became_active {
                trace!(addr = ?self.addr(), "observable active");
                for listener in &listeners {
                    listener.on_active();
                }
            } else if became_inactive {
                trace!(addr = ?self.addr(), "observable inactive");
                for listener in &listeners {
                    listener.on_inactive();
                }
            }
        }
    }

    fn dispatch(&self, initiator: Option<Rc<ObserverSlot<T>>>) {
        if self.inner.dispatching.get() {
            self.inner.dispatch_invalidated.set(true);
            return;
        }
        let _guard = FlagGuard::raise(&self.inner.dispatching);
        let mut initiator = initiator;
        loop {
            self.inner.dispatch_invalidated.set(false);
            if let Some(slot) = initiator.take() {
                self.consider_notify(&slot);
            } else {
                let snapshot: Vec<Rc<ObserverSlot<T>>> = self.inner.observers.borrow().clone();
                for slot in &snapshot {
                    self.consider_notify(slot);
                    if self.inner.dispatch_invalidated.get() {
                        break;
                    }
                }
            }
            if !self.inner.dispatch_invalidated.get() {
                break;
            }
        }
    }

    fn consider_notify(&self, slot: &Rc<ObserverSlot<T>>) {
        if slot.removed.get() || !slot.active.get() {
            return;
        }
        if !slot.should_be_active() {
            self.active_state_changed(slot, false);
            return;
        }
        let version = self.inner.version.get();
        if slot.last_version.get() >= version {
            return;
        }
        slot.last_version.set(version);
        let value = self.inner.value.borrow().clone();
        if let Some(value) = value {
            (slot.callback)(&value);
        }
    }
}

/// Weak counterpart of [`Observable`].
pub struct WeakObservable<T> {
    inner: Weak<Inner<T>>,
}

impl<T> WeakObservable<T> {
    /// Recover the observable if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Observable<T>> {
        self.inner.upgrade().map(|inner| Observable { inner })
    }
}

impl<T> Clone for WeakObservable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
