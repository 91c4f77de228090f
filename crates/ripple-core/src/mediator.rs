#![forbid(unsafe_code)]

//! Observables derived from other observables.
//!
//! A [`Mediator<T>`] owns an output [`Observable<T>`] and a list of upstream
//! source links. Each link pairs a source with the callback that turns the
//! source's values into output updates.
//!
//! # Activation
//!
//! ```text
//! INACTIVE --(first active observer)--> ACTIVE   plug every link
//! ACTIVE   --(last active observer)---> INACTIVE unplug every link
//! ```
//!
//! A plugged link is an `observe_forever` registration on its source; an
//! unplugged link holds nothing. Links are plugged in the order they were
//! added. The mediator starts INACTIVE.
//!
//! Each link remembers the last source revision it delivered. Re-plugging
//! delivers the source's value only if it changed while the link was
//! unplugged, so stateful operators never count the same value twice.
//!
//! # Ownership
//!
//! The output keeps its links (and therefore its sources) alive. Source
//! callbacks should reach back to the mediator through a [`WeakMediator`] so
//! that a plugged source does not keep an abandoned mediator alive.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Add;
use std::rc::{Rc, Weak};

use crate::logging::debug;
use crate::observable::{ActivationListener, Callback, Observable, START_VERSION, WeakObservable};
use crate::subscription::Subscription;

trait SourceLink {
    fn source_addr(&self) -> *const ();
    fn plug(&self);
    fn unplug(&self);
    fn mark_removed(&self);
}

struct Link<S> {
    source: Observable<S>,
    callback: Callback<S>,
    delivered: Rc<Cell<u64>>,
    subscription: RefCell<Option<Subscription>>,
    removed: Cell<bool>,
}

impl<S: Clone + 'static> Link<S> {
    fn new(source: &Observable<S>, on_value: Callback<S>) -> Self {
        let delivered = Rc::new(Cell::new(START_VERSION));
        let seen = Rc::clone(&delivered);
        let weak = source.downgrade();
        let callback: Callback<S> = Rc::new(move |value: &S| {
            if let Some(source) = weak.upgrade() {
                seen.set(source.version());
            }
            on_value(value);
        });
        Self {
            source: source.clone(),
            callback,
            delivered,
            subscription: RefCell::new(None),
            removed: Cell::new(false),
        }
    }
}

impl<S: Clone + 'static> SourceLink for Link<S> {
    fn source_addr(&self) -> *const () {
        self.source.addr()
    }

    fn plug(&self) {
        if self.removed.get() || self.subscription.borrow().is_some() {
            return;
        }
        // Registration delivers synchronously; the callback may remove this
        // very link before we get to store the subscription.
        let subscription = self
            .source
            .attach_after(Rc::clone(&self.callback), None, self.delivered.get());
        if self.removed.get() {
            subscription.unsubscribe();
        } else {
            *self.subscription.borrow_mut() = Some(subscription);
        }
    }

    fn unplug(&self) {
        let subscription = self.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    fn mark_removed(&self) {
        self.removed.set(true);
    }
}

#[derive(Default)]
struct Links {
    entries: RefCell<Vec<Rc<dyn SourceLink>>>,
}

impl Links {
    fn snapshot(&self) -> Vec<Rc<dyn SourceLink>> {
        self.entries.borrow().clone()
    }
}

impl ActivationListener for Links {
    fn on_active(&self) {
        for link in self.snapshot() {
            link.plug();
        }
    }

    fn on_inactive(&self) {
        for link in self.snapshot() {
            link.unplug();
        }
    }
}

/// An observable whose value is driven by callbacks on upstream sources.
///
/// Cloning a `Mediator` creates a new handle to the **same** output and links.
pub struct Mediator<T> {
    output: Observable<T>,
    links: Rc<Links>,
}

impl<T> Clone for Mediator<T> {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            links: Rc::clone(&self.links),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Mediator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("output", &self.output)
            .field("sources", &self.links.entries.borrow().len())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Mediator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Mediator<T> {
    /// Create a mediator with no sources and no value.
    #[must_use]
    pub fn new() -> Self {
        let output = Observable::new();
        let links = Rc::new(Links::default());
        output.add_activation_listener(links.clone());
        Self { output, links }
    }

    /// Bind `source`, forwarding each of its values to `on_value`.
    ///
    /// Returns `false` and changes nothing if `source` is already bound. If
    /// the mediator is active the source is plugged immediately.
    pub fn add_source<S: Clone + 'static>(
        &self,
        source: &Observable<S>,
        on_value: impl Fn(&S) + 'static,
    ) -> bool {
        self.add_source_shared(source, Rc::new(on_value))
    }

    /// [`add_source`](Self::add_source) with a callback that may be shared
    /// between several sources.
    pub fn add_source_shared<S: Clone + 'static>(
        &self,
        source: &Observable<S>,
        on_value: Callback<S>,
    ) -> bool {
        if self.position(source.addr()).is_some() {
            debug!(source = ?source.addr(), "source already bound to mediator");
            return false;
        }
        let link: Rc<dyn SourceLink> = Rc::new(Link::new(source, on_value));
        self.links.entries.borrow_mut().push(Rc::clone(&link));
        debug!(source = ?source.addr(), mediator = ?self.output.addr(), "source bound");
        if self.output.has_active_observers() {
            link.plug();
        }
        true
    }

    /// Unbind `source`. Safe to call from inside that source's own callback.
    ///
    /// Returns `false` if the source was not bound.
    pub fn remove_source<S: Clone + 'static>(&self, source: &Observable<S>) -> bool {
        let Some(index) = self.position(source.addr()) else {
            return false;
        };
        let link = self.links.entries.borrow_mut().remove(index);
        link.mark_removed();
        link.unplug();
        debug!(source = ?source.addr(), mediator = ?self.output.addr(), "source unbound");
        true
    }

    /// Number of bound sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.links.entries.borrow().len()
    }

    /// Whether `source` is currently bound.
    #[must_use]
    pub fn has_source<S>(&self, source: &Observable<S>) -> bool {
        self.position(source.addr()).is_some()
    }

    /// Set the output value.
    pub fn set(&self, value: T) {
        self.output.set(value);
    }

    /// The output observable.
    #[must_use]
    pub fn as_observable(&self) -> &Observable<T> {
        &self.output
    }

    /// Consume the mediator, keeping only its output.
    ///
    /// The links stay alive for as long as the output does.
    #[must_use]
    pub fn into_observable(self) -> Observable<T> {
        self.output
    }

    /// Non-owning handle for use inside source callbacks.
    #[must_use]
    pub fn downgrade(&self) -> WeakMediator<T> {
        WeakMediator {
            output: self.output.downgrade(),
            links: Rc::downgrade(&self.links),
        }
    }

    fn position(&self, addr: *const ()) -> Option<usize> {
        self.links
            .entries
            .borrow()
            .iter()
            .position(|link| link.source_addr() == addr)
    }
}

/// Weak counterpart of [`Mediator`].
pub struct WeakMediator<T> {
    output: WeakObservable<T>,
    links: Weak<Links>,
}

impl<T> Clone for WeakMediator<T> {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            links: Weak::clone(&self.links),
        }
    }
}

impl<T> WeakMediator<T> {
    /// Recover the mediator if its output is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Mediator<T>> {
        Some(Mediator {
            output: self.output.upgrade()?,
            links: self.links.upgrade()?,
        })
    }
}

/// Merge two observables: the result forwards every value from either side,
/// with no synchronisation between them.
impl<T: Clone + 'static> Add for &Observable<T> {
    type Output = Observable<T>;

    fn add(self, other: &Observable<T>) -> Observable<T> {
        let mediator = Mediator::new();
        let weak = mediator.downgrade();
        let forward: Callback<T> = Rc::new(move |value: &T| {
            if let Some(mediator) = weak.upgrade() {
                mediator.set(value.clone());
            }
        });
        mediator.add_source_shared(self, Rc::clone(&forward));
        mediator.add_source_shared(other, forward);
        mediator.into_observable()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
