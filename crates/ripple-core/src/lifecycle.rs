#![forbid(unsafe_code)]

//! External activity-state signal that gates scoped observers.
//!
//! A [`Lifecycle`] moves through the ordered [`LifecycleState`]s and notifies
//! registered listeners synchronously on every transition. Observers bound to
//! a lifecycle receive values only while it is at least
//! [`LifecycleState::Started`], and are removed once it reaches
//! [`LifecycleState::Destroyed`].
//!
//! # Invariants
//!
//! 1. `Destroyed` is terminal: once reached, every further transition is
//!    ignored.
//! 2. Listeners are notified in registration order.
//! 3. A listener removed during a notification pass is not called for the
//!    remainder of that pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::logging::{trace, warn};

/// Ordered activity states. `Destroyed` sorts lowest so that
/// [`is_at_least`](Self::is_at_least) is a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Terminal state; bound observers are removed.
    Destroyed,
    /// Constructed but not yet created.
    Initialized,
    /// Created, or stopped after having been started.
    Created,
    /// Visible; bound observers are active from here upward.
    Started,
    /// In the foreground.
    Resumed,
}

impl LifecycleState {
    /// Whether this state is `other` or later.
    #[inline]
    #[must_use]
    pub fn is_at_least(self, other: LifecycleState) -> bool {
        self >= other
    }

    /// Whether bound observers should receive values in this state.
    #[inline]
    #[must_use]
    pub fn is_active(self) -> bool {
        self.is_at_least(LifecycleState::Started)
    }
}

/// Events that drive a [`Lifecycle`] between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Create,
    Start,
    Resume,
    Pause,
    Stop,
    Destroy,
}

impl LifecycleEvent {
    /// The state a lifecycle is in right after this event.
    #[must_use]
    pub const fn target_state(self) -> LifecycleState {
        match self {
            Self::Create | Self::Stop => LifecycleState::Created,
            Self::Start | Self::Pause => LifecycleState::Started,
            Self::Resume => LifecycleState::Resumed,
            Self::Destroy => LifecycleState::Destroyed,
        }
    }
}

/// Handle for a registered lifecycle listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(LifecycleState)>;

struct LifecycleInner {
    state: Cell<LifecycleState>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
}

/// Shared, single-threaded lifecycle state machine.
///
/// Cloning a `Lifecycle` creates a new handle to the **same** state.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Rc<LifecycleInner>,
}

impl Lifecycle {
    /// Create a lifecycle in [`LifecycleState::Initialized`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(LifecycleState::Initialized)
    }

    /// Create a lifecycle starting at `state`.
    #[must_use]
    pub fn with_state(state: LifecycleState) -> Self {
        Self {
            inner: Rc::new(LifecycleInner {
                state: Cell::new(state),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(1),
            }),
        }
    }

    /// The current state.
    #[inline]
    #[must_use]
    pub fn current_state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    /// Whether the lifecycle has reached its terminal state.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.current_state() == LifecycleState::Destroyed
    }

    /// Move to `state`, notifying listeners if it differs from the current one.
    ///
    /// Transitions out of [`LifecycleState::Destroyed`] are ignored.
    pub fn set_state(&self, state: LifecycleState) {
        let current = self.inner.state.get();
        if current == state {
            return;
        }
        if current == LifecycleState::Destroyed {
            warn!(?state, "ignoring transition of a destroyed lifecycle");
            return;
        }
        trace!(from = ?current, to = ?state, "lifecycle transition");
        self.inner.state.set(state);

        let snapshot: Vec<(ListenerId, Listener)> = self.inner.listeners.borrow().clone();
        for (id, listener) in snapshot {
            if self.is_registered(id) {
                listener(state);
            }
        }
    }

    /// Apply `event`, moving to its [`target_state`](LifecycleEvent::target_state).
    pub fn handle_event(&self, event: LifecycleEvent) {
        self.set_state(event.target_state());
    }

    /// Register a listener called with the new state after every transition.
    pub fn add_listener(&self, listener: impl Fn(LifecycleState) + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn is_registered(&self, id: ListenerId) -> bool {
        self.inner
            .listeners
            .borrow()
            .iter()
            .any(|(existing, _)| *existing == id)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.current_state())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Anything that exposes a [`Lifecycle`] scope.
pub trait LifecycleOwner {
    fn lifecycle(&self) -> &Lifecycle;
}

impl LifecycleOwner for Lifecycle {
    fn lifecycle(&self) -> &Lifecycle {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
