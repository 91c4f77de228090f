#![forbid(unsafe_code)]

//! RAII handle for an observer registration.

use std::cell::RefCell;
use std::fmt;

type Cancel = Box<dyn FnOnce()>;

/// Guard returned by every observer registration.
///
/// The registration stays in place until [`unsubscribe`](Self::unsubscribe)
/// is called or the guard is dropped, whichever happens first. Both are
/// idempotent.
#[must_use = "dropping a Subscription removes its observer immediately"]
pub struct Subscription {
    cancel: RefCell<Option<Cancel>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// A subscription that never held a registration, e.g. one made against
    /// an already destroyed lifecycle.
    pub(crate) fn inert() -> Self {
        Self {
            cancel: RefCell::new(None),
        }
    }

    /// Remove the observer. Later calls do nothing.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether this handle still holds a registration.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.get_mut().take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
