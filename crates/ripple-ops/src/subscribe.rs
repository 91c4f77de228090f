#![forbid(unsafe_code)]

//! Subscription entry points.
//!
//! Thin, owner-aware spellings of the registration methods on
//! [`Observable`]. The scoped variants accept anything implementing
//! [`LifecycleOwner`], so a screen or controller type can be passed directly.
//!
//! | Method                     | Gated by lifecycle | Cached value delivered |
//! |----------------------------|--------------------|------------------------|
//! | `subscribe`                | no                 | yes                    |
//! | `subscribe_changes`        | no                 | no                     |
//! | `subscribe_scoped`         | yes                | yes, on activation     |
//! | `subscribe_changes_scoped` | yes                | no                     |

use ripple_core::{LifecycleOwner, Observable, Subscription};

pub trait SubscribeExt<T> {
    /// Observe every value, starting with the cached one.
    fn subscribe(&self, on_value: impl Fn(&T) + 'static) -> Subscription;

    /// Observe only values set after this call.
    fn subscribe_changes(&self, on_value: impl Fn(&T) + 'static) -> Subscription;

    /// Observe while `owner`'s lifecycle is active; removed on destroy.
    fn subscribe_scoped<O>(&self, owner: &O, on_value: impl Fn(&T) + 'static) -> Subscription
    where
        O: LifecycleOwner + ?Sized;

    /// [`subscribe_scoped`](Self::subscribe_scoped) that skips the value
    /// cached at registration time.
    fn subscribe_changes_scoped<O>(
        &self,
        owner: &O,
        on_value: impl Fn(&T) + 'static,
    ) -> Subscription
    where
        O: LifecycleOwner + ?Sized;
}

impl<T: Clone + 'static> SubscribeExt<T> for Observable<T> {
    fn subscribe(&self, on_value: impl Fn(&T) + 'static) -> Subscription {
        self.observe_forever(on_value)
    }

    fn subscribe_changes(&self, on_value: impl Fn(&T) + 'static) -> Subscription {
        self.observe_forever_changes(on_value)
    }

    fn subscribe_scoped<O>(&self, owner: &O, on_value: impl Fn(&T) + 'static) -> Subscription
    where
        O: LifecycleOwner + ?Sized,
    {
        self.observe(owner.lifecycle(), on_value)
    }

    fn subscribe_changes_scoped<O>(
        &self,
        owner: &O,
        on_value: impl Fn(&T) + 'static,
    ) -> Subscription
    where
        O: LifecycleOwner + ?Sized,
    {
        self.observe_changes(owner.lifecycle(), on_value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
