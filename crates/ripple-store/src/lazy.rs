#![forbid(unsafe_code)]

//! Explicit lazily-initialised accessors.

use std::cell::OnceCell;
use std::fmt;

/// A value computed by its provider on first [`get`](Self::get) and cached
/// for the life of the accessor.
pub struct LazyValue<T> {
    cell: OnceCell<T>,
    provide: Box<dyn Fn() -> T>,
}

impl<T> LazyValue<T> {
    pub fn new(provide: impl Fn() -> T + 'static) -> Self {
        Self {
            cell: OnceCell::new(),
            provide: Box::new(provide),
        }
    }

    /// The cached value, computing it first if needed.
    pub fn get(&self) -> &T {
        self.cell.get_or_init(|| (self.provide)())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Drop the cached value; the next `get` calls the provider again.
    pub fn reset(&mut self) -> Option<T> {
        self.cell.take()
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyValue")
            .field("value", &self.cell.get())
            .finish()
    }
}
