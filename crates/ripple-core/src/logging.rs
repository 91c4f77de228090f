#![forbid(unsafe_code)]

//! Logging shim.
//!
//! With the `tracing` feature enabled this module re-exports the `tracing`
//! event macros. Without it the same names resolve to macros that expand to
//! an empty block, so call sites never need their own `cfg` gates.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
mod noop {
    #[doc(hidden)]
    #[macro_export]
    macro_rules! __ripple_noop_log {
        ($($arg:tt)*) => {{}};
    }
}

#[cfg(not(feature = "tracing"))]
pub use crate::{
    __ripple_noop_log as debug, __ripple_noop_log as trace, __ripple_noop_log as warn,
};
