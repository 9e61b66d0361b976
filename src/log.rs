//! Logging shim over `tracing`.
//!
//! With the `tracing` feature enabled (the default) this re-exports the
//! `tracing` macros. Without it the macros expand to nothing.

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, trace, warn};

#[cfg(not(feature = "tracing"))]
mod noop {
    macro_rules! noop_event {
        ($($arg:tt)*) => {};
    }

    pub(crate) use noop_event as debug;
    pub(crate) use noop_event as info;
    pub(crate) use noop_event as trace;
    pub(crate) use noop_event as warn;
}

#[cfg(not(feature = "tracing"))]
pub(crate) use noop::{debug, info, trace, warn};
