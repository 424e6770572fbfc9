//! Logging macros for operation lifecycles, backed by `tracing` when the `tracing` feature is
//! enabled and compiled away otherwise.
//!
//! Import from here rather than from `tracing` so that call sites need no `#[cfg]`. The
//! `#[instrument]` attribute is the exception and is written as
//! `#[cfg_attr(feature = "tracing", tracing::instrument)]`.

#![allow(unused_imports, unused_macros, dead_code)]

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, debug_span, error, trace, warn};
#[cfg(feature = "tracing")]
pub(crate) use tracing_futures::Instrument;

#[cfg(not(feature = "tracing"))]
macro_rules! event {
    ($($x:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! event_span {
    ($($x:tt)*) => {
        ()
    };
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {
    event as debug, event as error, event as trace, event as warn, event_span as debug_span,
};

/// Stand-in for `tracing_futures::Instrument` that leaves the future untouched.
#[cfg(not(feature = "tracing"))]
pub(crate) trait Instrument: Sized {
    fn instrument(self, span: ()) -> Self;
}

#[cfg(not(feature = "tracing"))]
impl<T> Instrument for T {
    fn instrument(self, _: ()) -> Self {
        self
    }
}
