//! Logging macros used throughout the crate.
//!
//! With the default `tracing-integration` feature these are the `tracing`
//! macros. Without it every macro expands to nothing and spans become
//! [`NoopSpan`], so hosts that do not want a `tracing` dependency pay
//! nothing for the bridge's instrumentation.
//!
//! ```rust,ignore
//! use hostbridge::tracing_compat::{debug, warn};
//!
//! debug!(command = %id, label, "command executed");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, debug_span, error, info, trace, warn, Span};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    /// Discards its arguments.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// Discards its arguments.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// Discards its arguments.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// Discards its arguments.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// Discards its arguments.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    /// Evaluates to a [`NoopSpan`](crate::tracing_compat::NoopSpan).
    #[macro_export]
    macro_rules! debug_span {
        ($($arg:tt)*) => {
            $crate::tracing_compat::NoopSpan
        };
    }

    pub use crate::{debug, debug_span, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;

/// Stand-in for `tracing::Span` when tracing is compiled out.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug, Clone, Copy)]
pub struct NoopSpan;

#[cfg(not(feature = "tracing-integration"))]
impl NoopSpan {
    /// Returns a guard that does nothing.
    #[inline]
    #[must_use]
    pub fn enter(&self) -> NoopGuard {
        NoopGuard
    }
}

/// Guard returned by [`NoopSpan::enter`].
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug)]
pub struct NoopGuard;

/// `Span` resolves to [`NoopSpan`] when tracing is compiled out.
#[cfg(not(feature = "tracing-integration"))]
pub type Span = NoopSpan;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    #[test]
    fn logging_macros_compile_in_both_modes() {
        init_test_logging();
        crate::test_phase!("logging_macros_compile_in_both_modes");
        trace!(command = 1_u64, "trace with field");
        debug!(label = "get_pos", "debug with field");
        info!(generation = 2_u64, "info with field");
        warn!("warn message");
        error!(error = %"boom", "error with display field");
        crate::test_complete!("logging_macros_compile_in_both_modes");
    }

    #[test]
    fn span_enters() {
        init_test_logging();
        let span = debug_span!("tick", batch = 10_usize);
        let _guard = span.enter();
        crate::test_complete!("span_enters");
    }
}
