//! Identifier types.
//!
//! All identifiers are allocated from process-wide monotonic counters, so
//! two bridges never hand out the same id and ids order by creation.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Allocates the next identifier.
            #[must_use]
            pub(crate) fn next() -> Self {
                static NEXT: AtomicU64 = AtomicU64::new(1);
                Self(NEXT.fetch_add(1, Ordering::Relaxed))
            }

            /// Returns the raw numeric value.
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// Creates an identifier with a fixed value for tests.
            #[doc(hidden)]
            #[must_use]
            pub const fn new_for_test(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies one command submitted to the bridge.
    CommandId,
    "C"
);

define_id!(
    /// Identifies a future (shared by all clones of it).
    FutureId,
    "F"
);

define_id!(
    /// Identifies a worker thread spawned through the bridge.
    WorkerId,
    "W"
);

define_id!(
    /// Identifies a captured host frame.
    FrameId,
    "R"
);
