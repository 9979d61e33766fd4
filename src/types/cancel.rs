//! Interruption reasons.
//!
//! Interruption is cooperative: a reason is attached to a future or abort
//! token, and whoever is blocked on it (or checks it next) unwinds with
//! [`crate::ErrorKind::Interrupted`].

use core::fmt;

/// The kind of interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelKind {
    /// Explicit interruption requested by user code.
    User,
    /// The bridge was reset; all pending work of the old generation is void.
    Reset,
    /// The producer belongs to a generation that a reset already retired.
    StaleGeneration,
    /// The write half of a future was dropped without resolving it.
    Abandoned,
    /// The bridge is shutting down.
    Shutdown,
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Reset => write!(f, "reset"),
            Self::StaleGeneration => write!(f, "stale generation"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The reason for an interruption, with an optional static message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CancelReason {
    /// The kind of interruption.
    pub kind: CancelKind,
    /// Optional human-readable detail.
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a reason of the given kind without a message.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user interruption with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// Creates the reason used by `Bridge::reset`.
    #[must_use]
    pub const fn reset() -> Self {
        Self::new(CancelKind::Reset)
    }

    /// Creates the reason for a producer from a retired generation.
    #[must_use]
    pub const fn stale_generation() -> Self {
        Self::new(CancelKind::StaleGeneration)
    }

    /// Creates the reason for a dropped resolver.
    #[must_use]
    pub const fn abandoned() -> Self {
        Self::new(CancelKind::Abandoned)
    }

    /// Creates a shutdown reason.
    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new(CancelKind::Shutdown)
    }

    /// Attaches a static message.
    #[must_use]
    pub const fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    /// Returns true if this reason came from a reset.
    #[must_use]
    pub const fn is_reset(&self) -> bool {
        matches!(self.kind, CancelKind::Reset)
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::User)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}
