//! Terminal states of a future.

use core::fmt;

use crate::error::{Error, Result};
use crate::types::CancelReason;

/// The terminal outcome of a [`crate::Future`].
///
/// A pending future has no outcome; once one is written it never changes.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The command produced a value.
    Ok(T),
    /// The command failed (error or panic).
    Failed(Error),
    /// The future was interrupted before a value arrived.
    Interrupted(CancelReason),
}

impl<T> Outcome<T> {
    /// Returns true for a successful outcome.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns true for a failed outcome.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true for an interrupted outcome.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    /// Converts to a `Result`; interruption maps to
    /// [`crate::ErrorKind::Interrupted`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Failed(e) => Err(e),
            Self::Interrupted(reason) => Err(Error::interrupted(&reason)),
        }
    }

    /// Maps the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ok(v) => Outcome::Ok(f(v)),
            Self::Failed(e) => Outcome::Failed(e),
            Self::Interrupted(r) => Outcome::Interrupted(r),
        }
    }

    /// Borrows the outcome.
    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Self::Ok(v) => Outcome::Ok(v),
            Self::Failed(e) => Outcome::Failed(e.clone()),
            Self::Interrupted(r) => Outcome::Interrupted(r.clone()),
        }
    }
}

impl<T> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(_) => write!(f, "ok"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Interrupted(r) => write!(f, "interrupted: {r}"),
        }
    }
}
