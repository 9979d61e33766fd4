//! Abort tokens.
//!
//! A token is a unit future with no write half: the only terminal state it
//! can reach is `Interrupted`. Reset flips every live worker's token; the
//! worker notices the next time it schedules, checkpoints or sleeps. A
//! worker already blocked in [`Future::result_in`] (and so in
//! [`crate::Bridge::call`]) is woken at once through the token's registry
//! of blocked waits.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::future::{Future, Waiter, WaiterGuard, WaiterRegistry};
use crate::tracing_compat::trace;
use crate::types::{CancelReason, FutureId};

/// Cooperative interrupt flag for one worker thread.
#[derive(Clone, Debug)]
pub struct AbortToken {
    future: Future<()>,
    blocked: Arc<WaiterRegistry>,
}

impl AbortToken {
    /// Creates a token that has not been interrupted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            future: Future::unbound(),
            blocked: Arc::new(WaiterRegistry::new()),
        }
    }

    /// Returns the identifier of the underlying future.
    #[must_use]
    pub fn id(&self) -> FutureId {
        self.future.id()
    }

    /// Interrupts the token and wakes every wait made through it.
    ///
    /// Returns false if it was already interrupted.
    pub fn interrupt(&self, reason: CancelReason) -> bool {
        if self.future.interrupt(reason).is_err() {
            return false;
        }
        let woken = self.blocked.wake_all();
        trace!(token = %self.future.id(), woken, "abort token interrupted");
        true
    }

    /// Number of futures a wait through this token is currently blocked on.
    #[must_use]
    pub fn blocked_waits(&self) -> usize {
        self.blocked.len()
    }

    pub(crate) fn blocked_on(&self, future: FutureId, waiter: Weak<dyn Waiter>) -> WaiterGuard {
        self.blocked.register(future, waiter)
    }

    /// Returns true once the token has been interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.future.has_result()
    }

    /// Returns the interruption reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        self.future.interrupt_reason()
    }

    /// Returns `ErrorKind::Interrupted` if the token was interrupted.
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(Error::interrupted(&reason)),
            None => Ok(()),
        }
    }

    /// Blocks for up to `timeout` or until interrupted. Returns true if the
    /// token was interrupted.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.future.result_timeout(timeout) {
            Err(err) => !err.is_timeout(),
            Ok(()) => true,
        }
    }
}

impl Default for AbortToken {
    fn default() -> Self {
        Self::new()
    }
}
