//! The execution context value.

use std::marker::PhantomData;
use std::time::Duration;

use crate::cx::AbortToken;
use crate::error::{Error, Result};
use crate::types::WorkerId;

/// Who a [`Cx`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The thread that owns the bridge and drives `tick()`.
    Host,
    /// A worker spawned through `Bridge::spawn`.
    Worker(WorkerId),
    /// Any other thread.
    Detached,
}

/// Execution context for one thread.
///
/// `Cx` is `!Send`: a host context obtained on the host thread
/// can never be smuggled onto a worker, which would let the worker run host
/// commands inline.
///
/// Worker contexts carry the worker's [`AbortToken`] and the bridge
/// generation the worker was spawned in. The bridge checks both whenever the
/// worker schedules a command.
#[derive(Clone, Debug)]
pub struct Cx {
    role: Role,
    token: Option<AbortToken>,
    generation: Option<u64>,
    _not_send: PhantomData<*const ()>,
}

impl Cx {
    pub(crate) fn host() -> Self {
        Self {
            role: Role::Host,
            token: None,
            generation: None,
            _not_send: PhantomData,
        }
    }

    pub(crate) fn worker(id: WorkerId, token: AbortToken, generation: u64) -> Self {
        Self {
            role: Role::Worker(id),
            token: Some(token),
            generation: Some(generation),
            _not_send: PhantomData,
        }
    }

    /// A context for a thread the bridge did not create.
    ///
    /// Detached callers always enqueue and are never interrupted by reset,
    /// although their blocked waits still are.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            role: Role::Detached,
            token: None,
            generation: None,
            _not_send: PhantomData,
        }
    }

    /// A worker-role context with an explicit token and generation.
    #[cfg(any(test, feature = "test-internals"))]
    #[must_use]
    pub fn for_testing_worker(token: AbortToken, generation: u64) -> Self {
        Self::worker(WorkerId::next(), token, generation)
    }

    /// Returns this context's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns true for the host context.
    #[must_use]
    pub const fn is_host(&self) -> bool {
        matches!(self.role, Role::Host)
    }

    /// Returns the worker id for worker contexts.
    #[must_use]
    pub const fn worker_id(&self) -> Option<WorkerId> {
        match self.role {
            Role::Worker(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the abort token, if this context has one.
    #[must_use]
    pub const fn abort_token(&self) -> Option<&AbortToken> {
        self.token.as_ref()
    }

    /// Returns the generation a worker was spawned in.
    #[must_use]
    pub const fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Returns true if this context's token was interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.token.as_ref().is_some_and(AbortToken::is_interrupted)
    }

    /// Returns `ErrorKind::Interrupted` if the context was interrupted.
    ///
    /// Long-running worker loops should call this between steps:
    ///
    /// ```ignore
    /// bridge.spawn(|cx| {
    ///     loop {
    ///         cx.checkpoint()?;
    ///         poll_remote()?;
    ///         cx.sleep(Duration::from_secs(1))?;
    ///     }
    /// })?;
    /// ```
    pub fn checkpoint(&self) -> Result<()> {
        match &self.token {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    /// Sleeps for `duration`, waking early with `ErrorKind::Interrupted` if
    /// the context is interrupted.
    ///
    /// Sleeping on the host thread would stall the dispatch loop and is
    /// rejected with `ErrorKind::WrongThread`.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        if self.is_host() {
            return Err(Error::wrong_thread("sleep called on the host thread"));
        }
        match &self.token {
            Some(token) => {
                if token.wait_timeout(duration) {
                    token.check()
                } else {
                    Ok(())
                }
            }
            None => {
                std::thread::sleep(duration);
                Ok(())
            }
        }
    }
}
