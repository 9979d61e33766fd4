//! Queued commands.
//!
//! A command is a boxed closure over `&H` plus the write half of the future
//! its producer may be waiting on. Once enqueued it is owned by the dispatch
//! loop, which either runs it exactly once or abandons it during a reset.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{panic_message, Error, Result};
use crate::future::Resolver;
use crate::tracing_compat::trace;
use crate::types::{CancelReason, CommandId};

/// Identity of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandMeta {
    /// Unique command id.
    pub id: CommandId,
    /// Static label used in logs and error reports.
    pub label: &'static str,
    /// Bridge generation the command was accepted in.
    pub generation: u64,
}

/// Type-erased command body.
pub(crate) trait Dispatchable<H>: Send {
    /// Runs the body and resolves its future. Returns the failure, if any,
    /// after the future has been resolved with it.
    fn run(self: Box<Self>, host: &H, meta: &CommandMeta) -> Result<()>;

    /// Interrupts the future without running the body.
    fn abandon(self: Box<Self>, reason: &CancelReason);
}

/// A closure and its optional resolver.
pub(crate) struct Call<F, T> {
    f: F,
    resolver: Option<Resolver<T>>,
}

impl<F, T> Call<F, T> {
    pub(crate) fn new(f: F, resolver: Option<Resolver<T>>) -> Self {
        Self { f, resolver }
    }
}

impl<H, F, T> Dispatchable<H> for Call<F, T>
where
    F: FnOnce(&H) -> Result<T> + Send,
    T: Send,
{
    fn run(self: Box<Self>, host: &H, meta: &CommandMeta) -> Result<()> {
        let Self { f, resolver } = *self;
        let err = match catch_unwind(AssertUnwindSafe(|| f(host))) {
            Ok(Ok(value)) => {
                if let Some(resolver) = resolver {
                    if let Err(e) = resolver.set_result(value) {
                        trace!(command = %meta.id, error = %e, "result arrived after interruption");
                    }
                }
                return Ok(());
            }
            Ok(Err(cause)) => Error::command_failed(meta.id, meta.label, cause),
            Err(payload) => {
                Error::command_panicked(meta.id, meta.label, &panic_message(payload.as_ref()))
            }
        };
        if let Some(resolver) = resolver {
            if let Err(e) = resolver.set_failure(err.clone()) {
                trace!(command = %meta.id, error = %e, "failure arrived after interruption");
            }
        }
        Err(err)
    }

    fn abandon(self: Box<Self>, reason: &CancelReason) {
        if let Some(resolver) = self.resolver {
            let _ = resolver.interrupt(reason.clone());
        }
    }
}

/// A command waiting in (or popped from) the queue.
pub(crate) struct Command<H> {
    meta: CommandMeta,
    body: Box<dyn Dispatchable<H>>,
}

impl<H> Command<H> {
    pub(crate) fn new(label: &'static str, generation: u64, body: Box<dyn Dispatchable<H>>) -> Self {
        Self {
            meta: CommandMeta {
                id: CommandId::next(),
                label,
                generation,
            },
            body,
        }
    }

    pub(crate) fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub(crate) fn run(self, host: &H) -> Result<()> {
        let Self { meta, body } = self;
        body.run(host, &meta)
    }

    pub(crate) fn abandon(self, reason: &CancelReason) {
        trace!(command = %self.meta.id, label = self.meta.label, reason = %reason, "command abandoned");
        self.body.abandon(reason);
    }
}

impl<H> std::fmt::Debug for Command<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command").field("meta", &self.meta).finish()
    }
}
