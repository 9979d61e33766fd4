//! Error types and error handling strategy for hostbridge.
//!
//! Every fallible bridge operation returns [`Result`]. Error handling follows
//! these principles:
//!
//! - Errors are explicit and typed by [`ErrorKind`]; callers branch on the
//!   kind, never on message text.
//! - Cancellation is not a failure. An interrupted wait or schedule reports
//!   [`ErrorKind::Interrupted`] together with the [`CancelReason`], so
//!   shutdown paths can ignore it silently.
//! - Panics inside dispatched commands are caught and surfaced as
//!   [`ErrorKind::Failed`] to the waiting thread.
//! - Nothing is retried automatically. Re-submitting a command is the
//!   caller's decision.
//!
//! # Error Categories
//!
//! - **Command**: the dispatched command failed (`Failed`)
//! - **Cancellation**: cooperative interruption or a bounded wait that
//!   elapsed (`Interrupted`, `Timeout`)
//! - **Dispatch**: the loop itself (`QueueFault`, `AlreadyResolved`,
//!   `WrongThread`)
//! - **Worker**: worker thread lifecycle (`SpawnFailed`, `Panicked`)
//! - **User** / **Internal**

use core::fmt;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{CancelReason, CommandId, FutureId, WorkerId};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Command ===
    /// The dispatched command returned an error or panicked.
    Failed,

    // === Cancellation ===
    /// The operation was cooperatively interrupted.
    Interrupted,
    /// A bounded wait elapsed before the future resolved.
    Timeout,

    // === Dispatch ===
    /// A command failure stopped the dispatch loop.
    QueueFault,
    /// A write hit a future that already holds a terminal outcome.
    AlreadyResolved,
    /// A host-only operation was attempted off the host thread.
    WrongThread,

    // === Worker ===
    /// The operating system refused to start a worker thread.
    SpawnFailed,
    /// A worker thread panicked.
    Panicked,

    // === Other ===
    /// User-provided error.
    User,
    /// Internal bridge error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Failed => ErrorCategory::Command,
            Self::Interrupted | Self::Timeout => ErrorCategory::Cancellation,
            Self::QueueFault | Self::AlreadyResolved | Self::WrongThread => {
                ErrorCategory::Dispatch
            }
            Self::SpawnFailed | Self::Panicked => ErrorCategory::Worker,
            Self::User => ErrorCategory::User,
            Self::Internal => ErrorCategory::Internal,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A dispatched command failed.
    Command,
    /// Interruption or timeout.
    Cancellation,
    /// Dispatch loop and future bookkeeping.
    Dispatch,
    /// Worker thread lifecycle.
    Worker,
    /// User-originated errors.
    User,
    /// Internal errors.
    Internal,
}

/// Diagnostic context for an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The command whose execution produced the error.
    pub command_id: Option<CommandId>,
    /// Label of that command.
    pub label: Option<&'static str>,
    /// The worker the error belongs to.
    pub worker_id: Option<WorkerId>,
    /// The future involved.
    pub future_id: Option<FutureId>,
}

/// The main error type for bridge operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    reason: Option<CancelReason>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            reason: None,
            context: ErrorContext {
                command_id: None,
                label: None,
                worker_id: None,
                future_id: None,
            },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns true if this error represents cooperative interruption.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self.kind, ErrorKind::Interrupted)
    }

    /// Returns true if a bounded wait elapsed.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns true if a dispatched command failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::Failed)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds structured context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = ctx;
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Returns the cancellation reason of an interruption.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        self.reason.as_ref()
    }

    /// Creates a command failure with a message.
    #[must_use]
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Failed).with_message(msg)
    }

    /// Creates a user error with a message.
    #[must_use]
    pub fn user(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(msg)
    }

    /// Creates an interruption error from a structured reason.
    #[must_use]
    pub fn interrupted(reason: &CancelReason) -> Self {
        let mut err = Self::new(ErrorKind::Interrupted).with_message(format!("{reason}"));
        err.reason = Some(reason.clone());
        err
    }

    /// Creates a timeout error for a wait on `future`.
    #[must_use]
    pub fn timeout(future: FutureId, waited: Duration) -> Self {
        Self::new(ErrorKind::Timeout)
            .with_message(format!("{future} still pending after {waited:?}"))
            .with_context(ErrorContext {
                future_id: Some(future),
                ..ErrorContext::default()
            })
    }

    /// Creates an error for a second write to a resolved future.
    #[must_use]
    pub fn already_resolved(future: FutureId) -> Self {
        Self::new(ErrorKind::AlreadyResolved)
            .with_message(format!("{future} already holds an outcome"))
            .with_context(ErrorContext {
                future_id: Some(future),
                ..ErrorContext::default()
            })
    }

    /// Creates a wrong-thread error.
    #[must_use]
    pub fn wrong_thread(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrongThread).with_message(detail)
    }

    /// Wraps the error a command returned into a `Failed` error.
    #[must_use]
    pub fn command_failed(id: CommandId, label: &'static str, cause: Self) -> Self {
        if cause.is_failure() && cause.context.command_id == Some(id) {
            return cause;
        }
        Self::new(ErrorKind::Failed)
            .with_message(format!("command `{label}` ({id}) failed: {cause}"))
            .with_context(ErrorContext {
                command_id: Some(id),
                label: Some(label),
                ..ErrorContext::default()
            })
            .with_source(cause)
    }

    /// Creates a `Failed` error for a command that panicked.
    #[must_use]
    pub fn command_panicked(id: CommandId, label: &'static str, panic: &str) -> Self {
        Self::new(ErrorKind::Failed)
            .with_message(format!("command `{label}` ({id}) panicked: {panic}"))
            .with_context(ErrorContext {
                command_id: Some(id),
                label: Some(label),
                ..ErrorContext::default()
            })
    }

    /// Creates the fault reported when a failing command stops the loop.
    #[must_use]
    pub fn queue_fault(cause: &Self) -> Self {
        let label = cause.context.label.unwrap_or("<unlabelled>");
        Self::new(ErrorKind::QueueFault)
            .with_message(format!(
                "dispatch loop stopped after `{label}` failed; start() or reset() resumes it"
            ))
            .with_context(cause.context.clone())
            .with_source(cause.clone())
    }

    /// Creates a worker spawn error.
    #[must_use]
    pub fn spawn_failed(worker: WorkerId, source: std::io::Error) -> Self {
        Self::new(ErrorKind::SpawnFailed)
            .with_message(format!("failed to start {worker}"))
            .with_context(ErrorContext {
                worker_id: Some(worker),
                ..ErrorContext::default()
            })
            .with_source(source)
    }

    /// Creates an error for a worker thread that panicked.
    #[must_use]
    pub fn worker_panicked(worker: WorkerId, panic: &str) -> Self {
        Self::new(ErrorKind::Panicked)
            .with_message(format!("{worker} panicked: {panic}"))
            .with_context(ErrorContext {
                worker_id: Some(worker),
                ..ErrorContext::default()
            })
    }

    /// Creates an internal error (bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Normalizes an arbitrary error into a `Failed` one.
    ///
    /// A future's failure outcome always reports `Failed`, whatever the
    /// writer passed in, so it can never be mistaken for an interruption.
    #[must_use]
    pub fn into_failure(self) -> Self {
        if self.is_failure() {
            return self;
        }
        let message = self.to_string();
        let context = self.context.clone();
        Self::new(ErrorKind::Failed)
            .with_message(message)
            .with_context(context)
            .with_source(self)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// A specialized Result type for bridge operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
