//! Hostbridge: run script logic on worker threads against a host API that
//! is only safe to call from one thread.
//!
//! # Overview
//!
//! Host applications (streaming software, editors, game engines) often
//! expose a scripting API that must be called from their main thread, while
//! scripts want to block on network calls, poll, and sleep. Hostbridge sits
//! between the two:
//!
//! - Worker threads submit closures over the host API and get a [`Future`]
//!   back, on which they may block.
//! - The host calls [`Bridge::tick`] periodically on its own thread; each
//!   tick runs a bounded batch of queued commands in FIFO order.
//! - [`Bridge::reset`] invalidates everything in flight when the script is
//!   reloaded: queued commands, blocked waiters and running workers are all
//!   interrupted, and the generation counter moves on.
//!
//! # Core Guarantees
//!
//! - **Ordered**: commands from one producer run in submission order, never
//!   concurrently, never twice
//! - **No silent hangs**: every future reaches a terminal outcome; dropped,
//!   discarded and reset work is interrupted, not lost
//! - **Fail-stop**: a failing command stops the loop until it is restarted
//! - **Cooperative cancellation**: workers observe interrupts at every
//!   schedule, wait, checkpoint and sleep
//!
//! # Module Structure
//!
//! - [`dispatch`]: the bridge, host trait, configuration
//! - [`future`]: single-assignment result cells and the waiter registry
//! - [`cx`]: per-thread execution context and abort tokens
//! - [`worker`]: worker thread handles
//! - [`api`]: source and scene item proxies over a host API
//! - [`lab`]: host simulation for tests
//! - [`types`]: identifiers, outcomes, interruption reasons
//! - [`error`]: error types
//!
//! # Example
//!
//! ```ignore
//! use hostbridge::{Bridge, Cx};
//!
//! let bridge = Bridge::new(my_host);
//! bridge.start();
//!
//! bridge.spawn({
//!     let bridge = bridge.clone();
//!     move |cx: Cx| loop {
//!         let scene = bridge.call(&cx, "current_scene", |host| host.current_scene())?;
//!         cx.sleep(std::time::Duration::from_secs(1))?;
//!     }
//! })?;
//!
//! // On the host thread, from the host's timer:
//! bridge.tick();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod api;
pub mod cx;
pub mod dispatch;
pub mod error;
pub mod future;
pub mod lab;
pub mod tracing_compat;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cx::{AbortToken, Cx, Role};
pub use dispatch::{
    Bridge, BridgeBuilder, BridgeConfig, CommandMeta, ConfigError, Host, ResetReport, TickReport,
};
pub use error::{Error, ErrorCategory, ErrorContext, ErrorKind, Result};
pub use future::{Future, Resolver};
pub use types::{CancelKind, CancelReason, CommandId, FrameId, FutureId, Outcome, WorkerId};
pub use worker::WorkerHandle;
