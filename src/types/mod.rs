//! Core types shared across the bridge.
//!
//! - [`id`]: identifiers for commands, futures and workers
//! - [`cancel`]: interruption reasons
//! - [`outcome`]: terminal states of a future

pub mod cancel;
pub mod id;
pub mod outcome;

pub use cancel::{CancelKind, CancelReason};
pub use id::{CommandId, FrameId, FutureId, WorkerId};
pub use outcome::Outcome;
