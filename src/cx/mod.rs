//! Per-thread execution context.
//!
//! Every bridge operation takes a [`Cx`] describing who is calling: the host
//! thread, a worker spawned through the bridge, or some other thread. The
//! context is passed explicitly and cannot cross threads, so the inline fast
//! path for host callers and the abort check for workers never depend on
//! ambient thread-local state.
//!
//! - [`Cx`]: the context value
//! - [`AbortToken`]: a worker's interrupt flag

pub mod abort;
pub mod cx;

pub use abort::AbortToken;
pub use cx::{Cx, Role};
