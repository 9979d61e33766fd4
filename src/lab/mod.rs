//! Host simulation for tests.
//!
//! Real hosts are GUI applications with their own event loops, which tests
//! cannot drive. The lab provides stand-ins:
//!
//! - [`SimHost`]: an in-memory host recording tick registration, error
//!   reports and every API call together with the thread it ran on
//! - [`HostLoop`]: a dedicated host thread that owns a bridge and calls
//!   `tick()` at the configured interval

pub mod host;
pub mod host_loop;

pub use host::{HostCall, SimHost};
pub use host_loop::HostLoop;
