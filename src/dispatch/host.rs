//! The host collaborator boundary.

use std::time::Duration;

use crate::error::Error;
use crate::tracing_compat::error;

/// The host application, as seen by the bridge.
///
/// The bridge asks the host to call [`crate::Bridge::tick`] periodically on
/// its controlling thread and reports failures back to it. Commands receive
/// `&H` and may call any thread-affine host API; the bridge guarantees they
/// only ever run on the host thread.
pub trait Host: Send + Sync + 'static {
    /// Start invoking `tick()` every `interval`.
    fn register_tick(&self, interval: Duration);

    /// Stop invoking `tick()`.
    fn unregister_tick(&self);

    /// Surface a command failure to the user.
    ///
    /// The default implementation logs through `tracing`.
    fn report_error(&self, label: &str, err: &Error) {
        error!(label, error = %err, "host command failed");
    }
}

impl<T: Host> Host for std::sync::Arc<T> {
    fn register_tick(&self, interval: Duration) {
        (**self).register_tick(interval);
    }

    fn unregister_tick(&self) {
        (**self).unregister_tick();
    }

    fn report_error(&self, label: &str, err: &Error) {
        (**self).report_error(label, err);
    }
}
