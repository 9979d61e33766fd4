//! Helpers shared by the unit tests: logging setup, an environment lock for
//! tests that touch `HOSTBRIDGE_*` variables, and polling for conditions set
//! by other threads.

use std::sync::{Mutex, Once};
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Installs a trace-level subscriber writing through the test harness.
///
/// `RUST_LOG` narrows the output. Only the first call has an effect.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("hostbridge=trace"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Serializes tests that set or clear environment variables.
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Polls `cond` until it holds or `timeout` elapses; returns the last result.
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Logs the start of a test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "==== {} ====", $name);
    };
}

/// Logs test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed: {}", $name);
    };
}

/// Asserts `cond`, logging the expected and actual values either way.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(expected = ?$expected, actual = ?$actual, "checking: {}", $msg);
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Asserts the shape of an [`Outcome`](crate::types::Outcome).
///
/// ```ignore
/// assert_outcome!(fut.outcome().unwrap(), Ok(v) => assert_eq!(v, 3));
/// assert_outcome!(fut.outcome().unwrap(), Failed);
/// assert_outcome!(fut.outcome().unwrap(), Interrupted);
/// ```
#[macro_export]
macro_rules! assert_outcome {
    ($outcome:expr, Ok($v:ident) => $check:expr) => {
        match $outcome {
            $crate::types::Outcome::Ok($v) => $check,
            other => panic!("expected a value, got {other}"),
        }
    };
    ($outcome:expr, Failed) => {
        match $outcome {
            $crate::types::Outcome::Failed(_) => {}
            other => panic!("expected a failure, got {other}"),
        }
    };
    ($outcome:expr, Interrupted) => {
        match $outcome {
            $crate::types::Outcome::Interrupted(_) => {}
            other => panic!("expected an interruption, got {other}"),
        }
    };
}
