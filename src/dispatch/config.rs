//! Bridge configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default interval at which the host invokes `tick()`.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);
/// Default maximum number of commands executed per tick.
pub const DEFAULT_STEPS_PER_TICK: usize = 10;
/// Default name prefix for worker threads.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "hostbridge-worker";

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Interval the host is asked to call `tick()` at (default: 10ms).
    pub tick_interval: Duration,
    /// Maximum commands executed per tick (default: 10).
    pub steps_per_tick: usize,
    /// Name prefix for worker threads; threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads (default: the platform default).
    pub thread_stack_size: Option<usize>,
}

impl BridgeConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.tick_interval.is_zero() {
            self.tick_interval = Duration::from_millis(1);
        }
        if self.steps_per_tick == 0 {
            self.steps_per_tick = 1;
        }
        if self.thread_name_prefix.is_empty() {
            self.thread_name_prefix = DEFAULT_THREAD_NAME_PREFIX.to_string();
        }
        if self.thread_stack_size == Some(0) {
            self.thread_stack_size = None;
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            steps_per_tick: DEFAULT_STEPS_PER_TICK,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            thread_stack_size: None,
        }
    }
}

/// Errors raised while assembling a [`BridgeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set to an unparseable value.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// What the variable should contain.
        expected: &'static str,
        /// The raw value found.
        value: String,
    },
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        /// The file that was requested.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
}
