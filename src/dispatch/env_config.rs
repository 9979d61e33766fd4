//! Environment variable and config file support for [`BridgeBuilder`](super::builder::BridgeBuilder).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`steps_per_tick(4)`)
//! 2. **Environment variables**: values from `HOSTBRIDGE_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`BridgeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `HOSTBRIDGE_TICK_INTERVAL_MS` | `u64` | `tick_interval` |
//! | `HOSTBRIDGE_STEPS_PER_TICK` | `usize` | `steps_per_tick` |
//! | `HOSTBRIDGE_THREAD_NAME_PREFIX` | `String` | `thread_name_prefix` |
//! | `HOSTBRIDGE_THREAD_STACK_SIZE` | `usize` | `thread_stack_size` |

use std::time::Duration;

use crate::dispatch::config::{BridgeConfig, ConfigError};

/// Environment variable name for the tick interval in milliseconds.
pub const ENV_TICK_INTERVAL_MS: &str = "HOSTBRIDGE_TICK_INTERVAL_MS";
/// Environment variable name for the per-tick command budget.
pub const ENV_STEPS_PER_TICK: &str = "HOSTBRIDGE_STEPS_PER_TICK";
/// Environment variable name for the worker thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "HOSTBRIDGE_THREAD_NAME_PREFIX";
/// Environment variable name for the worker thread stack size.
pub const ENV_THREAD_STACK_SIZE: &str = "HOSTBRIDGE_THREAD_STACK_SIZE";

/// Apply environment variable overrides to a [`BridgeConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut BridgeConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_TICK_INTERVAL_MS) {
        config.tick_interval = Duration::from_millis(parse_u64(ENV_TICK_INTERVAL_MS, &val)?);
    }
    if let Some(val) = read_env(ENV_STEPS_PER_TICK) {
        config.steps_per_tick = parse_usize(ENV_STEPS_PER_TICK, &val)?;
    }
    if let Some(val) = read_env(ENV_THREAD_NAME_PREFIX) {
        config.thread_name_prefix = val;
    }
    if let Some(val) = read_env(ENV_THREAD_STACK_SIZE) {
        config.thread_stack_size = Some(parse_usize(ENV_THREAD_STACK_SIZE, &val)?);
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnv {
            var,
            expected: "unsigned integer",
            value: val.to_string(),
        })
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
        var,
        expected: "milliseconds as u64",
        value: val.to_string(),
    })
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable bridge configuration.
///
/// ```toml
/// [dispatch]
/// tick_interval_ms = 10
/// steps_per_tick = 10
///
/// [workers]
/// thread_name_prefix = "myscript-worker"
/// thread_stack_size = 2097152
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct BridgeTomlConfig {
    /// Dispatch loop settings.
    #[serde(default)]
    pub dispatch: DispatchToml,
    /// Worker thread settings.
    #[serde(default)]
    pub workers: WorkersToml,
}

/// Dispatch section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct DispatchToml {
    /// Tick interval in milliseconds.
    pub tick_interval_ms: Option<u64>,
    /// Maximum commands per tick.
    pub steps_per_tick: Option<usize>,
}

/// Worker section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct WorkersToml {
    /// Name prefix for worker threads.
    pub thread_name_prefix: Option<String>,
    /// Stack size per worker thread in bytes.
    pub thread_stack_size: Option<usize>,
}

/// Apply a parsed TOML config to a [`BridgeConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut BridgeConfig, toml: &BridgeTomlConfig) {
    if let Some(ms) = toml.dispatch.tick_interval_ms {
        config.tick_interval = Duration::from_millis(ms);
    }
    if let Some(v) = toml.dispatch.steps_per_tick {
        config.steps_per_tick = v;
    }
    if let Some(ref v) = toml.workers.thread_name_prefix {
        config.thread_name_prefix.clone_from(v);
    }
    if let Some(v) = toml.workers.thread_stack_size {
        config.thread_stack_size = Some(v);
    }
}

/// Parse a TOML string into a [`BridgeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<BridgeTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Read and parse a TOML file into a [`BridgeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<BridgeTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
