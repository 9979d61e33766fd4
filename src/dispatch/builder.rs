//! Bridge builder.

use std::time::Duration;

use crate::dispatch::bridge::Bridge;
use crate::dispatch::config::{BridgeConfig, ConfigError};
use crate::dispatch::env_config::apply_env_overrides;
use crate::dispatch::host::Host;

/// Builder for constructing a [`Bridge`] with custom configuration.
///
/// Values set through builder methods win over environment variables,
/// which win over a config file, which wins over the defaults.
///
/// ```ignore
/// let bridge = BridgeBuilder::new()
///     .with_env_overrides()
///     .steps_per_tick(4)
///     .build(host)?;
/// ```
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct BridgeBuilder {
    tick_interval: Option<Duration>,
    steps_per_tick: Option<usize>,
    thread_name_prefix: Option<String>,
    thread_stack_size: Option<usize>,
    env_overrides: bool,
    #[cfg(feature = "config-file")]
    config_file: Option<std::path::PathBuf>,
}

impl BridgeBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interval the host is asked to tick at.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    /// Set the maximum number of commands run per tick.
    pub fn steps_per_tick(mut self, steps: usize) -> Self {
        self.steps_per_tick = Some(steps);
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = Some(prefix.into());
        self
    }

    /// Set the worker thread stack size in bytes.
    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = Some(size);
        self
    }

    /// Read `HOSTBRIDGE_*` environment variables at build time.
    pub fn with_env_overrides(mut self) -> Self {
        self.env_overrides = true;
        self
    }

    /// Load a TOML config file at build time.
    #[cfg(feature = "config-file")]
    pub fn with_config_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Resolve the effective configuration without building a bridge.
    pub fn build_config(&self) -> Result<BridgeConfig, ConfigError> {
        let mut config = BridgeConfig::default();
        self.apply_config_file(&mut config)?;

        if self.env_overrides {
            apply_env_overrides(&mut config)?;
        }

        if let Some(v) = self.tick_interval {
            config.tick_interval = v;
        }
        if let Some(v) = self.steps_per_tick {
            config.steps_per_tick = v;
        }
        if let Some(v) = &self.thread_name_prefix {
            config.thread_name_prefix.clone_from(v);
        }
        if let Some(v) = self.thread_stack_size {
            config.thread_stack_size = Some(v);
        }
        config.normalize();
        Ok(config)
    }

    #[cfg(feature = "config-file")]
    fn apply_config_file(&self, config: &mut BridgeConfig) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_file {
            let toml = crate::dispatch::env_config::parse_toml_file(path)?;
            crate::dispatch::env_config::apply_toml_config(config, &toml);
        }
        Ok(())
    }

    #[cfg(not(feature = "config-file"))]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    fn apply_config_file(&self, _config: &mut BridgeConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Build the bridge. The calling thread becomes the host thread.
    pub fn build<H: Host>(self, host: H) -> Result<Bridge<H>, ConfigError> {
        let config = self.build_config()?;
        Ok(Bridge::with_config(host, config))
    }
}
