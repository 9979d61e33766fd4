//! The host-thread dispatch loop.
//!
//! - [`Bridge`]: command queue, tick, start/stop and reset
//! - [`Host`]: the host collaborator boundary
//! - [`BridgeConfig`] / [`BridgeBuilder`]: configuration
//! - [`env_config`]: `HOSTBRIDGE_*` environment variables and TOML files

pub mod bridge;
pub mod builder;
pub mod command;
pub mod config;
pub mod env_config;
pub mod host;

pub use bridge::{Bridge, ResetReport, TickReport};
pub use builder::BridgeBuilder;
pub use command::CommandMeta;
pub use config::{BridgeConfig, ConfigError};
pub use host::Host;
