//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;
use std::time::{Duration, Instant};

use hostbridge::lab::{HostLoop, SimHost};
use hostbridge::BridgeConfig;
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Environment variable pinning the proptest RNG seed.
pub const PROPTEST_SEED_ENV: &str = "HOSTBRIDGE_PROPTEST_SEED";
/// Environment variable overriding proptest shrink iterations.
pub const PROPTEST_MAX_SHRINK_ITERS_ENV: &str = "HOSTBRIDGE_PROPTEST_MAX_SHRINK_ITERS";
/// Seed used under CI when no explicit seed is given.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x4854_4252;

/// Upper bound for anything a test waits on.
pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Property test settings with deterministic seeding.
#[derive(Debug, Clone)]
pub struct PropertyTestConfig {
    /// Cases per property.
    pub cases: u32,
    /// Fixed RNG seed, if any.
    pub seed: Option<u64>,
    /// Shrink iteration cap, if any.
    pub max_shrink_iters: Option<u32>,
}

impl PropertyTestConfig {
    /// Reads the seed and shrink settings from the environment.
    #[must_use]
    pub fn new(cases: u32) -> Self {
        Self {
            cases,
            seed: read_proptest_seed(),
            max_shrink_iters: read_max_shrink_iters(),
        }
    }

    /// Converts to a proptest configuration.
    ///
    /// An explicit `PROPTEST_RNG_SEED` still wins over our own seed.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        let mut config = ProptestConfig::with_cases(self.cases);
        if matches!(config.rng_seed, RngSeed::Random) {
            if let Some(seed) = self.seed {
                config.rng_seed = RngSeed::Fixed(seed);
            }
        }
        if let Some(iters) = self.max_shrink_iters {
            config.max_shrink_iters = iters;
        }
        config
    }
}

/// Builds a proptest configuration with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    PropertyTestConfig::new(cases).to_proptest_config()
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }
    None
}

fn read_max_shrink_iters() -> Option<u32> {
    std::env::var(PROPTEST_MAX_SHRINK_ITERS_ENV)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
}

/// Initializes test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initializes test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Configuration with a fast tick for tests.
#[must_use]
pub fn fast_config() -> BridgeConfig {
    BridgeConfig {
        tick_interval: Duration::from_millis(1),
        ..BridgeConfig::default()
    }
}

/// Starts a host loop over a fresh [`SimHost`].
#[must_use]
pub fn sim_loop(config: BridgeConfig) -> HostLoop<SimHost> {
    HostLoop::spawn(config, SimHost::new).expect("failed to start host loop")
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// Logs a test phase transition.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Logs test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
}

/// Asserts with structured logging of expected and actual values.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                message = %$msg,
                expected = ?$expected,
                actual = ?$actual,
                "assertion failed"
            );
            panic!(
                "{}: expected {:?}, got {:?}",
                $msg, $expected, $actual
            );
        }
        tracing::debug!(message = %$msg, value = ?$actual, "assertion passed");
    };
}
