//! Configuration module
//!
//! Resolves the runner configuration: environment first, then command-line flags.

use anyhow::{Context, Result};
use relay_runner::RunnerConfig;
use std::time::Duration;

/// Runner settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub engine: Option<String>,
    pub volume: Option<String>,
    /// Seconds
    pub timeout: Option<u64>,
}

/// Loads `RELAY_*` variables and applies `overrides` on top
pub fn load(overrides: Overrides) -> Result<RunnerConfig> {
    let config = RunnerConfig::from_env().context("Invalid RELAY_* environment")?;
    resolve(config, overrides)
}

fn resolve(mut config: RunnerConfig, overrides: Overrides) -> Result<RunnerConfig> {
    if let Some(engine) = overrides.engine {
        config = config.with_engine(engine);
    }

    if let Some(volume) = overrides.volume {
        config = config.with_volume_name(volume);
    }

    if let Some(secs) = overrides.timeout {
        config = config.with_invocation_timeout(Duration::from_secs(secs));
    }

    config.validate().context("Invalid runner configuration")?;
    Ok(config)
}
