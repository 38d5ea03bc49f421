//! Runner configuration
//!
//! Defines the container engine to drive, the shared volume name and the
//! per-invocation timeout.

use std::time::Duration;

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Container engine binary (e.g. "docker", "podman")
    pub engine: String,

    /// Name of the shared volume mounted into every stage run
    ///
    /// Two pipelines may run side by side only with distinct names.
    pub volume_name: String,

    /// Upper bound for each build/run/volume invocation; unbounded when `None`
    pub invocation_timeout: Option<Duration>,
}

impl RunnerConfig {
    /// Creates a configuration with defaults for the given engine
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            volume_name: default_volume_name(),
            invocation_timeout: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - RELAY_ENGINE (default: docker)
    /// - RELAY_VOLUME (default: relay-<uuid>)
    /// - RELAY_INVOCATION_TIMEOUT (seconds, default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(engine) = lookup("RELAY_ENGINE") {
            config.engine = engine;
        }

        if let Some(volume) = lookup("RELAY_VOLUME") {
            config.volume_name = volume;
        }

        if let Some(raw) = lookup("RELAY_INVOCATION_TIMEOUT") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            config.invocation_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_volume_name(mut self, name: impl Into<String>) -> Self {
        self.volume_name = name.into();
        self
    }

    pub fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.trim().is_empty() {
            return Err(ConfigError::EmptyEngine);
        }

        if self.volume_name.trim().is_empty() {
            return Err(ConfigError::EmptyVolumeName);
        }

        if !self
            .volume_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ConfigError::InvalidVolumeName(self.volume_name.clone()));
        }

        if self.invocation_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout("0".to_string()));
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new("docker")
    }
}

/// A unique volume name, so concurrent runs never share a volume by accident
pub fn default_volume_name() -> String {
    format!("relay-{}", uuid::Uuid::new_v4())
}

/// Invalid runner configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("engine cannot be empty")]
    EmptyEngine,

    #[error("volume name cannot be empty")]
    EmptyVolumeName,

    #[error("volume name '{0}' may only contain letters, digits, '-', '_' and '.'")]
    InvalidVolumeName(String),

    #[error("invocation timeout must be a positive number of seconds, got '{0}'")]
    InvalidTimeout(String),
}
