//! Configuration management for lockout.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LockoutError, Result};
use crate::limiter::{LinearEscalation, Sampling};

/// Main configuration for the lockout service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Limiter store configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Escalation curve
    #[serde(default)]
    pub policy: LinearEscalation,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Limiter store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Entries inspected by each opportunistic eviction sweep
    #[serde(default = "default_eviction_candidates")]
    pub eviction_candidates: usize,

    /// How eviction candidates are drawn
    #[serde(default)]
    pub sampling: Sampling,

    /// Seed for random sampling; entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            eviction_candidates: default_eviction_candidates(),
            sampling: Sampling::default(),
            seed: None,
        }
    }
}

fn default_eviction_candidates() -> usize {
    3
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `lockout=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LockoutConfig {
    /// Load configuration from a file path.
    ///
    /// Does not log: the binary calls this before tracing is initialized.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LockoutConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LockoutError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.limiter.eviction_candidates == 0 {
            return Err(LockoutError::Config(
                "limiter.eviction_candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
