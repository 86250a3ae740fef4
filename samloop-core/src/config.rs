//! Manager configuration.

use crate::nap::DEFAULT_MAX_CHAIN_LENGTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for one manager, matching the `samloop.yml` schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Maximum predicate-triggered actions in one cycle
    #[serde(default = "default_max_chain_length")]
    pub max_chain_length: usize,

    /// Maximum number of history entries kept; unbounded when absent
    #[serde(default)]
    pub history_limit: Option<usize>,

    /// Notify view subscribers even when their view did not change
    #[serde(default = "default_true")]
    pub notify_unchanged: bool,
}

fn default_max_chain_length() -> usize {
    DEFAULT_MAX_CHAIN_LENGTH
}

fn default_true() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_chain_length: default_max_chain_length(),
            history_limit: None,
            notify_unchanged: true,
        }
    }
}

impl ManagerConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: ManagerConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the manager cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "history_limit",
                reason: "must keep at least one entry".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_max_chain_length(mut self, max_chain_length: usize) -> Self {
        self.max_chain_length = max_chain_length;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn with_notify_unchanged(mut self, notify_unchanged: bool) -> Self {
        self.notify_unchanged = notify_unchanged;
        self
    }
}
