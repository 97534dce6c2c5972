//! Panel configuration.

use panelsync_daemon::DaemonConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for [`PanelConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Username derivation for provisioned users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsernameConfig {
    /// Characters kept from the email local part.
    pub prefix_length: usize,
    /// Random characters appended after `_`.
    pub suffix_length: usize,
    /// Derivations tried before giving up on username collisions.
    pub max_attempts: u32,
    /// How long to wait for a concurrent transaction holding the same email.
    pub contention_wait_ms: u64,
}

impl Default for UsernameConfig {
    fn default() -> Self {
        Self {
            prefix_length: 8,
            suffix_length: 6,
            max_attempts: 3,
            contention_wait_ms: 2_000,
        }
    }
}

impl UsernameConfig {
    /// Returns the email contention wait as a duration.
    #[must_use]
    pub fn contention_wait(&self) -> Duration {
        Duration::from_millis(self.contention_wait_ms)
    }
}

/// Configuration shared by all services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Panel base URL pushed to daemons as `remote.base`.
    pub panel_url: String,
    /// Length of generated daemon secrets.
    pub daemon_secret_length: usize,
    /// Username derivation.
    pub username: UsernameConfig,
    /// Daemon transport settings.
    pub daemon: DaemonConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            panel_url: "http://localhost".to_string(),
            daemon_secret_length: 36,
            username: UsernameConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl PanelConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a JSON file. Missing fields keep defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon_secret_length == 0 {
            return Err(ConfigError::Invalid(
                "daemon_secret_length must be positive".into(),
            ));
        }
        if self.username.prefix_length == 0 || self.username.suffix_length == 0 {
            return Err(ConfigError::Invalid(
                "username prefix and suffix lengths must be positive".into(),
            ));
        }
        if self.username.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "username.max_attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Sets the panel URL.
    #[must_use]
    pub fn with_panel_url(mut self, url: impl Into<String>) -> Self {
        self.panel_url = url.into();
        self
    }

    /// Sets the daemon secret length.
    #[must_use]
    pub fn with_daemon_secret_length(mut self, length: usize) -> Self {
        self.daemon_secret_length = length;
        self
    }

    /// Sets the username derivation.
    #[must_use]
    pub fn with_username(mut self, username: UsernameConfig) -> Self {
        self.username = username;
        self
    }

    /// Sets the daemon transport settings.
    #[must_use]
    pub fn with_daemon(mut self, daemon: DaemonConfig) -> Self {
        self.daemon = daemon;
        self
    }
}
