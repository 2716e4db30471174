//! core::config::schema
//!
//! Configuration schema types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config {0}: {1}")]
    Io(String, String),

    /// Failed to parse a config file.
    #[error("failed to parse config {0}: {1}")]
    Parse(String, String),

    /// A config value is invalid.
    #[error("invalid config value: {0}")]
    InvalidValue(String),

    /// A required value is missing for the requested operation.
    #[error("missing config value: {0}")]
    Missing(String),
}

/// ghstack configuration.
///
/// # Example
///
/// ```toml
/// github_username = "ezyang"
/// github_oauth = "ghp_xxx"
/// remote_name = "origin"
/// github_url = "github.com"
/// max_stack_size = 8
/// direct = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// GitHub username doing the submitting; appears in branch names.
    pub github_username: Option<String>,

    /// OAuth token for the forge API.
    pub github_oauth: Option<String>,

    /// Name of the upstream remote (normally "origin").
    pub remote_name: String,

    /// Forge host (normally "github.com"; override for Enterprise).
    pub github_url: String,

    /// Safety throttle: refuse stacks longer than this without --force.
    pub max_stack_size: usize,

    /// Default to direct mode (PRs target head branches, no synthetic base).
    pub direct: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_username: None,
            github_oauth: None,
            remote_name: "origin".to_string(),
            github_url: "github.com".to_string(),
            max_stack_size: 8,
            direct: false,
        }
    }
}

impl Config {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote_name.is_empty() {
            return Err(ConfigError::InvalidValue(
                "remote_name cannot be empty".to_string(),
            ));
        }

        if self.github_url.is_empty() || self.github_url.contains('/') {
            return Err(ConfigError::InvalidValue(format!(
                "github_url must be a bare host name, got '{}'",
                self.github_url
            )));
        }

        if self.max_stack_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_stack_size must be at least 1".to_string(),
            ));
        }

        if let Some(username) = &self.github_username {
            if username.is_empty() || username.contains('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "github_username '{}' is not a valid GitHub login",
                    username
                )));
            }
        }

        Ok(())
    }

    /// The username, or an error directing the user at the config file.
    pub fn require_username(&self) -> Result<&str, ConfigError> {
        self.github_username
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("github_username (set it in .ghstackrc)".into()))
    }

    /// The OAuth token, or an error directing the user at the config file.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.github_oauth.as_deref().ok_or_else(|| {
            ConfigError::Missing(
                "github_oauth (set it in .ghstackrc or GHSTACK_OAUTH_TOKEN)".into(),
            )
        })
    }
}
