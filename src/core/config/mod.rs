//! core::config
//!
//! Configuration loading for ghstack.
//!
//! # Locations
//!
//! In order of precedence:
//! 1. `$GHSTACK_CONFIG` if set
//! 2. `.ghstackrc` in the repository root
//! 3. `~/.ghstackrc`
//!
//! The OAuth token may additionally be supplied via the `GHSTACK_OAUTH_TOKEN`
//! environment variable, which wins over any file value.
//!
//! # Validation
//!
//! Values are validated after parsing; an absent username or token is only an
//! error at the point a command actually needs the forge, so read-only use
//! (`unlink`) works unconfigured.

mod schema;

pub use schema::{Config, ConfigError};

use std::path::{Path, PathBuf};

/// Locate the configuration file to read.
///
/// Returns `None` when no candidate exists; callers fall back to
/// [`Config::default`].
pub fn find_config_file(repo_root: Option<&Path>) -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("GHSTACK_CONFIG") {
        return Some(PathBuf::from(explicit));
    }

    if let Some(root) = repo_root {
        let local = root.join(".ghstackrc");
        if local.is_file() {
            return Some(local);
        }
    }

    if let Some(home) = std::env::var_os("HOME") {
        let user = PathBuf::from(home).join(".ghstackrc");
        if user.is_file() {
            return Some(user);
        }
    }

    None
}

/// Load configuration for a repository.
///
/// Missing files yield the default configuration; a file that exists but
/// fails to parse or validate is an error.
pub fn load(repo_root: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match find_config_file(repo_root) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
            let config: Config = toml::from_str(&raw)
                .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))?;
            config
        }
        None => Config::default(),
    };

    if let Ok(token) = std::env::var("GHSTACK_OAUTH_TOKEN") {
        if !token.is_empty() {
            config.github_oauth = Some(token);
        }
    }

    config.validate()?;
    Ok(config)
}
