//! # Configuration Management
//!
//! Startup configuration for the enrollment authority.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment overrides via `from_env()` (`ENROLLD_*` variables)
//! - Command-line flags, applied on top by the binary (highest precedence)
//!
//! Configuration is validated before the service binds its socket; an
//! invalid configuration is a fatal startup error.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::Level;

use crate::error::{EnrollError, Result};

/// Startup configuration for the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path at which to create the listening socket.
    pub socket_path: PathBuf,

    /// Directory holding per-device secrets and deployment keys.
    pub secrets_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("enrolld.sock"),
            secrets_dir: PathBuf::from("."),
            log_level: String::from("info"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EnrollError::ConfigError(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| EnrollError::ConfigError(format!("failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `ENROLLD_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ENROLLD_SOCKET_PATH") {
            config.socket_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("ENROLLD_SECRETS_DIR") {
            config.secrets_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("ENROLLD_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate the configuration for common problems.
    ///
    /// Returns a list of validation errors. Empty list means the
    /// configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.socket_path.as_os_str().is_empty() {
            errors.push("socket path cannot be empty".to_string());
        }

        if !self.secrets_dir.is_dir() {
            errors.push(format!(
                "secrets directory does not exist: {}",
                self.secrets_dir.display()
            ));
        }

        if Level::from_str(&self.log_level).is_err() {
            errors.push(format!("invalid log level: '{}'", self.log_level));
        }

        errors
    }

    /// Validate and return Result - convenience method.
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EnrollError::ConfigError(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}
