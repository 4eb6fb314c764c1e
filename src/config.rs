//! Configuration management for localbox
//!
//! Settings are loaded from environment variables with sensible defaults. Command line
//! flags override individual fields after loading.
//!
//! # Environment Variables
//!
//! - `LOCALBOX_MODELS_DIR`: Directory holding downloaded llamafiles - default: `<data dir>/localbox/models`
//! - `LOCALBOX_READY_TIMEOUT`: Seconds to wait for a launched model to become ready - default: "120"
//! - `LOCALBOX_READY_MARKER`: Output substring that signals readiness - default: llamafile's listening line
//! - `LOCALBOX_DOWNLOAD_TIMEOUT`: Connect timeout for downloads in seconds - default: "30"
//! - `LOCALBOX_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use localbox::LocalboxConfig;
//!
//! let config = LocalboxConfig::default();
//! config.validate().expect("Invalid configuration");
//! println!("Models live in {}", config.models_dir.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default values for configuration
const DEFAULT_READY_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";
const MAX_READY_TIMEOUT_SECS: u64 = 1800;
const MAX_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Line llamafile prints once its HTTP listener is bound
pub const DEFAULT_READY_MARKER: &str = "llama server listening at http://127.0.0.1:8080";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Main configuration structure for localbox
#[derive(Debug, Clone, PartialEq)]
pub struct LocalboxConfig {
    /// Directory holding downloaded artifacts
    pub models_dir: PathBuf,

    /// Bound on waiting for a launched artifact to print its readiness marker
    pub ready_timeout_secs: u64,

    /// Substring of the artifact output that signals readiness
    pub ready_marker: String,

    /// Connect timeout for artifact downloads
    pub download_timeout_secs: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for LocalboxConfig {
    /// Creates a configuration from `LOCALBOX_*` environment variables, falling back to
    /// defaults for anything unset or unparsable
    fn default() -> Self {
        let models_dir = env::var("LOCALBOX_MODELS_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_models_dir);

        let ready_timeout_secs = env::var("LOCALBOX_READY_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_READY_TIMEOUT_SECS);

        let ready_marker = env::var("LOCALBOX_READY_MARKER")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_READY_MARKER.to_string());

        let download_timeout_secs = env::var("LOCALBOX_DOWNLOAD_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS);

        let log_level = env::var("LOCALBOX_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            models_dir,
            ready_timeout_secs,
            ready_marker,
            download_timeout_secs,
            log_level,
        }
    }
}

/// `<data dir>/localbox/models`, or `./.localbox/models` when the platform has no data dir
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("localbox").join("models"))
        .unwrap_or_else(|| PathBuf::from(".localbox").join("models"))
}

impl LocalboxConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any value is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ready_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Readiness timeout must be at least 1 second".to_string(),
            ));
        }
        if self.ready_timeout_secs > MAX_READY_TIMEOUT_SECS {
            return Err(ConfigError::ValidationFailed(
                "Readiness timeout cannot exceed 30 minutes".to_string(),
            ));
        }

        if self.download_timeout_secs == 0 || self.download_timeout_secs > MAX_DOWNLOAD_TIMEOUT_SECS
        {
            return Err(ConfigError::ValidationFailed(format!(
                "Download timeout must be between 1 and {} seconds",
                MAX_DOWNLOAD_TIMEOUT_SECS
            )));
        }

        if self.ready_marker.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Readiness marker cannot be empty".to_string(),
            ));
        }

        if self.models_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Models directory cannot be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn with_models_dir(mut self, models_dir: PathBuf) -> Self {
        self.models_dir = models_dir;
        self
    }

    pub fn with_ready_timeout_secs(mut self, secs: u64) -> Self {
        self.ready_timeout_secs = secs;
        self
    }

    pub fn with_ready_marker(mut self, marker: impl Into<String>) -> Self {
        self.ready_marker = marker.into();
        self
    }
}

impl std::fmt::Display for LocalboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Models directory: {}", self.models_dir.display())?;
        writeln!(f, "Readiness timeout: {}s", self.ready_timeout_secs)?;
        writeln!(f, "Readiness marker: {}", self.ready_marker)?;
        writeln!(f, "Download timeout: {}s", self.download_timeout_secs)?;
        write!(f, "Log level: {}", self.log_level)
    }
}
