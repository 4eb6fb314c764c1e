//! Client configuration handed to the host application

use crate::backend::HardwareProfile;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;
use tracing::debug;

/// Errors from assembling a [`BackendConfig`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigureError {
    /// No model identifier was produced
    #[error("Model id cannot be empty")]
    EmptyModelId,

    /// api_base is not a parsable http(s) URL
    #[error("Invalid api_base {url}: {reason}")]
    InvalidApiBase { url: String, reason: String },

    /// api_base points away from this machine
    #[error("api_base {0} is not a local or loopback address")]
    NonLocalApiBase(String),

    /// Generation budget does not fit in the context window
    #[error("max_tokens ({max_tokens}) must be smaller than context_window ({context_window})")]
    InvalidLimits { max_tokens: u32, context_window: u32 },
}

/// How the host should talk to the configured backend.
///
/// Produced once per session and owned by the host afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Model identifier, prefixed with the provider namespace where the client needs one
    pub model_id: String,
    /// OpenAI-compatible endpoint; absent when the client reaches the provider natively
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub supports_functions: bool,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub context_window: u32,
}

impl fmt::Display for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model: {}", self.model_id)?;
        writeln!(
            f,
            "API base: {}",
            self.api_base.as_deref().unwrap_or("(provider default)")
        )?;
        if self.api_key.is_some() {
            writeln!(f, "API key: (placeholder set)")?;
        }
        writeln!(f, "Function calling: {}", self.supports_functions)?;
        if let Some(temperature) = self.temperature {
            writeln!(f, "Temperature: {}", temperature)?;
        }
        writeln!(f, "Max tokens: {}", self.max_tokens)?;
        write!(f, "Context window: {}", self.context_window)
    }
}

/// Output and context sizes for local models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenLimits {
    pub max_tokens: u32,
    pub context_window: u32,
}

impl TokenLimits {
    /// Machines with at least this much RAM get the larger window
    pub const LARGE_RAM_THRESHOLD_GB: f64 = 10.0;

    pub const LARGE: TokenLimits = TokenLimits {
        max_tokens: 1200,
        context_window: 8000,
    };

    pub const SMALL: TokenLimits = TokenLimits {
        max_tokens: 1000,
        context_window: 3000,
    };

    /// Heuristic sizing that keeps constrained hosts away from out-of-memory failures
    pub fn for_profile(profile: &HardwareProfile) -> Self {
        if profile.total_ram_gb >= Self::LARGE_RAM_THRESHOLD_GB {
            Self::LARGE
        } else {
            Self::SMALL
        }
    }
}

/// The provider-specific half of a [`BackendConfig`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderSettings {
    pub model_id: String,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub supports_functions: bool,
    pub temperature: Option<f32>,
}

impl ProviderSettings {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn supports_functions(mut self, supports_functions: bool) -> Self {
        self.supports_functions = supports_functions;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Merges provider settings with hardware-derived limits
pub struct BackendConfigurator;

impl BackendConfigurator {
    /// Produce the final configuration for `settings` on a machine described by `profile`.
    ///
    /// Guarantees a non-empty model id, a loopback `api_base` when one is set, and
    /// `max_tokens < context_window`.
    pub fn configure(
        settings: ProviderSettings,
        profile: &HardwareProfile,
    ) -> Result<BackendConfig, ConfigureError> {
        Self::configure_with_limits(settings, TokenLimits::for_profile(profile))
    }

    pub fn configure_with_limits(
        settings: ProviderSettings,
        limits: TokenLimits,
    ) -> Result<BackendConfig, ConfigureError> {
        let model_id = settings.model_id.trim().to_string();
        if model_id.is_empty() {
            return Err(ConfigureError::EmptyModelId);
        }

        if let Some(api_base) = &settings.api_base {
            validate_local_url(api_base)?;
        }

        if limits.max_tokens >= limits.context_window {
            return Err(ConfigureError::InvalidLimits {
                max_tokens: limits.max_tokens,
                context_window: limits.context_window,
            });
        }

        let config = BackendConfig {
            model_id,
            api_base: settings.api_base,
            api_key: settings.api_key,
            supports_functions: settings.supports_functions,
            temperature: settings.temperature,
            max_tokens: limits.max_tokens,
            context_window: limits.context_window,
        };

        debug!("Backend configured: {:?}", config);
        Ok(config)
    }
}

/// Accepts http(s) URLs whose host is `localhost` or a loopback address
pub fn validate_local_url(url: &str) -> Result<(), ConfigureError> {
    let parsed = Url::parse(url).map_err(|e| ConfigureError::InvalidApiBase {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigureError::InvalidApiBase {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    let local = match parsed.host_str() {
        Some(host) => {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            host.eq_ignore_ascii_case("localhost")
                || host
                    .parse::<IpAddr>()
                    .map(|ip| ip.is_loopback())
                    .unwrap_or(false)
        }
        None => false,
    };

    if local {
        Ok(())
    } else {
        Err(ConfigureError::NonLocalApiBase(url.to_string()))
    }
}
