//! Local inference providers
//!
//! Each [`Provider`] variant is handled by a dedicated [`ProviderStrategy`]. A strategy
//! does whatever its provider needs (asking for a model, running helper commands,
//! downloading and launching an artifact) and returns the provider-specific half of the
//! configuration. The session merges it with the hardware-derived limits.

mod config;
mod jan;
mod llamafile;
mod lm_studio;
mod ollama;

pub use config::{
    validate_local_url, BackendConfig, BackendConfigurator, ConfigureError, ProviderSettings,
    TokenLimits,
};
pub use jan::JanStrategy;
pub use llamafile::LlamafileStrategy;
pub use lm_studio::LmStudioStrategy;
pub use ollama::{parse_ollama_list, OllamaStrategy, DEFAULT_OLLAMA_MODELS};

use crate::backend::{ArtifactDownloader, HardwareProfile, ModelCatalog, SupervisedProcess};
use crate::config::LocalboxConfig;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::prompt::Prompter;
use crate::runner::CommandRunner;
use crate::session::SetupError;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported local providers, with any choice already made by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Downloadable single-file artifact, supervised by this crate
    Llamafile {
        /// Installed file name or catalog entry to use without asking
        model: Option<String>,
    },
    /// Ollama daemon driven through its CLI
    Ollama { model: Option<String> },
    /// LM Studio server started by the user
    LmStudio,
    /// Jan local API server started by the user
    Jan { model: Option<String> },
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Llamafile { .. } => ProviderKind::Llamafile,
            Provider::Ollama { .. } => ProviderKind::Ollama,
            Provider::LmStudio => ProviderKind::LmStudio,
            Provider::Jan { .. } => ProviderKind::Jan,
        }
    }

    /// Strategy that sets this provider up
    pub fn strategy(&self) -> Box<dyn ProviderStrategy> {
        match self {
            Provider::Llamafile { model } => Box::new(LlamafileStrategy::new(model.clone())),
            Provider::Ollama { model } => Box::new(OllamaStrategy::new(model.clone())),
            Provider::LmStudio => Box::new(LmStudioStrategy),
            Provider::Jan { model } => Box::new(JanStrategy::new(model.clone())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// Provider without payload, for menus and command line flags
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Llamafile,
    Ollama,
    LmStudio,
    Jan,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Ollama,
        ProviderKind::Llamafile,
        ProviderKind::LmStudio,
        ProviderKind::Jan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Llamafile => "Llamafile",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::LmStudio => "LM Studio",
            ProviderKind::Jan => "Jan",
        }
    }

    /// Whether this provider downloads and launches artifacts itself
    pub fn is_artifact_based(&self) -> bool {
        matches!(self, ProviderKind::Llamafile)
    }

    pub fn into_provider(self, model: Option<String>) -> Provider {
        match self {
            ProviderKind::Llamafile => Provider::Llamafile { model },
            ProviderKind::Ollama => Provider::Ollama { model },
            ProviderKind::LmStudio => Provider::LmStudio,
            ProviderKind::Jan => Provider::Jan { model },
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything a strategy may use while setting up its provider
pub struct SetupContext<'a> {
    pub config: &'a LocalboxConfig,
    pub profile: HardwareProfile,
    pub catalog: &'a ModelCatalog,
    pub downloader: &'a ArtifactDownloader,
    pub prompter: &'a dyn Prompter,
    pub runner: &'a dyn CommandRunner,
    pub progress: &'a dyn ProgressHandler,
}

impl SetupContext<'_> {
    pub fn notice(&self, message: impl Into<String>) {
        self.progress.on_progress(&ProgressEvent::Notice {
            message: message.into(),
        });
    }

    /// Ask for one of `choices`; no answer aborts the session
    pub fn select(&self, message: &str, choices: &[String]) -> Result<usize, SetupError> {
        let index = self
            .prompter
            .select(message, choices)
            .ok_or(SetupError::UserAborted)?;

        if index >= choices.len() {
            return Err(SetupError::InvalidInput(format!(
                "No choice at position {}",
                index + 1
            )));
        }
        Ok(index)
    }

    /// Ask for a line of text; no answer aborts the session
    pub fn input(&self, message: &str) -> Result<String, SetupError> {
        self.prompter.input(message).ok_or(SetupError::UserAborted)
    }
}

/// What a strategy hands back to the session
#[derive(Debug)]
pub struct PreparedBackend {
    pub settings: ProviderSettings,
    /// Backend process this crate launched, if any
    pub process: Option<SupervisedProcess>,
}

impl PreparedBackend {
    pub fn external(settings: ProviderSettings) -> Self {
        Self {
            settings,
            process: None,
        }
    }
}

/// Sets up one provider and produces its part of the client configuration
#[async_trait]
pub trait ProviderStrategy: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Run the provider-specific setup. Must not return before the backend is usable.
    async fn prepare(&self, ctx: &SetupContext<'_>) -> Result<PreparedBackend, SetupError>;
}
