//! Setup sessions
//!
//! A [`LocalSetup`] drives one session from provider choice to exactly one
//! [`BackendConfig`]. Steps run strictly in order: profile the host, let the provider's
//! strategy prepare the backend, then merge its settings with the hardware-derived token
//! limits. No partially configured state is ever returned.
//!
//! # Example
//!
//! ```no_run
//! use localbox::session::LocalSetup;
//! use localbox::provider::Provider;
//! use localbox::LocalboxConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let outcome = LocalSetup::new(LocalboxConfig::default())
//!     .run(Provider::Llamafile { model: None })
//!     .await?;
//!
//! println!("{}", outcome.config);
//! if let Some(process) = outcome.process {
//!     println!("Backend running as pid {}", process.pid());
//! }
//! # Ok(())
//! # }
//! ```

use crate::backend::{
    ArtifactDownloader, DownloadError, HardwareProfile, HardwareProfiler, ModelCatalog,
    SupervisedProcess, SupervisorError,
};
use crate::config::{ConfigError, LocalboxConfig};
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};
use crate::prompt::{Prompter, StdinPrompter};
use crate::provider::{
    BackendConfig, BackendConfigurator, ConfigureError, Provider, ProviderKind, SetupContext,
};
use crate::runner::{CommandError, CommandRunner, SystemCommandRunner};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a session ended without a configuration
#[derive(Debug, Error)]
pub enum SetupError {
    /// No catalog model fits on this machine. The caller should offer another provider.
    #[error("No local model fits on this machine ({free_disk_gb:.2}GB of free storage space)")]
    NoViableModel { free_disk_gb: f64 },

    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Launch failure or readiness timeout. The child has already been terminated.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// A provider needs a tool that is not installed
    #[error("{tool} is not installed or not recognized as a command")]
    ExternalToolMissing { tool: String, install_url: String },

    #[error(transparent)]
    Command(#[from] CommandError),

    /// The user gave no answer at a selection step
    #[error("Setup cancelled")]
    UserAborted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Configure(#[from] ConfigureError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SetupError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        SetupError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Guidance for the user, when there is something they can do
    pub fn help_message(&self) -> Option<String> {
        match self {
            SetupError::NoViableModel { .. } => Some(
                "Free up disk space for a local model, or choose a provider that manages its own models."
                    .to_string(),
            ),
            SetupError::Download(_) => Some(
                "Check your network connection and try again, or choose a smaller model."
                    .to_string(),
            ),
            SetupError::Supervisor(SupervisorError::ReadinessTimeout { .. }) => Some(
                "The model did not start in time. Increase --timeout or LOCALBOX_READY_TIMEOUT."
                    .to_string(),
            ),
            SetupError::Supervisor(_) => Some(
                "The model file may be corrupted. Delete it with `localbox models delete` and download it again."
                    .to_string(),
            ),
            SetupError::ExternalToolMissing { tool, install_url } => Some(format!(
                "Please visit {} to install {} and try again.",
                install_url, tool
            )),
            SetupError::Command(CommandError::Failed { .. }) => {
                Some("Make sure the provider's daemon is running and try again.".to_string())
            }
            _ => None,
        }
    }

    /// Process exit status for this outcome. Aborting is a clean exit.
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::UserAborted => 0,
            _ => 1,
        }
    }
}

/// Result of a successful session
#[derive(Debug)]
pub struct SetupOutcome {
    pub provider: ProviderKind,
    pub profile: HardwareProfile,
    pub config: BackendConfig,
    /// Backend launched by this session. Dropping it kills the backend.
    pub process: Option<SupervisedProcess>,
}

/// Drives setup sessions with injectable collaborators
pub struct LocalSetup {
    config: LocalboxConfig,
    catalog: ModelCatalog,
    progress: Arc<dyn ProgressHandler>,
    prompter: Arc<dyn Prompter>,
    runner: Arc<dyn CommandRunner>,
    profile: Option<HardwareProfile>,
}

impl LocalSetup {
    /// Session using stdin prompts, real commands and tracing output
    pub fn new(config: LocalboxConfig) -> Self {
        Self {
            config,
            catalog: ModelCatalog::builtin(),
            progress: Arc::new(LoggingHandler),
            prompter: Arc::new(StdinPrompter),
            runner: Arc::new(SystemCommandRunner),
            profile: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Use a fixed profile instead of reading the host
    pub fn with_profile(mut self, profile: HardwareProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn config(&self) -> &LocalboxConfig {
        &self.config
    }

    /// Hardware profile for this session
    pub fn profile(&self) -> HardwareProfile {
        self.profile
            .unwrap_or_else(|| HardwareProfiler::profile(&self.config.models_dir))
    }

    /// Ask the user for a provider, leaving out `excluded`
    pub fn select_provider(&self, excluded: &[ProviderKind]) -> Result<Provider, SetupError> {
        let kinds: Vec<ProviderKind> = ProviderKind::ALL
            .into_iter()
            .filter(|kind| !excluded.contains(kind))
            .collect();
        let labels: Vec<String> = kinds.iter().map(|k| k.name().to_string()).collect();

        let index = self
            .prompter
            .select("Select a provider", &labels)
            .ok_or(SetupError::UserAborted)?;

        let kind = kinds.get(index).copied().ok_or_else(|| {
            SetupError::InvalidInput(format!("No provider at position {}", index + 1))
        })?;
        debug!("Provider selected: {}", kind);
        Ok(kind.into_provider(None))
    }

    /// Run one session for `provider`
    pub async fn run(&self, provider: Provider) -> Result<SetupOutcome, SetupError> {
        self.config.validate()?;

        info!("Setting up {}", provider);
        let profile = self.profile();
        self.progress
            .on_progress(&ProgressEvent::HardwareProfiled { profile });

        let downloader = ArtifactDownloader::new(self.config.download_timeout())?;
        let ctx = SetupContext {
            config: &self.config,
            profile,
            catalog: &self.catalog,
            downloader: &downloader,
            prompter: self.prompter.as_ref(),
            runner: self.runner.as_ref(),
            progress: self.progress.as_ref(),
        };

        let strategy = provider.strategy();
        let prepared = match strategy.prepare(&ctx).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("{} setup failed: {}", provider, e);
                return Err(e);
            }
        };

        let config = match BackendConfigurator::configure(prepared.settings, &profile) {
            Ok(config) => config,
            Err(e) => {
                if let Some(process) = prepared.process {
                    process.terminate().await;
                }
                return Err(e.into());
            }
        };

        info!(
            model = %config.model_id,
            max_tokens = config.max_tokens,
            context_window = config.context_window,
            "{} configured",
            provider
        );

        Ok(SetupOutcome {
            provider: provider.kind(),
            profile,
            config,
            process: prepared.process,
        })
    }
}
