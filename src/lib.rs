//! localbox - hardware-aware setup of local LLM inference backends
//!
//! This library configures a locally running large-language-model backend for a host
//! application instead of a cloud API. It profiles the machine, recommends downloadable
//! model artifacts that fit, downloads them, launches them as supervised server processes
//! and produces a [`BackendConfig`] describing how to reach the backend.
//!
//! # Core Concepts
//!
//! - **Artifact**: a single downloadable, locally executable file bundling a model and a
//!   minimal inference server (a llamafile)
//! - **Provider**: where inference comes from (llamafile artifact, Ollama, LM Studio, Jan)
//! - **Readiness marker**: a substring the artifact prints once its HTTP listener is bound
//! - **Session**: one run of [`LocalSetup`] that ends with exactly one [`BackendConfig`]
//!
//! # Example Usage
//!
//! ```no_run
//! use localbox::{LocalSetup, LocalboxConfig, Provider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let setup = LocalSetup::new(LocalboxConfig::default());
//! let outcome = setup.run(Provider::LmStudio).await?;
//! println!("api_base: {:?}", outcome.config.api_base);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`backend`]: hardware profiling, catalog, downloads and process supervision
//! - [`provider`]: provider strategies and the resulting client configuration
//! - [`session`]: drives a whole setup session

pub mod backend;
pub mod cli;
pub mod config;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod runner;
pub mod session;
pub mod util;

pub use backend::{
    ArtifactDownloader, DownloadError, HardwareProfile, HardwareProfiler, InstalledArtifact,
    InstalledModels, ModelCatalog, ModelSpec, ProcessSupervisor, SupervisedProcess,
    SupervisorError, Tier,
};
pub use config::{ConfigError, LocalboxConfig};
pub use provider::{BackendConfig, ConfigureError, Provider, ProviderStrategy, TokenLimits};
pub use session::{LocalSetup, SetupError, SetupOutcome};
pub use util::{init_default, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
