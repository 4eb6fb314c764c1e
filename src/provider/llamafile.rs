//! Llamafile: single-file artifacts downloaded and supervised by localbox
//!
//! Flow: check the host toolchain, scan the models directory, let the user pick an
//! installed artifact or download a recommended one, then launch it and wait for the
//! server's readiness line.

use super::{PreparedBackend, ProviderKind, ProviderSettings, ProviderStrategy, SetupContext};
use crate::backend::{
    InstalledArtifact, InstalledModels, ModelCatalog, ModelSpec, ProcessSupervisor,
};
use crate::progress::ProgressEvent;
use crate::session::SetupError;
use async_trait::async_trait;
use tracing::{debug, info};

/// Flags requesting no browser tab and maximum GPU offload
pub const LLAMAFILE_ARGS: [&str; 3] = ["--nobrowser", "-ngl", "9999"];

/// Endpoint the llamafile server binds
pub const LLAMAFILE_API_BASE: &str = "http://localhost:8080/v1";

/// Tells the client to use the local OpenAI-compatible process
pub const LLAMAFILE_MODEL_ID: &str = "openai/local";

const DOWNLOAD_NEW: &str = "Download new model";
const XCODE_INSTALL_URL: &str = "https://developer.apple.com/xcode/";

#[derive(Debug, Default, Clone)]
pub struct LlamafileStrategy {
    model: Option<String>,
}

impl LlamafileStrategy {
    pub fn new(model: Option<String>) -> Self {
        Self { model }
    }

    /// Llamafiles need the Xcode command line tools on macOS
    async fn check_toolchain(&self, ctx: &SetupContext<'_>) -> Result<(), SetupError> {
        if !cfg!(target_os = "macos") {
            return Ok(());
        }

        match ctx.runner.output("xcode-select", &["-p"]).await {
            Ok(output) if output.success() => Ok(()),
            _ => Err(SetupError::ExternalToolMissing {
                tool: "xcode".to_string(),
                install_url: XCODE_INSTALL_URL.to_string(),
            }),
        }
    }

    async fn choose_artifact(
        &self,
        ctx: &SetupContext<'_>,
        installed: &InstalledModels,
    ) -> Result<InstalledArtifact, SetupError> {
        if let Some(wanted) = &self.model {
            return self.resolve_named(ctx, installed, wanted.trim()).await;
        }

        if installed.is_empty() {
            ctx.notice("No models currently downloaded. Please select a new model to download.");
            let spec = self.choose_download(ctx, installed)?;
            return self.download(ctx, spec).await;
        }

        let mut choices: Vec<String> = installed
            .artifacts()
            .iter()
            .map(|a| a.file_name.clone())
            .collect();
        choices.push(DOWNLOAD_NEW.to_string());

        let index = ctx.select("Select a model", &choices)?;
        match installed.artifacts().get(index) {
            Some(artifact) => Ok(artifact.clone()),
            None => {
                let spec = self.choose_download(ctx, installed)?;
                self.download(ctx, spec).await
            }
        }
    }

    /// A preselected model may be an installed file or a catalog entry
    async fn resolve_named(
        &self,
        ctx: &SetupContext<'_>,
        installed: &InstalledModels,
        wanted: &str,
    ) -> Result<InstalledArtifact, SetupError> {
        if let Some(artifact) = installed.get(wanted) {
            return Ok(artifact.clone());
        }

        let spec = ctx
            .catalog
            .find(wanted)
            .or_else(|| ctx.catalog.find_by_name(wanted))
            .ok_or_else(|| {
                SetupError::InvalidInput(format!(
                    "'{}' is neither an installed llamafile nor a catalog model",
                    wanted
                ))
            })?;

        if let Some(artifact) = installed.get(spec.file_name) {
            return Ok(artifact.clone());
        }

        if spec.size_gb > ctx.profile.free_disk_gb {
            return Err(SetupError::NoViableModel {
                free_disk_gb: ctx.profile.free_disk_gb,
            });
        }

        self.download(ctx, spec).await
    }

    fn choose_download(
        &self,
        ctx: &SetupContext<'_>,
        installed: &InstalledModels,
    ) -> Result<&'static ModelSpec, SetupError> {
        let candidates = ctx.catalog.recommend(&ctx.profile, &installed.file_names());
        if candidates.is_empty() {
            return Err(SetupError::NoViableModel {
                free_disk_gb: ctx.profile.free_disk_gb,
            });
        }

        ctx.notice(format!(
            "Your machine has {}. {}",
            ctx.profile,
            ModelCatalog::tier_hint(&ctx.profile).guidance()
        ));

        let labels: Vec<String> = candidates.iter().map(|spec| spec.label()).collect();
        let index = ctx.select("Select a model to download", &labels)?;
        Ok(candidates[index])
    }

    async fn download(
        &self,
        ctx: &SetupContext<'_>,
        spec: &ModelSpec,
    ) -> Result<InstalledArtifact, SetupError> {
        let artifact = ctx
            .downloader
            .download(spec, &ctx.config.models_dir, ctx.progress)
            .await?;
        Ok(artifact)
    }
}

#[async_trait]
impl ProviderStrategy for LlamafileStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Llamafile
    }

    async fn prepare(&self, ctx: &SetupContext<'_>) -> Result<PreparedBackend, SetupError> {
        self.check_toolchain(ctx).await?;

        let models_dir = &ctx.config.models_dir;
        tokio::fs::create_dir_all(models_dir)
            .await
            .map_err(|e| SetupError::io(models_dir, e))?;

        let installed = InstalledModels::scan(models_dir).map_err(|e| SetupError::io(models_dir, e))?;
        debug!(
            "Found {} installed llamafiles in {}",
            installed.len(),
            models_dir.display()
        );

        let artifact = self.choose_artifact(ctx, &installed).await?;
        ctx.progress.on_progress(&ProgressEvent::ModelSelected {
            model: artifact.file_name.clone(),
        });

        info!("Launching {}", artifact.local_path.display());
        let process = ProcessSupervisor::launch(
            &artifact.local_path,
            &LLAMAFILE_ARGS,
            &ctx.config.ready_marker,
            ctx.config.ready_timeout(),
            ctx.progress,
        )
        .await?;

        ctx.notice(format!("Model set to {}", artifact.file_name));

        Ok(PreparedBackend {
            settings: ProviderSettings::new(LLAMAFILE_MODEL_ID)
                .api_base(LLAMAFILE_API_BASE)
                .supports_functions(false)
                .temperature(0.0),
            process: Some(process),
        })
    }
}
