//! Ollama: daemon-managed models driven through the `ollama` CLI

use super::{PreparedBackend, ProviderKind, ProviderSettings, ProviderStrategy, SetupContext};
use crate::progress::ProgressEvent;
use crate::runner::{display_command, CommandError};
use crate::session::SetupError;
use async_trait::async_trait;
use tracing::{debug, info};

const OLLAMA: &str = "ollama";
const OLLAMA_INSTALL_URL: &str = "https://ollama.com/";

/// Offered for download when not installed yet
pub const DEFAULT_OLLAMA_MODELS: [&str; 3] = ["llama3", "phi3", "wizardlm2"];

const DOWNLOAD_PREFIX: &str = "Download ";

/// Model names from `ollama list` output.
///
/// Skips the header row, keeps the first column and drops the implicit `:latest` tag.
pub fn parse_ollama_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| name.trim_end_matches(":latest").to_string())
        .collect()
}

#[derive(Debug, Default, Clone)]
pub struct OllamaStrategy {
    model: Option<String>,
}

impl OllamaStrategy {
    pub fn new(model: Option<String>) -> Self {
        Self { model }
    }

    async fn installed_models(&self, ctx: &SetupContext<'_>) -> Result<Vec<String>, SetupError> {
        let output = ctx
            .runner
            .checked_output(OLLAMA, &["list"])
            .await
            .map_err(missing_tool)?;

        let models = parse_ollama_list(&output.stdout);
        debug!("Ollama has {} models installed", models.len());
        Ok(models)
    }

    async fn pull(&self, ctx: &SetupContext<'_>, model: &str) -> Result<(), SetupError> {
        let args = ["pull", model];
        ctx.progress.on_progress(&ProgressEvent::CommandStarted {
            command: display_command(OLLAMA, &args),
        });
        info!("Pulling {} with ollama", model);

        ctx.runner.status(OLLAMA, &args).await.map_err(missing_tool)
    }
}

fn missing_tool(err: CommandError) -> SetupError {
    match err {
        CommandError::NotFound { program } => SetupError::ExternalToolMissing {
            tool: program,
            install_url: OLLAMA_INSTALL_URL.to_string(),
        },
        other => SetupError::Command(other),
    }
}

#[async_trait]
impl ProviderStrategy for OllamaStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn prepare(&self, ctx: &SetupContext<'_>) -> Result<PreparedBackend, SetupError> {
        let installed = self.installed_models(ctx).await?;

        let model = match &self.model {
            Some(wanted) => {
                let wanted = wanted.trim().trim_end_matches(":latest").to_string();
                if wanted.is_empty() {
                    return Err(SetupError::InvalidInput(
                        "Ollama model name cannot be empty".to_string(),
                    ));
                }
                if !installed.contains(&wanted) {
                    self.pull(ctx, &wanted).await?;
                }
                wanted
            }
            None => {
                let mut choices = installed.clone();
                choices.extend(
                    DEFAULT_OLLAMA_MODELS
                        .iter()
                        .filter(|m| !installed.iter().any(|i| i == *m))
                        .map(|m| format!("{}{}", DOWNLOAD_PREFIX, m)),
                );

                let index = ctx.select("Select a model", &choices)?;
                match index.checked_sub(installed.len()) {
                    None => installed[index].clone(),
                    Some(_) => {
                        let model = choices[index].trim_start_matches(DOWNLOAD_PREFIX).to_string();
                        ctx.notice(format!("Downloading {}...", model));
                        self.pull(ctx, &model).await?;
                        model
                    }
                }
            }
        };

        info!("Using Ollama model {}", model);
        ctx.progress.on_progress(&ProgressEvent::ModelSelected {
            model: model.clone(),
        });

        Ok(PreparedBackend::external(ProviderSettings::new(format!(
            "ollama/{}",
            model
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollama_list() {
        let stdout = "NAME            \tID          \tSIZE  \tMODIFIED\n\
                      llama3:latest   \t365c0bd3c000\t4.7 GB\t2 days ago\n\
                      codellama:7b    \t8fdf8f752f6e\t3.8 GB\t3 weeks ago\n\
                      \n";

        assert_eq!(parse_ollama_list(stdout), vec!["llama3", "codellama:7b"]);
    }

    #[test]
    fn test_parse_ollama_list_header_only() {
        assert!(parse_ollama_list("NAME ID SIZE MODIFIED\n").is_empty());
        assert!(parse_ollama_list("").is_empty());
    }

    #[test]
    fn test_missing_tool_mapping() {
        let err = missing_tool(CommandError::NotFound {
            program: "ollama".to_string(),
        });
        assert!(matches!(
            err,
            SetupError::ExternalToolMissing { ref tool, .. } if tool == "ollama"
        ));

        let err = missing_tool(CommandError::Failed {
            command: "ollama list".to_string(),
            exit_code: Some(1),
            stderr: String::new(),
        });
        assert!(matches!(err, SetupError::Command(_)));
    }
}
