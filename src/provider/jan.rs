//! Jan: local API server with user-supplied model id

use super::{PreparedBackend, ProviderKind, ProviderSettings, ProviderStrategy, SetupContext};
use crate::progress::ProgressEvent;
use crate::session::SetupError;
use async_trait::async_trait;
use tracing::info;

pub const JAN_API_BASE: &str = "http://localhost:1337/v1";

const INSTRUCTIONS: &str = "To use Jan, run it in the background:
  1. Download Jan from https://jan.ai/ and start it.
  2. Select a language model from the Hub tab, then click Download.
  3. Copy the ID of the model.
  4. Click Local API Server in the bottom left, then click Start Server.";

#[derive(Debug, Default, Clone)]
pub struct JanStrategy {
    model: Option<String>,
}

impl JanStrategy {
    pub fn new(model: Option<String>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ProviderStrategy for JanStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Jan
    }

    async fn prepare(&self, ctx: &SetupContext<'_>) -> Result<PreparedBackend, SetupError> {
        let model = match &self.model {
            Some(model) => model.clone(),
            None => {
                ctx.notice(INSTRUCTIONS);
                ctx.input("Enter the id of the model you have running on Jan")?
            }
        };

        let model = model.trim();
        if model.is_empty() {
            return Err(SetupError::InvalidInput(
                "Jan model id cannot be empty".to_string(),
            ));
        }

        info!("Using Jan model {}", model);
        ctx.progress.on_progress(&ProgressEvent::ModelSelected {
            model: model.to_string(),
        });

        Ok(PreparedBackend::external(
            ProviderSettings::new(format!("jan/{}", model)).api_base(JAN_API_BASE),
        ))
    }
}
