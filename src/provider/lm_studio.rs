//! LM Studio: a server the user starts from the LM Studio app

use super::{PreparedBackend, ProviderKind, ProviderSettings, ProviderStrategy, SetupContext};
use crate::session::SetupError;
use async_trait::async_trait;
use tracing::info;

pub const LM_STUDIO_API_BASE: &str = "http://localhost:1234/v1";

/// LM Studio serves whatever model is loaded in the app
pub const LM_STUDIO_MODEL_ID: &str = "openai/local-model";

/// The server ignores the key but OpenAI clients refuse an empty one
pub const PLACEHOLDER_API_KEY: &str = "x";

const INSTRUCTIONS: &str = "To use LM Studio, run it in the background:
  1. Download LM Studio from https://lmstudio.ai/ and start it.
  2. Select a language model, then click Download.
  3. Open the local server tab (the <-> button).
  4. Select your model at the top, then click Start Server.";

#[derive(Debug, Default, Clone, Copy)]
pub struct LmStudioStrategy;

#[async_trait]
impl ProviderStrategy for LmStudioStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LmStudio
    }

    async fn prepare(&self, ctx: &SetupContext<'_>) -> Result<PreparedBackend, SetupError> {
        ctx.notice(INSTRUCTIONS);
        info!("Using LM Studio at {}", LM_STUDIO_API_BASE);

        Ok(PreparedBackend::external(
            ProviderSettings::new(LM_STUDIO_MODEL_ID)
                .api_base(LM_STUDIO_API_BASE)
                .api_key(PLACEHOLDER_API_KEY)
                .supports_functions(false),
        ))
    }
}
