//! The direct assistant: builds Eliza's prompt and calls the generative model
//! with the caller's API key.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::constants;
use crate::context::ConversationContext;
use crate::error::AssistantError;
use crate::gemini::{GeminiModel, GenerationConfig};
use crate::keys::{ApiKeyProvider, KeyStatus};
use crate::knowledge::KnowledgeBase;
use crate::prompt;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_base: String,
    pub model: String,
    pub generation: GenerationConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: constants::GEMINI_API_BASE.clone(),
            model: constants::ELIZA_GEMINI_MODEL.clone(),
            generation: GenerationConfig::default(),
        }
    }
}

pub struct ElizaAssistant {
    config: AssistantConfig,
    keys: Arc<dyn ApiKeyProvider>,
    knowledge: KnowledgeBase,
    // Built from the first key seen and kept for the lifetime of the assistant.
    model: OnceCell<GeminiModel>,
}

impl ElizaAssistant {
    pub fn new(config: AssistantConfig, keys: Arc<dyn ApiKeyProvider>, knowledge: KnowledgeBase) -> Self {
        Self {
            config,
            keys,
            knowledge,
            model: OnceCell::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.keys.current_api_key().is_some()
    }

    pub fn key_status(&self) -> KeyStatus {
        self.keys.key_status()
    }

    async fn model(&self) -> Result<&GeminiModel, AssistantError> {
        self.model
            .get_or_try_init(|| async {
                let key = self
                    .keys
                    .current_api_key()
                    .ok_or(AssistantError::MissingApiKey)?;
                info!(model = %self.config.model, "Initializing generative model client");
                Ok::<_, AssistantError>(
                    GeminiModel::new(key, &self.config.api_base, &self.config.model)
                        .with_config(self.config.generation),
                )
            })
            .await
    }

    /// Generates Eliza's reply to `user_input`.
    #[instrument(skip_all, fields(input_chars = user_input.len()))]
    pub async fn generate_response(
        &self,
        user_input: &str,
        context: &ConversationContext,
    ) -> Result<String, AssistantError> {
        let model = self.model().await?;

        let knowledge = self.knowledge.relevant(user_input);
        let prompt = prompt::build_direct_prompt(user_input, context, &knowledge);
        debug!(knowledge_hits = knowledge.len(), %prompt, "Constructed Eliza prompt");

        let text = match model.generate_content(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                if e.is_key_problem() {
                    self.keys.mark_key_as_failed();
                }
                warn!(error = %e, "Eliza generation failed");
                return Err(e);
            }
        };

        let reply = text.trim();
        if reply.is_empty() {
            warn!("Model returned an empty reply");
            return Err(AssistantError::EmptyResponse);
        }

        self.keys.mark_key_as_working();
        Ok(reply.to_string())
    }
}
