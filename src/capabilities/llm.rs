//! [`AiService`] over an `edgequake-llm` provider.
//!
//! OCR sends the rendered PNG as a base64 image part with a transcription
//! prompt. Feedback is a text-only chat: the prompt already carries the
//! extracted resume text, so the stored PDF path is only logged.

use super::AiService;
use crate::config::AnalyzerConfig;
use crate::error::{CapabilityError, ResumindError};
use crate::model::FileArtifact;
use crate::pipeline::encode::to_image_data;
use crate::pipeline::feedback::FeedbackResponse;
use crate::pipeline::postprocess::clean_ocr_text;
use crate::prompts::{FEEDBACK_SYSTEM_PROMPT, OCR_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Vision + text analyst backed by one LLM provider.
#[derive(Clone)]
pub struct LlmAnalyst {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    ocr_prompt: String,
    feedback_prompt: String,
}

impl fmt::Debug for LlmAnalyst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmAnalyst")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmAnalyst {
    /// Analyst with default prompts and sampling options.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let defaults = AnalyzerConfig::default();
        Self {
            provider,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            ocr_prompt: OCR_SYSTEM_PROMPT.to_string(),
            feedback_prompt: FEEDBACK_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Resolve the provider from `config` and apply its prompt and
    /// sampling settings.
    pub async fn from_config(config: &AnalyzerConfig) -> Result<Self, ResumindError> {
        let provider = resolve_provider(config).await?;
        Ok(Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            ocr_prompt: config
                .ocr_prompt
                .clone()
                .unwrap_or_else(|| OCR_SYSTEM_PROMPT.to_string()),
            feedback_prompt: config
                .feedback_prompt
                .clone()
                .unwrap_or_else(|| FEEDBACK_SYSTEM_PROMPT.to_string()),
        })
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    fn ocr_messages(&self, image: &FileArtifact) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&self.ocr_prompt),
            ChatMessage::user_with_images("", vec![to_image_data(&image.bytes)]),
        ]
    }

    fn feedback_messages(&self, prompt: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&self.feedback_prompt),
            ChatMessage::user(prompt),
        ]
    }
}

#[async_trait]
impl AiService for LlmAnalyst {
    async fn img2txt(&self, image: &FileArtifact) -> Result<String, CapabilityError> {
        let start = Instant::now();
        let response = self
            .provider
            .chat(&self.ocr_messages(image), Some(&self.options()))
            .await
            .map_err(|e| CapabilityError::Provider(e.to_string()))?;

        debug!(
            "OCR: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(clean_ocr_text(&response.content))
    }

    async fn feedback(
        &self,
        resume_path: &str,
        prompt: &str,
    ) -> Result<FeedbackResponse, CapabilityError> {
        let start = Instant::now();
        debug!("Requesting feedback for {}", resume_path);

        match self
            .provider
            .chat(&self.feedback_messages(prompt), Some(&self.options()))
            .await
        {
            Ok(response) => {
                debug!(
                    "Feedback: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                if response.content.trim().is_empty() {
                    return Ok(FeedbackResponse {
                        success: true,
                        error: None,
                        message: None,
                    });
                }
                Ok(FeedbackResponse::text(response.content))
            }
            Err(e) => {
                warn!("Feedback request failed: {}", e);
                Ok(FeedbackResponse::failure(e.to_string()))
            }
        }
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ResumindError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ResumindError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    both non-empty.
/// 4. **`OPENAI_API_KEY`** present: OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub async fn resolve_provider(
    config: &AnalyzerConfig,
) -> Result<Arc<dyn LLMProvider>, ResumindError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ResumindError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
