//! Model service and providers
//!
//! The assistant only needs one operation from a language model: answer a
//! user text under a system prompt. [`ModelService`] is that seam;
//! [`OpenAiModelService`] implements it for any OpenAI-compatible API.

mod common;

use crate::config::AssistantSettings;
use async_openai::{config::OpenAIConfig, types::chat::CreateChatCompletionRequestArgs, Client};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors that can occur during model calls
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Rate limit exceeded (429), optionally with a wait time
    #[error("Rate limit exceeded: {message} (wait: {wait_secs:?}s)")]
    RateLimit {
        /// Retry-After duration in seconds, if provided by the server
        wait_secs: Option<u64>,
        /// Error message from the server
        message: String,
    },
    /// The provider answered without any text
    #[error("Empty response")]
    EmptyResponse,
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Interface for the language model behind the assistant
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Answer `user_text` under `system_prompt`. The returned text is trimmed.
    async fn ask(&self, system_prompt: &str, user_text: &str) -> Result<String, LlmError>;
}

/// Model service backed by an OpenAI-compatible chat completions API
pub struct OpenAiModelService {
    client: Client<OpenAIConfig>,
    model_id: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiModelService {
    /// Create a model service from explicit parameters
    #[must_use]
    pub fn new(
        api_key: &str,
        api_base: &str,
        model_id: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model_id: model_id.to_string(),
            max_tokens,
            temperature,
        }
    }

    /// Create a model service from settings
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingConfig` if no API key is configured.
    pub fn from_settings(settings: &AssistantSettings) -> Result<Self, LlmError> {
        let api_key = settings
            .openai_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| LlmError::MissingConfig("OPENAI_API_KEY is missing".into()))?;

        Ok(Self::new(
            api_key,
            &settings.openai_api_base,
            &settings.model_id,
            settings.model_max_tokens,
            settings.model_temperature,
        ))
    }

    /// Model identifier requests are sent to
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl ModelService for OpenAiModelService {
    #[instrument(skip_all, fields(model = %self.model_id))]
    async fn ask(&self, system_prompt: &str, user_text: &str) -> Result<String, LlmError> {
        let messages = common::build_messages(system_prompt, user_text)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model_id.as_str())
            .messages(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            let error = common::classify_openai_error(&e);
            warn!("Model request failed: {error}");
            error
        })?;

        let text = common::extract_text(&response)?;
        debug!("Model replied with {} chars", text.chars().count());
        Ok(text)
    }
}
