//! Chat Completions provider shared by every supported backend.
//!
//! Zhipu, Qwen (DashScope compatible mode) and OpenAI all accept the same
//! `/chat/completions` body and answer with `choices[0].message.content`.
//! The only per-backend difference, the auth header, comes from the
//! resolved [`Dialect`](crate::inference::Dialect).

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::inference::{
    CompletionProvider, CompletionRequest, ConversationTurn, ProviderConfig, ProviderError,
};

/// Returned when a successful response carries no usable content.
pub const FALLBACK_REPLY: &str = "I apologize, I did not understand that.";

// ============================================================================
// Chat Completions API Types
// ============================================================================

/// The request body for the Chat Completions API
#[derive(Serialize, Debug)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pulls the first choice's content, substituting the fallback sentence
/// when it is missing or empty.
fn first_choice_content(response: ChatCompletionsResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty())
        .unwrap_or_else(|| {
            warn!("Completion response had no content, using fallback reply");
            FALLBACK_REPLY.to_string()
        })
}

// ============================================================================
// Provider Implementation
// ============================================================================

pub struct ChatCompletionsProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Builds a provider whose HTTP client gives up after `timeout`.
    pub fn with_timeout(config: ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("HTTP client setup failed: {e}")))?;
        Ok(Self { config, client })
    }

    /// Sends a request to the completions endpoint and returns the response.
    async fn send_request(
        &self,
        api_key: &str,
        request: &ChatCompletionsRequest<'_>,
    ) -> Result<reqwest::Response, ProviderError> {
        let builder = self
            .client
            .post(self.config.completions_url())
            .header("Content-Type", "application/json")
            .json(request);

        let response = self
            .config
            .dialect
            .authorize(builder, api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        debug!("{} response status: {}", self.config.id, response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("{} API error: {} - {}", self.config.id, status, err_body);
            return Err(ProviderError::Api {
                status,
                message: err_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        self.config.id.as_str()
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        let api_key = self.config.credential.as_deref().ok_or_else(|| {
            ProviderError::Config(format!(
                "{} API key not configured (set {})",
                self.config.id,
                self.config.id.credential_env_var()
            ))
        })?;

        let body = ChatCompletionsRequest {
            model: request.model,
            messages: request.turns,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        info!(
            "{} chat completion request: model={}, message_count={}, temperature={}, max_tokens={}",
            self.config.id,
            request.model,
            request.turns.len(),
            request.temperature,
            request.max_tokens
        );

        let response = self.send_request(api_key, &body).await?;

        let parsed: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(first_choice_content(parsed))
    }
}
