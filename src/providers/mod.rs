/*!
 * Provider implementations for LLM chat services.
 *
 * This module contains client implementations for the LLM services that back
 * the translator and the semantic judge:
 * - OpenAI: OpenAI chat completions, also used for Databricks model serving
 *   endpoints, which speak the same protocol
 * - Anthropic: Anthropic messages API
 * - Mock: scripted provider for tests
 *
 * Providers perform exactly one HTTP attempt per call. Retries, backoff and
 * per-call deadlines belong to the pipeline.
 */

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::app_config::{LlmProviderKind, LlmSettings};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod openai;

/// Provider-agnostic completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System prompt guiding the model
    pub system: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Provider-agnostic completion response
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Prompt tokens, when the provider reports them
    pub input_tokens: Option<u64>,
    /// Completion tokens, when the provider reports them
    pub output_tokens: Option<u64>,
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the translator and the judge.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<CompletionResponse, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.complete(CompletionRequest::new("Reply with OK.").max_tokens(5))
            .await
            .map(|_| ())
    }

    /// Model identifier used for requests
    fn model(&self) -> &str;
}

/// Build the provider described by `settings`
pub fn create_provider(settings: &LlmSettings) -> Result<Arc<dyn Provider>> {
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    match settings.provider {
        LlmProviderKind::OpenAI | LlmProviderKind::Databricks => {
            if settings.api_key.is_empty() {
                return Err(anyhow!("An API key is required for the {} provider", settings.provider));
            }
            Ok(Arc::new(openai::OpenAI::new(
                settings.api_key.clone(),
                settings.resolved_endpoint(),
                settings.model.clone(),
                timeout,
            )))
        }
        LlmProviderKind::Anthropic => {
            if settings.api_key.is_empty() {
                return Err(anyhow!("An API key is required for the anthropic provider"));
            }
            Ok(Arc::new(anthropic::Anthropic::new(
                settings.api_key.clone(),
                settings.resolved_endpoint(),
                settings.model.clone(),
                timeout,
            )))
        }
    }
}

/// Map an HTTP failure status to a provider error
pub(crate) fn error_for_status(status_code: u16, body: String) -> ProviderError {
    match status_code {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        _ => ProviderError::ApiError {
            status_code,
            message: body,
        },
    }
}

/// Map a transport failure to a provider error
pub(crate) fn error_for_transport(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(error.to_string())
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}
