use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

use super::{CompletionRequest, CompletionResponse, Provider, error_for_status, error_for_transport};

/// Client for OpenAI-compatible chat completion APIs
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Base URL, e.g. `https://api.openai.com/v1` or `https://<workspace>/serving-endpoints`
    endpoint: String,
    /// Model or serving endpoint name
    model: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl OpenAIRequest {
    /// Build a chat request from a provider-agnostic completion request
    pub fn from_completion(model: &str, request: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        Self {
            model: model.to_string(),
            messages,
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
        }
    }
}

impl OpenAI {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// Extract the first choice's text
    pub fn extract_text(response: &OpenAIResponse) -> String {
        response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for OpenAI {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = OpenAIRequest::from_completion(&self.model, &request);
        debug!("Sending chat completion to {} (model {})", self.api_url(), self.model);

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(error_for_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Chat completion API error ({}): {}", status, error_text);
            return Err(error_for_status(status.as_u16(), error_text));
        }

        let parsed = response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if parsed.choices.is_empty() {
            return Err(ProviderError::ParseError("response contained no choices".to_string()));
        }

        Ok(CompletionResponse {
            text: Self::extract_text(&parsed),
            input_tokens: parsed.usage.as_ref().map(|usage| usage.prompt_tokens),
            output_tokens: parsed.usage.as_ref().map(|usage| usage.completion_tokens),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
