// ABOUTME: OpenAI-compatible chat completion provider for cloud and local endpoints
// ABOUTME: Implements non-streaming and SSE streaming against {base_url}/chat/completions
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # `OpenAI`-Compatible Provider
//!
//! Speaks the `OpenAI` chat completions wire format against a configurable
//! base URL, which covers the hosted `OpenAI` API as well as self-hosted
//! servers like Ollama and vLLM.
//!
//! API keys resolve per request: an override on the [`ChatRequest`] (user
//! or conversation key) wins over the key configured on the provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::sse_parser::{
    create_sse_stream, is_retryable_request_error, is_retryable_status, RetryConfig,
};
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider, StreamChunk,
    TokenUsage,
};
use crate::config::AiConfig;
use crate::errors::AppError;

/// Provider identifier used in logs and error messages
const PROVIDER_NAME: &str = "openai";

/// Connection timeout for the upstream endpoint
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Overall timeout for non-streaming completions
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Wire Types (OpenAI-compatible format)
// ============================================================================

/// Chat completions request body
#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Message structure on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// Chat completions response body
#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Streaming chunk payload
#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Error response body
#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for the `OpenAI`-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API (e.g., <https://api.openai.com/v1>)
    pub base_url: String,
    /// Server-level API key; requests may override it
    pub api_key: Option<String>,
    /// Default model when neither request nor conversation names one
    pub default_model: String,
}

impl From<&AiConfig> for OpenAiCompatibleConfig {
    fn from(config: &AiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            default_model: config.default_model.clone(),
        }
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// `OpenAI`-compatible LLM provider
///
/// Works with any endpoint implementing the `OpenAI` chat completions API.
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, AppError> {
        // No overall timeout on the client itself: streaming responses may
        // legitimately outlive any fixed budget. Non-streaming requests get
        // a per-request timeout instead.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a provider from AI configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn from_ai_config(config: &AiConfig) -> Result<Self, AppError> {
        Self::new(OpenAiCompatibleConfig::from(config))
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Resolve the API key for one request; request override wins
    fn effective_api_key<'a>(&'a self, request: &'a ChatRequest) -> Result<&'a str, AppError> {
        request
            .api_key
            .as_deref()
            .or(self.config.api_key.as_deref())
            .ok_or_else(|| AppError::invalid_input("Missing AI API key"))
    }

    fn build_wire_request(&self, request: &ChatRequest, stream: bool) -> WireRequest {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);

        WireRequest {
            model: model.to_owned(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: stream.then_some(true),
        }
    }

    /// Send a request, retrying transient failures before any bytes flow
    async fn send_request(
        &self,
        builder: &reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AppError> {
        let retry = RetryConfig::default_config();
        let mut attempt = 0_u32;

        loop {
            let request = builder.try_clone().ok_or_else(|| {
                AppError::internal("AI request body is not replayable".to_owned())
            })?;

            match request.send().await {
                Ok(response)
                    if attempt < retry.max_retries
                        && is_retryable_status(response.status().as_u16()) =>
                {
                    let status = response.status();
                    attempt += 1;
                    let delay = retry.delay_for_attempt(attempt);
                    warn!(
                        "AI request returned {status}, retrying in {delay:?} (attempt {attempt})"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => return Ok(response),
                Err(e) if attempt < retry.max_retries && is_retryable_request_error(&e) => {
                    attempt += 1;
                    let delay = retry.delay_for_attempt(attempt);
                    warn!("AI request failed ({e}), retrying in {delay:?} (attempt {attempt})");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(self.transport_error(&e)),
            }
        }
    }

    fn transport_error(&self, e: &reqwest::Error) -> AppError {
        if e.is_connect() {
            AppError::provider(
                PROVIDER_NAME,
                format!("Cannot connect to AI backend at {}", self.config.base_url),
            )
        } else if e.is_timeout() {
            AppError::provider(PROVIDER_NAME, format!("AI request timed out: {e}"))
        } else {
            AppError::provider(PROVIDER_NAME, format!("AI request failed: {e}"))
        }
    }

    /// Map a non-success response to an error, preserving the upstream
    /// status and any server-supplied detail
    fn status_error(status: reqwest::StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<WireErrorResponse>(body)
            .ok()
            .map(|e| e.error.message);

        let message = detail.map_or_else(
            || format!("AI request failed with status {}", status.as_u16()),
            |msg| format!("AI request failed with status {}: {msg}", status.as_u16()),
        );
        AppError::provider(PROVIDER_NAME, message)
    }

    /// Parse one streaming SSE payload into a chunk
    ///
    /// Unparseable payloads are skipped with a warning rather than killing
    /// the stream.
    fn parse_stream_payload(payload: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<WireStreamChunk>(payload) {
            Ok(chunk) => {
                let choice = chunk.choices.into_iter().next()?;
                Some(Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                }))
            }
            Err(e) => {
                warn!("Skipping unparseable AI stream payload: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &'static str {
        "OpenAI-compatible"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.default_model)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let api_key = self.effective_api_key(request)?;
        let wire_request = self.build_wire_request(request, false);

        debug!(
            "Sending completion request with {} messages",
            wire_request.messages.len()
        );

        let builder = self
            .client
            .post(self.api_url("chat/completions"))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .bearer_auth(api_key)
            .json(&wire_request);

        let response = self.send_request(&builder).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &body));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider(PROVIDER_NAME, format!("Invalid AI response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::provider(PROVIDER_NAME, "AI returned an empty response"))?;

        let content = choice
            .message
            .content
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::provider(PROVIDER_NAME, "AI returned an empty response"))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Completion finished"
            );
        }

        Ok(ChatResponse {
            content,
            model: parsed.model.unwrap_or_else(|| wire_request.model),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.default_model)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let api_key = self.effective_api_key(request)?;
        let wire_request = self.build_wire_request(request, true);

        debug!(
            "Opening completion stream with {} messages",
            wire_request.messages.len()
        );

        let builder = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(api_key)
            .json(&wire_request);

        let response = self.send_request(&builder).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &body));
        }

        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_stream_payload,
            PROVIDER_NAME,
        ))
    }
}
