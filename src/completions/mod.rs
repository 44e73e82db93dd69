// ABOUTME: Suggestion completion service bridging conversations to the LLM provider
// ABOUTME: Assembles context, resolves per-conversation overrides, and runs completions
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Completions
//!
//! The completion service turns a conversation into provider calls. It owns
//! the shared recipe every AI touchpoint uses: load the recent window, build
//! the labeled context, resolve the model and API key overrides, then run a
//! one-shot or streaming completion. The caption orchestrator, the manual
//! respond endpoint, and message auto-replies all go through here so they
//! cannot drift apart.
//!
//! The running-summary maintenance lives in [`summary`]; it shares the
//! resolution helpers from [`context`] but drives its own prompt.

pub mod context;
pub mod summary;

pub use context::{
    active_summary, build_context, context_window_size, conversation_api_key, resolve_model,
};
pub use summary::SummaryService;

use std::sync::Arc;

use crate::config::AiConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::{ChatRequest, ChatStream, LlmProvider};
use crate::models::Conversation;

/// Runs suggestion completions against the configured provider
#[derive(Clone)]
pub struct CompletionService {
    database: Arc<Database>,
    provider: Arc<dyn LlmProvider>,
    config: AiConfig,
}

impl CompletionService {
    /// Create a completion service over the given provider
    #[must_use]
    pub fn new(database: Arc<Database>, provider: Arc<dyn LlmProvider>, config: AiConfig) -> Self {
        Self {
            database,
            provider,
            config,
        }
    }

    /// Provider identifier for log and error context
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// One-shot suggested reply for the conversation's current state
    ///
    /// # Errors
    ///
    /// Returns an error when history cannot be loaded, the provider call
    /// fails, or the provider returns only whitespace.
    pub async fn suggested_reply(&self, conversation: &Conversation) -> AppResult<String> {
        let request = self.suggestion_request(conversation).await?;
        let response = self.provider.complete(&request).await?;

        let content = response.content.trim();
        if content.is_empty() {
            return Err(AppError::provider(
                self.provider.name(),
                "AI returned an empty response",
            ));
        }
        Ok(content.to_owned())
    }

    /// Open a streaming completion for a suggested reply
    ///
    /// # Errors
    ///
    /// Returns an error when history cannot be loaded or the stream cannot
    /// be opened. Chunk-level failures surface through the stream itself.
    pub async fn suggested_reply_stream(
        &self,
        conversation: &Conversation,
    ) -> AppResult<ChatStream> {
        let request = self.suggestion_request(conversation).await?.with_streaming();
        self.provider.complete_stream(&request).await
    }

    /// Build the provider request: windowed context plus resolved overrides
    async fn suggestion_request(&self, conversation: &Conversation) -> AppResult<ChatRequest> {
        let window = context_window_size(active_summary(conversation).is_some(), &self.config);
        let history = self
            .database
            .recent_messages(&conversation.id, window)
            .await?;

        let messages = build_context(conversation, &history, &self.config);
        let mut request =
            ChatRequest::new(messages).with_model(resolve_model(conversation, &self.config));
        if let Some(key) = conversation_api_key(conversation) {
            request = request.with_api_key(key);
        }
        Ok(request)
    }
}
