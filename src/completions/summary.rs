// ABOUTME: Running-summary maintenance for long conversations
// ABOUTME: Folds new turns into a compact summary so context windows stay small

//! # Running Summary
//!
//! Long interviews outgrow any context window. After each committed caption
//! the orchestrator triggers a summary pass: new turns since the last pass
//! are numbered, labeled, and handed to the provider together with the
//! existing summary, which rewrites it in place.
//!
//! The pass is deliberately quiet. No API key, an empty window, too few new
//! turns, or a blank provider answer all leave the stored summary untouched;
//! only provider and database failures bubble up, and callers treat those as
//! log-and-continue.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::context::{active_summary, conversation_api_key, resolve_model};
use crate::config::AiConfig;
use crate::constants::prompts;
use crate::database::Database;
use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{Conversation, Message, MessageRole};

/// Maintains each conversation's running summary
#[derive(Clone)]
pub struct SummaryService {
    database: Arc<Database>,
    provider: Arc<dyn LlmProvider>,
    config: AiConfig,
}

impl SummaryService {
    /// Create a summary service over the given provider
    #[must_use]
    pub fn new(database: Arc<Database>, provider: Arc<dyn LlmProvider>, config: AiConfig) -> Self {
        Self {
            database,
            provider,
            config,
        }
    }

    /// Fold new turns into the running summary when warranted
    ///
    /// # Errors
    ///
    /// Returns an error when the window cannot be loaded, the provider call
    /// fails, or persisting the refreshed summary fails.
    pub async fn refresh(&self, conversation: &Conversation) -> AppResult<()> {
        if conversation_api_key(conversation).is_none() && self.config.api_key.is_none() {
            debug!(
                conversation_id = %conversation.id,
                "summary pass skipped, no API key available"
            );
            return Ok(());
        }

        let window = self.window(conversation).await?;
        if window.is_empty() {
            return Ok(());
        }
        if !should_regenerate(
            active_summary(conversation),
            window.len(),
            self.config.summary_trigger_count,
        ) {
            debug!(
                conversation_id = %conversation.id,
                pending = window.len(),
                "summary pass skipped, below regeneration threshold"
            );
            return Ok(());
        }

        let request = self.build_request(conversation, &window);
        let response = self.provider.complete(&request).await?;

        let summary = response.content.trim();
        if summary.is_empty() {
            debug!(
                conversation_id = %conversation.id,
                "summary pass produced no text, keeping previous summary"
            );
            return Ok(());
        }

        let Some(last) = window.last() else {
            return Ok(());
        };
        self.database
            .update_conversation_summary(&conversation.id, summary, &last.id, Utc::now())
            .await?;

        info!(
            conversation_id = %conversation.id,
            folded = window.len(),
            "running summary refreshed"
        );
        Ok(())
    }

    /// New turns since the last summary pass, oldest first
    ///
    /// The update-time watermark wins over the message-id cursor; rows
    /// rewritten by the merge engine re-enter the window that way.
    async fn window(&self, conversation: &Conversation) -> AppResult<Vec<Message>> {
        let limit = self.config.summary_max_messages;

        if let Some(watermark) = conversation.ai_summary_updated_at {
            return self
                .database
                .messages_updated_after(&conversation.id, watermark, limit)
                .await;
        }
        if let Some(cursor) = conversation.ai_summary_message_id.as_deref() {
            return self
                .database
                .messages_after_id(&conversation.id, cursor, limit)
                .await;
        }

        let mut all = self.database.list_messages(&conversation.id).await?;
        all.truncate(limit);
        Ok(all)
    }

    fn build_request(&self, conversation: &Conversation, window: &[Message]) -> ChatRequest {
        let mut messages = vec![ChatMessage::system(prompts::SUMMARY_SYSTEM_PROMPT)];
        if let Some(existing) = active_summary(conversation) {
            messages.push(ChatMessage::system(format!(
                "Existing summary:\n{existing}"
            )));
        }
        messages.push(ChatMessage::user(build_summary_input(window)));

        let mut request =
            ChatRequest::new(messages).with_model(self.resolve_summary_model(conversation));
        if let Some(key) = conversation_api_key(conversation) {
            request = request.with_api_key(key);
        }
        request
    }

    /// Summary calls may run on a cheaper model than suggestions
    fn resolve_summary_model<'a>(&'a self, conversation: &'a Conversation) -> &'a str {
        self.config
            .summary_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| resolve_model(conversation, &self.config))
    }
}

/// A missing summary is always built; an existing one waits for enough turns
fn should_regenerate(existing_summary: Option<&str>, pending: usize, trigger: usize) -> bool {
    existing_summary.is_none() || pending >= trigger
}

const fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Assistant => "Assistant",
        MessageRole::Interviewer => "Interviewer",
        MessageRole::User => "Candidate",
        MessageRole::System => "System",
    }
}

fn build_summary_input(window: &[Message]) -> String {
    let turns = window
        .iter()
        .enumerate()
        .map(|(index, message)| {
            format!(
                "{}. {}: {}",
                index + 1,
                role_label(message.role),
                message.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Update the running summary with the following new conversation turns.\n\
         If the new turns contradict the previous summary, prefer the new turns.\n\
         \n\
         New turns:\n\
         {turns}\n"
    )
}
