// ABOUTME: Caption pipeline orchestrator driving merge, gating, suggestion, and summary
// ABOUTME: Provides the batch outcome API and the streaming event generator

//! # Caption Orchestrator
//!
//! Drives one caption submission through the full pipeline: merge the
//! caption into the transcript, decide whether it earns an AI suggestion,
//! generate and persist that suggestion, then give the running summary a
//! chance to fold in new turns.
//!
//! Two entry points share the pipeline. [`CaptionPipeline::process`] serves
//! the batch endpoint and resolves to a single [`CaptionOutcome`].
//! [`CaptionPipeline::stream`] serves the SSE endpoint and narrates the same
//! steps as [`CaptionEvent`]s, ending with `done` no matter how earlier
//! stages exited. Suggestion faults never take the committed caption down
//! with them; they surface on the error channel instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::classifier::is_question_like;
use super::gates;
use super::merge::merge_caption;
use super::normalizer::NormalizedCaption;
use crate::completions::{CompletionService, SummaryService};
use crate::config::CaptionConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::locks::{suggestion_lock_key, LockStore};
use crate::models::{new_id, Conversation, Message, MessageRole, MessageStatus, ResponseMode};

/// Event buffer between the pipeline task and the SSE body
const EVENT_CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// Outcomes and Events
// ============================================================================

/// Result of a batch caption submission
#[derive(Debug, Clone)]
pub enum CaptionOutcome {
    /// Duplicate suppressed; nothing was persisted
    Skipped,
    /// Caption committed, with the optional suggestion leg's result
    Committed {
        /// The created or updated caption row
        caption: Message,
        /// Suggestion persisted for this caption, when one was generated
        assistant: Option<Message>,
        /// Suggestion failure reported in-band
        error: Option<String>,
    },
}

/// One step of a streamed caption submission
#[derive(Debug, Clone)]
pub enum CaptionEvent {
    /// The caption row committed by the merge engine
    Caption(Message),
    /// Duplicate suppressed; no caption was committed
    Skipped,
    /// Suggestion generation began; chunks follow under this id
    AssistantStart {
        /// Temporary id correlating the chunks that follow
        id: String,
    },
    /// One streamed fragment of the suggestion
    AssistantChunk {
        /// Temporary id from the preceding start event
        id: String,
        /// Content fragment, in order
        delta: String,
    },
    /// The persisted suggestion row
    AssistantComplete(Message),
    /// A contained fault; the stream continues to `done`
    Error(String),
    /// Terminal event; always emitted exactly once, last
    Done,
}

impl CaptionEvent {
    /// Wire name of this event
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Caption(_) => "caption",
            Self::Skipped => "skipped",
            Self::AssistantStart { .. } => "assistant_start",
            Self::AssistantChunk { .. } => "assistant_chunk",
            Self::AssistantComplete(_) => "assistant_complete",
            Self::Error(_) => "error",
            Self::Done => "done",
        }
    }

    /// JSON payload carried under the event name
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Caption(message) | Self::AssistantComplete(message) => message.to_api_json(),
            Self::Skipped => json!({ "skipped": true }),
            Self::AssistantStart { id } => json!({ "id": id, "role": "assistant" }),
            Self::AssistantChunk { id, delta } => json!({ "id": id, "delta": delta }),
            Self::Error(message) => json!({ "error": message }),
            Self::Done => json!({}),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Shared caption pipeline behind both the batch and streaming endpoints
#[derive(Clone)]
pub struct CaptionPipeline {
    database: Arc<Database>,
    locks: Arc<dyn LockStore>,
    completions: CompletionService,
    summaries: SummaryService,
    config: CaptionConfig,
}

impl CaptionPipeline {
    /// Assemble the pipeline from its collaborators
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        locks: Arc<dyn LockStore>,
        completions: CompletionService,
        summaries: SummaryService,
        config: CaptionConfig,
    ) -> Self {
        Self {
            database,
            locks,
            completions,
            summaries,
            config,
        }
    }

    /// Run one caption through the pipeline, returning a single outcome
    ///
    /// # Errors
    ///
    /// Returns an error when the merge or the gate reads fail. Suggestion
    /// faults are contained in the outcome's `error` field; summary faults
    /// are logged and dropped.
    pub async fn process(
        &self,
        conversation: &Conversation,
        caption: &NormalizedCaption,
        mode: ResponseMode,
    ) -> AppResult<CaptionOutcome> {
        let merged = merge_caption(
            &self.database,
            &self.config,
            &conversation.id,
            &conversation.user_id,
            caption,
        )
        .await?;

        let Some(message) = merged.into_message() else {
            info!(conversation_id = %conversation.id, "caption suppressed as duplicate");
            return Ok(CaptionOutcome::Skipped);
        };

        let mut assistant = None;
        let mut error = None;
        if self
            .should_generate(conversation, caption, &message, mode)
            .await?
        {
            match self.generate_suggestion(conversation).await {
                Ok(suggestion) => assistant = Some(suggestion),
                Err(err) if is_generation_fault(&err) => {
                    warn!(
                        conversation_id = %conversation.id,
                        "suggestion generation failed: {}", err.message
                    );
                    error = Some(err.message);
                }
                Err(err) => return Err(err),
            }
        }

        self.run_summary_pass(conversation).await;

        Ok(CaptionOutcome::Committed {
            caption: message,
            assistant,
            error,
        })
    }

    /// Run one caption through the pipeline as an event stream
    ///
    /// The pipeline runs on a spawned task and forwards its events through
    /// a channel; the returned stream is only the receiving side. A client
    /// disconnect drops the receiver, not the task, so generation finishes,
    /// the lock is released, and the summary pass still runs. Every path
    /// ends with [`CaptionEvent::Done`]; faults after the caption committed
    /// become error events rather than cutting the stream short.
    pub fn stream(
        &self,
        conversation: Conversation,
        caption: NormalizedCaption,
        mode: ResponseMode,
    ) -> impl Stream<Item = CaptionEvent> + Send {
        let pipeline = self.clone();
        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut events = Box::pin(pipeline.run_stream(conversation, caption, mode));
            while let Some(event) = events.next().await {
                // A closed channel means the client went away; keep driving
                // the generator so release and the summary pass still run
                let _ = tx.send(event).await;
            }
        });

        async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }
    }

    /// The event generator behind [`CaptionPipeline::stream`]
    fn run_stream(
        self,
        conversation: Conversation,
        caption: NormalizedCaption,
        mode: ResponseMode,
    ) -> impl Stream<Item = CaptionEvent> + Send {
        async_stream::stream! {
            let merged = merge_caption(
                &self.database,
                &self.config,
                &conversation.id,
                &conversation.user_id,
                &caption,
            )
            .await;

            let message = match merged {
                Ok(outcome) => match outcome.into_message() {
                    Some(message) => message,
                    None => {
                        info!(conversation_id = %conversation.id, "caption suppressed as duplicate");
                        yield CaptionEvent::Skipped;
                        yield CaptionEvent::Done;
                        return;
                    }
                },
                Err(err) => {
                    yield CaptionEvent::Error(err.message);
                    yield CaptionEvent::Done;
                    return;
                }
            };

            yield CaptionEvent::Caption(message.clone());

            let wants_suggestion = match self
                .should_generate(&conversation, &caption, &message, mode)
                .await
            {
                Ok(decision) => decision,
                Err(err) => {
                    yield CaptionEvent::Error(err.message);
                    false
                }
            };

            if wants_suggestion {
                let lock_key = suggestion_lock_key(&conversation.id);
                let ttl = Duration::from_secs(self.config.lock_ttl_secs);

                let mut generate = false;
                let mut must_release = false;
                match self.locks.try_acquire(&lock_key, ttl).await {
                    Ok(true) => {
                        generate = true;
                        must_release = true;
                    }
                    Ok(false) => {
                        debug!(
                            conversation_id = %conversation.id,
                            "suggestion already in flight, skipping generation"
                        );
                    }
                    Err(err) => {
                        // Fail closed: the caption keeps its commit, but
                        // mutual exclusion holds even through an outage
                        warn!(
                            conversation_id = %conversation.id,
                            "lock store unavailable, skipping generation: {}", err.message
                        );
                        yield CaptionEvent::Error(err.message);
                    }
                }

                if generate {
                    let pending_id = format!("pending-{}", new_id());
                    yield CaptionEvent::AssistantStart { id: pending_id.clone() };

                    let mut collected = String::new();
                    let mut failed = false;

                    match self.completions.suggested_reply_stream(&conversation).await {
                        Ok(mut chunks) => {
                            while let Some(item) = chunks.next().await {
                                match item {
                                    Ok(chunk) => {
                                        if !chunk.delta.is_empty() {
                                            collected.push_str(&chunk.delta);
                                            yield CaptionEvent::AssistantChunk {
                                                id: pending_id.clone(),
                                                delta: chunk.delta,
                                            };
                                        }
                                        if chunk.is_final {
                                            break;
                                        }
                                    }
                                    Err(err) => {
                                        warn!(
                                            conversation_id = %conversation.id,
                                            "suggestion stream failed: {}", err.message
                                        );
                                        yield CaptionEvent::Error(err.message);
                                        failed = true;
                                        break;
                                    }
                                }
                            }
                        }
                        Err(err) => {
                            warn!(
                                conversation_id = %conversation.id,
                                "suggestion generation failed: {}", err.message
                            );
                            yield CaptionEvent::Error(err.message);
                            failed = true;
                        }
                    }

                    if !failed {
                        let reply = collected.trim();
                        if reply.is_empty() {
                            let err = AppError::provider(
                                self.completions.provider_name(),
                                "AI returned an empty response",
                            );
                            yield CaptionEvent::Error(err.message);
                        } else {
                            match self
                                .database
                                .create_message(
                                    &conversation.id,
                                    Some(&conversation.user_id),
                                    MessageRole::Assistant,
                                    reply,
                                    MessageStatus::Suggestion,
                                )
                                .await
                            {
                                Ok(suggestion) => {
                                    yield CaptionEvent::AssistantComplete(suggestion);
                                }
                                Err(err) => yield CaptionEvent::Error(err.message),
                            }
                        }
                    }

                    if must_release {
                        if let Err(err) = self.locks.release(&lock_key).await {
                            warn!(
                                conversation_id = %conversation.id,
                                "failed to release suggestion lock: {}", err.message
                            );
                        }
                    }
                }
            }

            self.run_summary_pass(&conversation).await;
            yield CaptionEvent::Done;
        }
    }

    /// Whether this committed caption earns an automatic suggestion
    async fn should_generate(
        &self,
        conversation: &Conversation,
        caption: &NormalizedCaption,
        message: &Message,
        mode: ResponseMode,
    ) -> AppResult<bool> {
        if caption.role != MessageRole::Interviewer || mode != ResponseMode::Auto {
            return Ok(false);
        }
        if !is_question_like(&caption.text) {
            return Ok(false);
        }

        let now = Utc::now();
        let last_assistant = self
            .database
            .latest_message_of_role(&conversation.id, MessageRole::Assistant)
            .await?;
        if !gates::throttle_allows(
            last_assistant.as_ref(),
            now,
            self.config.throttle_interval_secs,
        ) {
            debug!(conversation_id = %conversation.id, "suggestion throttled");
            return Ok(false);
        }

        let latest_suggestion = self
            .database
            .latest_assistant_suggestion(&conversation.id)
            .await?;
        if gates::already_suggested(latest_suggestion.as_ref(), message) {
            debug!(
                conversation_id = %conversation.id,
                "caption already answered by an existing suggestion"
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// One-shot suggestion for the batch path
    async fn generate_suggestion(&self, conversation: &Conversation) -> AppResult<Message> {
        let content = self.completions.suggested_reply(conversation).await?;
        self.database
            .create_message(
                &conversation.id,
                Some(&conversation.user_id),
                MessageRole::Assistant,
                &content,
                MessageStatus::Suggestion,
            )
            .await
    }

    /// Summary refresh runs after every committed caption; its failures
    /// never reach the client
    async fn run_summary_pass(&self, conversation: &Conversation) {
        if let Err(err) = self.summaries.refresh(conversation).await {
            warn!(
                conversation_id = %conversation.id,
                "summary refresh failed: {}", err.message
            );
        }
    }
}

/// Failures of the completion call itself stay in-band; storage faults
/// fail the request
const fn is_generation_fault(err: &AppError) -> bool {
    err.is_provider_error() || matches!(err.code, ErrorCode::ValidationError)
}
