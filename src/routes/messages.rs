// ABOUTME: Message listing, creation, and manual-respond route handlers
// ABOUTME: User messages trigger a batch completion; provider faults stay in-band
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! Message routes
//!
//! Posting a message with the `user` role runs a one-shot completion and
//! persists the reply as a completed assistant message. Provider failures
//! never fail the request; the persisted message is returned with the
//! fault in the response's `error` field instead.
//!
//! `respond_last_interviewer` is the manual companion to auto mode: it
//! targets the most recent interviewer turn and always produces a fresh
//! suggestion row, bypassing the duplicate-suggestion guard so the user
//! can explicitly ask again.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{authenticate, load_owned_conversation};
use crate::errors::AppError;
use crate::models::{Conversation, MessageRole, MessageStatus};
use crate::server::ServerResources;

/// Request to append a message to a conversation
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    /// Message text
    pub content: String,
    /// Speaker role; defaults to `user`
    #[serde(default)]
    pub role: Option<String>,
}

/// Message routes handler
pub struct MessageRoutes;

impl MessageRoutes {
    /// Create all message routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/v1/conversations/:id/messages",
                get(Self::list).post(Self::create),
            )
            .route(
                "/api/v1/conversations/:id/messages/respond_last_interviewer",
                post(Self::respond_last_interviewer),
            )
            .with_state(resources)
    }

    /// List a conversation's messages, oldest first
    async fn list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        let conversation = load_owned_conversation(&resources, &conversation_id, &user).await?;

        let messages = resources.database.list_messages(&conversation.id).await?;
        let payload: Vec<Value> = messages.iter().map(crate::models::Message::to_api_json).collect();
        Ok(Json(json!({ "messages": payload })).into_response())
    }

    /// Append a message; user turns get an immediate assistant reply
    async fn create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
        Json(request): Json<CreateMessageRequest>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        let conversation = load_owned_conversation(&resources, &conversation_id, &user).await?;

        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::invalid_input("Message content cannot be empty"));
        }
        let role = match request.role.as_deref() {
            None | Some("user") => MessageRole::User,
            Some(raw) => raw
                .parse::<MessageRole>()
                .map_err(|_| AppError::invalid_input(format!("Unknown message role: {raw}")))?,
        };

        let message = resources
            .database
            .create_message(
                &conversation.id,
                Some(&user.id.to_string()),
                role,
                content,
                MessageStatus::Captured,
            )
            .await?;

        let (assistant_message, error) = if role == MessageRole::User {
            Self::completed_reply(&resources, &conversation).await?
        } else {
            (None, None)
        };

        Ok((
            StatusCode::CREATED,
            Json(json!({
                "message": message.to_api_json(),
                "assistant_message": assistant_message,
                "error": error,
            })),
        )
            .into_response())
    }

    /// Generate a fresh suggestion for the latest interviewer turn
    async fn respond_last_interviewer(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        let conversation = load_owned_conversation(&resources, &conversation_id, &user).await?;

        let interviewer = resources
            .database
            .latest_message_of_role(&conversation.id, MessageRole::Interviewer)
            .await?
            .ok_or_else(|| {
                AppError::invalid_input("No hay mensajes del interviewer para responder.")
            })?;

        // Explicit request: always a fresh suggestion, even for a turn that
        // already has one
        let reply = resources
            .completions
            .suggested_reply(&conversation)
            .await?;
        let suggestion = resources
            .database
            .create_message(
                &conversation.id,
                None,
                MessageRole::Assistant,
                &reply,
                MessageStatus::Suggestion,
            )
            .await?;

        info!(
            conversation_id = %conversation.id,
            suggestion_id = %suggestion.id,
            "manual suggestion generated"
        );
        Ok(Json(json!({
            "assistant_message": suggestion.to_api_json(),
            "interviewer_message": interviewer.to_api_json(),
            "skipped": false,
        }))
        .into_response())
    }

    /// Run the batch completion for a user turn; faults stay in-band
    async fn completed_reply(
        resources: &ServerResources,
        conversation: &Conversation,
    ) -> Result<(Option<Value>, Option<String>), AppError> {
        match resources.completions.suggested_reply(conversation).await {
            Ok(reply) => {
                let assistant = resources
                    .database
                    .create_message(
                        &conversation.id,
                        None,
                        MessageRole::Assistant,
                        &reply,
                        MessageStatus::Completed,
                    )
                    .await?;
                if let Err(err) = resources.summaries.refresh(conversation).await {
                    warn!(
                        conversation_id = %conversation.id,
                        error = %err,
                        "summary refresh failed after reply"
                    );
                }
                Ok((Some(assistant.to_api_json()), None))
            }
            Err(err) if err.is_provider_error() => {
                warn!(
                    conversation_id = %conversation.id,
                    error = %err,
                    "assistant reply failed"
                );
                Ok((None, Some(err.to_string())))
            }
            Err(err) => Err(err),
        }
    }
}
