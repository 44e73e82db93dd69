// ABOUTME: Conversation CRUD route handlers plus the transcript report download
// ABOUTME: All endpoints are owner-scoped; foreign conversations answer 404
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! Conversation routes
//!
//! List, create, read, update, and delete conversations, plus the
//! plain-text transcript report download. Every lookup is scoped to the
//! authenticated user, so a conversation owned by someone else is
//! indistinguishable from one that does not exist.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{authenticate, load_owned_conversation};
use crate::database::ConversationUpdate;
use crate::errors::AppError;
use crate::reports::build_report;
use crate::server::ServerResources;

/// Request to create a conversation; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Per-conversation system prompt override
    #[serde(default)]
    pub ai_system_prompt: Option<String>,
    /// Per-conversation model override
    #[serde(default)]
    pub ai_model: Option<String>,
    /// Per-conversation provider API key override
    #[serde(default)]
    pub ai_api_key: Option<String>,
}

/// Request to update a conversation; unset fields stay unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateConversationRequest {
    /// New display title
    #[serde(default)]
    pub title: Option<String>,
    /// New system prompt override
    #[serde(default)]
    pub ai_system_prompt: Option<String>,
    /// New model override
    #[serde(default)]
    pub ai_model: Option<String>,
    /// New provider API key override
    #[serde(default)]
    pub ai_api_key: Option<String>,
}

/// Conversation routes handler
pub struct ConversationRoutes;

impl ConversationRoutes {
    /// Create all conversation routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/v1/conversations",
                get(Self::list).post(Self::create),
            )
            .route(
                "/api/v1/conversations/:id",
                get(Self::show).patch(Self::update).delete(Self::delete),
            )
            .route("/api/v1/conversations/:id/report", get(Self::report))
            .with_state(resources)
    }

    /// List the user's conversations, most recently updated first
    async fn list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        let conversations = resources
            .database
            .list_conversations(&user.id.to_string())
            .await?;

        let mut payload = Vec::with_capacity(conversations.len());
        for conversation in &conversations {
            let last = resources
                .database
                .recent_messages(&conversation.id, 1)
                .await?
                .pop();
            payload.push(conversation.to_api_json(last.as_ref()));
        }

        Ok(Json(json!({ "conversations": payload })).into_response())
    }

    /// Create a conversation
    async fn create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CreateConversationRequest>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;

        let conversation = resources
            .database
            .create_conversation(
                &user.id.to_string(),
                request.title.as_deref(),
                request.ai_system_prompt.as_deref(),
                request.ai_model.as_deref(),
                request.ai_api_key.as_deref(),
            )
            .await?;

        info!(conversation_id = %conversation.id, "conversation created");
        Ok((
            StatusCode::CREATED,
            Json(json!({ "conversation": conversation.to_api_json(None) })),
        )
            .into_response())
    }

    /// Fetch a single conversation
    async fn show(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        let conversation = load_owned_conversation(&resources, &conversation_id, &user).await?;

        let last = resources
            .database
            .recent_messages(&conversation.id, 1)
            .await?
            .pop();
        Ok(Json(json!({ "conversation": conversation.to_api_json(last.as_ref()) })).into_response())
    }

    /// Update title and AI overrides
    async fn update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
        Json(request): Json<UpdateConversationRequest>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        load_owned_conversation(&resources, &conversation_id, &user).await?;

        let update = ConversationUpdate {
            title: request.title,
            ai_system_prompt: request.ai_system_prompt,
            ai_model: request.ai_model,
            ai_api_key: request.ai_api_key,
        };
        let updated = resources
            .database
            .update_conversation(&conversation_id, &user.id.to_string(), &update)
            .await?;
        if !updated {
            return Err(AppError::not_found("Conversation"));
        }

        let conversation = load_owned_conversation(&resources, &conversation_id, &user).await?;
        Ok(Json(json!({ "conversation": conversation.to_api_json(None) })).into_response())
    }

    /// Delete a conversation and its messages
    async fn delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;

        let deleted = resources
            .database
            .delete_conversation(&conversation_id, &user.id.to_string())
            .await?;
        if !deleted {
            return Err(AppError::not_found("Conversation"));
        }

        info!(conversation_id = %conversation_id, "conversation deleted");
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Download the plain-text transcript report
    async fn report(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        let conversation = load_owned_conversation(&resources, &conversation_id, &user).await?;

        let messages = resources.database.list_messages(&conversation.id).await?;
        let report = build_report(&conversation, &messages, Utc::now());

        Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", report.filename),
                ),
            ],
            report.content,
        )
            .into_response())
    }
}
