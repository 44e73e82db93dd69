// ABOUTME: Caption ingestion route handlers, batch and SSE streaming
// ABOUTME: Thin wrappers over the caption pipeline; all merge/gating lives there
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! Caption routes
//!
//! The batch endpoint answers once the pipeline settles: 201 when a
//! caption row was committed, 200 with `skipped: true` when the fragment
//! was a duplicate. The streaming endpoint narrates the same pipeline as
//! server-sent events so clients can render the suggestion token by token.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use super::{authenticate, load_owned_conversation};
use crate::captions::{normalize_caption, CaptionOutcome};
use crate::errors::AppError;
use crate::models::ResponseMode;
use crate::server::ServerResources;

/// A raw caption fragment as submitted by the capture extension
#[derive(Debug, Deserialize)]
pub struct CaptionRequest {
    /// Transcribed text fragment
    pub text: String,
    /// Speaker label from the meeting platform
    #[serde(default)]
    pub speaker: Option<String>,
    /// Source platform name
    #[serde(default)]
    pub platform: Option<String>,
    /// Suggestion mode; unknown values fall back to auto
    #[serde(default)]
    pub response_mode: Option<String>,
}

impl CaptionRequest {
    fn response_mode(&self) -> ResponseMode {
        self.response_mode
            .as_deref()
            .map(ResponseMode::from_str_or_default)
            .unwrap_or_default()
    }
}

/// Caption routes handler
pub struct CaptionRoutes;

impl CaptionRoutes {
    /// Create all caption routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/v1/conversations/:id/captions",
                post(Self::ingest),
            )
            .route(
                "/api/v1/conversations/:id/captions/stream",
                post(Self::ingest_stream),
            )
            .with_state(resources)
    }

    /// Ingest one caption fragment and answer when the pipeline settles
    async fn ingest(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
        Json(request): Json<CaptionRequest>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        let conversation = load_owned_conversation(&resources, &conversation_id, &user).await?;

        let caption = normalize_caption(
            &request.text,
            request.speaker.as_deref(),
            request.platform.as_deref(),
        )?;
        let mode = request.response_mode();

        match resources
            .pipeline
            .process(&conversation, &caption, mode)
            .await?
        {
            CaptionOutcome::Skipped => {
                Ok(Json(json!({ "skipped": true })).into_response())
            }
            CaptionOutcome::Committed {
                caption,
                assistant,
                error,
            } => Ok((
                StatusCode::CREATED,
                Json(json!({
                    "caption_message": caption.to_api_json(),
                    "assistant_message": assistant.map(|m| m.to_api_json()),
                    "error": error,
                })),
            )
                .into_response()),
        }
    }

    /// Ingest one caption fragment as a server-sent event stream
    async fn ingest_stream(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
        Json(request): Json<CaptionRequest>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        let user = authenticate(&headers, &resources).await?;
        let conversation = load_owned_conversation(&resources, &conversation_id, &user).await?;

        let caption = normalize_caption(
            &request.text,
            request.speaker.as_deref(),
            request.platform.as_deref(),
        )?;
        let mode = request.response_mode();

        let events = resources
            .pipeline
            .stream(conversation, caption, mode)
            .map(|event| {
                Ok(Event::default()
                    .event(event.name())
                    .data(event.payload().to_string()))
            });

        Ok(Sse::new(events).keep_alive(KeepAlive::default()))
    }
}
