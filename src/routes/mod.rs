// ABOUTME: Route module organization for the apuntador HTTP API
// ABOUTME: Per-resource routers under /api/v1 plus the shared bearer-auth helper
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! HTTP routes
//!
//! Each resource gets its own router module with thin handlers that
//! delegate to the caption pipeline, completion services, and database.
//! Everything except `/up` and the auth endpoints requires a bearer token;
//! [`authenticate`] resolves it to the owning [`User`] row.

/// Registration, login, and token verification routes
pub mod auth;
/// Caption ingestion routes (batch and SSE streaming)
pub mod captions;
/// Conversation CRUD and transcript report routes
pub mod conversations;
/// Health probe route
pub mod health;
/// Message listing, creation, and manual-respond routes
pub mod messages;

pub use auth::AuthRoutes;
pub use captions::CaptionRoutes;
pub use conversations::ConversationRoutes;
pub use health::HealthRoutes;
pub use messages::MessageRoutes;

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use crate::auth::JwtValidationError;
use crate::errors::{AppError, AppResult};
use crate::models::User;
use crate::server::ServerResources;

/// Resolve the request's bearer token to its user row
///
/// # Errors
///
/// Returns an auth error when the header is missing or malformed, the
/// token fails validation, or the token's subject no longer exists.
pub(crate) async fn authenticate(
    headers: &HeaderMap,
    resources: &ServerResources,
) -> AppResult<User> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::auth_required("Missing authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::auth_invalid("Authorization header must use the Bearer scheme"))?;

    let claims = resources
        .auth
        .validate_token(token)
        .map_err(|err| match err {
            JwtValidationError::TokenExpired { .. } => AppError::auth_expired(err.to_string()),
            JwtValidationError::TokenInvalid { .. } | JwtValidationError::TokenMalformed { .. } => {
                AppError::auth_invalid(err.to_string())
            }
        })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::auth_invalid("Token subject is not a valid user id"))?;

    resources
        .database
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::auth_invalid("User not found"))
}

/// Load a conversation scoped to its owner, or 404
pub(crate) async fn load_owned_conversation(
    resources: &ServerResources,
    conversation_id: &str,
    user: &User,
) -> AppResult<crate::models::Conversation> {
    resources
        .database
        .get_conversation(conversation_id, &user.id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Conversation"))
}
