// ABOUTME: Authentication and account route handlers
// ABOUTME: Registration, login, token verification, and profile updates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! Authentication routes
//!
//! Registration hashes passwords with bcrypt and issues an HS256 bearer
//! token immediately; login verifies against the stored hash and answers
//! with a deliberately vague message on failure. Account and profile
//! updates live here too since they are all scoped to the token's user.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::authenticate;
use crate::errors::AppError;
use crate::models::User;
use crate::server::ServerResources;

/// Request to register a new account
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Email address; stored lower-cased
    pub email: String,
    /// Plain-text password, hashed before storage
    pub password: String,
    /// Must match `password`
    pub password_confirmation: String,
    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to log in
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address, matched lower-cased/trimmed
    pub email: String,
    /// Plain-text password
    pub password: String,
}

/// Request to update account fields
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    /// New email address
    #[serde(default)]
    pub email: Option<String>,
    /// New display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to update the profile text
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    /// Free-form background text used to personalize suggestions
    pub profile_text: String,
}

/// Authentication and account routes handler
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all auth and account routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/auth/register", post(Self::register))
            .route("/api/v1/auth/login", post(Self::login))
            .route("/api/v1/auth/verify", get(Self::verify))
            .route("/api/v1/me", get(Self::get_me).patch(Self::update_me))
            .route(
                "/api/v1/profile",
                patch(Self::update_profile).get(Self::get_profile),
            )
            .with_state(resources)
    }

    /// Register a new user and issue a token
    async fn register(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<RegisterRequest>,
    ) -> Result<Response, AppError> {
        let email = request.email.trim().to_lowercase();

        let mut problems = Vec::new();
        if email.is_empty() || !email.contains('@') {
            problems.push("Email is invalid");
        }
        if request.password.len() < 8 {
            problems.push("Password must be at least 8 characters");
        }
        if request.password != request.password_confirmation {
            problems.push("Password confirmation doesn't match");
        }
        if !problems.is_empty() {
            return Err(AppError::invalid_input(problems.join("; ")));
        }

        if resources.database.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::invalid_input("Email is already registered"));
        }

        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))?;

        let user = resources
            .database
            .create_user(&email, &password_hash, request.name.as_deref())
            .await?;
        let token = resources.auth.generate_token(&user)?;

        info!(user_id = %user.id, "user registered");
        Ok((
            StatusCode::CREATED,
            Json(json!({ "user": user_json(&user), "token": token })),
        )
            .into_response())
    }

    /// Log in with email and password
    async fn login(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<LoginRequest>,
    ) -> Result<Response, AppError> {
        let email = request.email.trim().to_lowercase();

        // One vague message for both unknown email and bad password
        let user = resources
            .database
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::auth_invalid("Invalid email or password"))?;

        let valid = bcrypt::verify(&request.password, &user.password_hash)
            .map_err(|e| AppError::internal(format!("Failed to verify password: {e}")))?;
        if !valid {
            return Err(AppError::auth_invalid("Invalid email or password"));
        }

        let token = resources.auth.generate_token(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(Json(json!({ "user": user_json(&user), "token": token })).into_response())
    }

    /// Verify a bearer token and return its user
    async fn verify(
        State(resources): State<Arc<ServerResources>>,
        bearer: Option<TypedHeader<Authorization<Bearer>>>,
    ) -> Result<Response, AppError> {
        let TypedHeader(authorization) =
            bearer.ok_or_else(|| AppError::auth_required("Missing authorization header"))?;

        let claims = resources
            .auth
            .validate_token(authorization.token())
            .map_err(|err| AppError::auth_invalid(err.to_string()))?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::auth_invalid("Token subject is not a valid user id"))?;
        let user = resources
            .database
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::auth_invalid("User not found"))?;

        Ok(Json(json!({ "valid": true, "user": user_json(&user) })).into_response())
    }

    /// Current account details
    async fn get_me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        Ok(Json(json!({ "user": user_json(&user) })).into_response())
    }

    /// Update email and display name
    async fn update_me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<UpdateAccountRequest>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;

        let email = match request.email.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let email = raw.to_lowercase();
                if !email.contains('@') {
                    return Err(AppError::invalid_input("Email is invalid"));
                }
                if let Some(existing) = resources.database.get_user_by_email(&email).await? {
                    if existing.id != user.id {
                        return Err(AppError::invalid_input("Email is already registered"));
                    }
                }
                Some(email)
            }
            _ => None,
        };

        resources
            .database
            .update_user_account(user.id, email.as_deref(), request.name.as_deref())
            .await?;

        let updated = resources
            .database
            .get_user(user.id)
            .await?
            .ok_or_else(|| AppError::internal("User row vanished during update"))?;
        Ok(Json(json!({ "user": user_json(&updated) })).into_response())
    }

    /// Current profile text
    async fn get_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;
        Ok(Json(json!({
            "id": user.id.to_string(),
            "profile_text": user.profile_text,
            "updated_at": user.updated_at.to_rfc3339(),
        }))
        .into_response())
    }

    /// Replace the profile text
    async fn update_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<UpdateProfileRequest>,
    ) -> Result<Response, AppError> {
        let user = authenticate(&headers, &resources).await?;

        resources
            .database
            .update_profile_text(user.id, &request.profile_text)
            .await?;

        Ok(Json(json!({
            "id": user.id.to_string(),
            "profile_text": request.profile_text,
        }))
        .into_response())
    }
}

/// Public JSON shape of a user; never echoes the password hash
fn user_json(user: &User) -> Value {
    json!({
        "id": user.id.to_string(),
        "email": user.email,
        "name": user.name,
        "profile_text": user.profile_text,
        "created_at": user.created_at.to_rfc3339(),
        "updated_at": user.updated_at.to_rfc3339(),
    })
}
