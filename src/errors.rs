// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Unified Error Handling System
//!
//! Centralized error handling for the caption pipeline and its API surface.
//! Every fallible path returns [`AppError`], which carries a stable
//! machine-readable code, a human-readable message, and an optional source.
//! Axum handlers bubble errors with `?`; the [`axum::response::IntoResponse`]
//! implementation renders the JSON envelope with the mapped HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error as ThisError;

/// Result type alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication & Authorization (1000-1999)
    /// Authentication required but not provided
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired = 1000,
    /// Provided credentials or token are invalid
    #[serde(rename = "AUTH_INVALID")]
    AuthInvalid = 1001,
    /// Token has expired
    #[serde(rename = "AUTH_EXPIRED")]
    AuthExpired = 1002,
    /// Authenticated user lacks access to the resource
    #[serde(rename = "PERMISSION_DENIED")]
    PermissionDenied = 1003,

    // Validation (3000-3999)
    /// Request input failed validation
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError = 3000,

    // Resource Management (4000-4999)
    /// Requested resource does not exist
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    NotFound = 4000,
    /// Resource already exists (unique constraint)
    #[serde(rename = "RESOURCE_EXISTS")]
    AlreadyExists = 4001,
    /// Generation is already in flight for this conversation
    #[serde(rename = "LOCK_CONTENDED")]
    LockContended = 4002,

    // External Services (5000-5999)
    /// AI provider call failed
    #[serde(rename = "PROVIDER_ERROR")]
    ProviderError = 5000,
    /// External service unreachable
    #[serde(rename = "EXTERNAL_UNAVAILABLE")]
    ExternalUnavailable = 5001,

    // Internal (9000-9999)
    /// Unexpected internal fault
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    /// Database operation failed
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    /// Configuration missing or malformed
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 9002,
}

impl ErrorCode {
    /// HTTP status code this error maps to
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ValidationError => 422,
            Self::AuthRequired | Self::AuthInvalid | Self::AuthExpired => 401,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::AlreadyExists | Self::LockContended => 409,
            Self::ProviderError => 502,
            Self::ExternalUnavailable => 503,
            Self::InternalError | Self::DatabaseError | Self::ConfigError => 500,
        }
    }

    /// Short human-readable description of the code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication required",
            Self::AuthInvalid => "Invalid authentication",
            Self::AuthExpired => "Authentication expired",
            Self::PermissionDenied => "Permission denied",
            Self::ValidationError => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::LockContended => "Operation already in progress",
            Self::ProviderError => "AI provider error",
            Self::ExternalUnavailable => "External service unavailable",
            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
            Self::ConfigError => "Configuration error",
        }
    }
}

/// Application error with code, message, and optional source
#[derive(Debug, ThisError)]
#[error("{}: {message}", code.description())]
pub struct AppError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable message safe to return to clients
    pub message: String,
    /// Underlying cause, if any
    #[source]
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Missing credentials
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    /// Invalid credentials or token
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Expired token
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthExpired, message)
    }

    /// Resource-scoped 404 with a standard message
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", resource.into()))
    }

    /// Client-correctable input problem
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// AI provider failure; `service` names the provider
    pub fn provider(service: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ProviderError,
            format!("{service}: {}", message.into()),
        )
    }

    /// Database failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Configuration failure
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Unexpected internal fault
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// True when this error represents an AI provider failure, which the
    /// orchestrator surfaces as a non-fatal field/event instead of a
    /// failed request
    #[must_use]
    pub const fn is_provider_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ProviderError | ErrorCode::ExternalUnavailable
        )
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

/// JSON error envelope returned to HTTP clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error detail payload
    pub error: ErrorResponseDetails,
}

/// Body of the error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable machine-readable code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: err.code,
                message: err.message.clone(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = ?self.code, "request failed: {}", self.message);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
