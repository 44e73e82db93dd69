// ABOUTME: JWT-based user authentication for the HTTP API
// ABOUTME: Handles token generation, validation, and secret bootstrap
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Authentication and Session Management
//!
//! This module provides JWT-based authentication with HS256 symmetric
//! signing. The signing secret lives in a file on disk and is generated
//! on first boot, so restarts do not invalidate issued tokens.

use crate::errors::{AppError, AppResult};
use crate::models::User;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Length of a generated signing secret in characters
const JWT_SECRET_LEN: usize = 64;

/// Convert a duration to a human-readable format
fn humanize_duration(duration: Duration) -> String {
    let total_secs = duration.num_seconds().abs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;

    if hours > 0 {
        format!("{hours} hours")
    } else if minutes > 0 {
        format!("{minutes} minutes")
    } else {
        format!("{total_secs} seconds")
    }
}

/// `JWT` validation error with detailed information
#[derive(Debug, Clone)]
pub enum JwtValidationError {
    /// Token has expired
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
        /// Current time for reference
        current_time: DateTime<Utc>,
    },
    /// Token signature is invalid
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is malformed (not proper `JWT` format)
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl std::fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenExpired {
                expired_at,
                current_time,
            } => {
                let expired_for = current_time.signed_duration_since(*expired_at);
                write!(
                    f,
                    "JWT token expired {} ago at {}",
                    humanize_duration(expired_for),
                    expired_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            Self::TokenInvalid { reason } => {
                write!(f, "JWT token signature is invalid: {reason}")
            }
            Self::TokenMalformed { details } => {
                write!(f, "JWT token is malformed: {details}")
            }
        }
    }
}

impl std::error::Error for JwtValidationError {}

/// `JWT` claims for user authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User `ID`
    pub sub: String,
    /// User email
    pub email: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Authentication manager for `JWT` tokens
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry_hours: i64,
    /// Monotonic counter to ensure unique issued-at values for tokens
    token_counter: AtomicU64,
}

impl Clone for AuthManager {
    fn clone(&self) -> Self {
        Self {
            encoding_key: self.encoding_key.clone(),
            decoding_key: self.decoding_key.clone(),
            token_expiry_hours: self.token_expiry_hours,
            // Cloned instances maintain uniqueness independently
            token_counter: AtomicU64::new(0),
        }
    }
}

impl AuthManager {
    /// Create a new authentication manager from raw secret bytes
    #[must_use]
    pub fn new(secret: &[u8], token_expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            token_expiry_hours,
            token_counter: AtomicU64::new(0),
        }
    }

    /// Create an authentication manager backed by a secret file,
    /// generating the secret on first boot
    ///
    /// # Errors
    ///
    /// Returns an error if the secret file cannot be read or created
    pub fn from_secret_file(path: &Path, token_expiry_hours: i64) -> AppResult<Self> {
        let secret = load_or_generate_secret(path)?;
        Ok(Self::new(secret.as_bytes(), token_expiry_hours))
    }

    /// Generate an HS256 `JWT` token for a user
    ///
    /// # Errors
    ///
    /// Returns an error if JWT encoding fails
    pub fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let expiry = now + Duration::hours(self.token_expiry_hours);

        // Atomic counter keeps issued-at values unique across rapid calls
        let counter = self.token_counter.fetch_add(1, Ordering::Relaxed);
        let unique_iat =
            now.timestamp() * 1000 + i64::from(u32::try_from(counter % 1000).unwrap_or(0));

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: unique_iat,
            exp: expiry.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode JWT: {e}")))
    }

    /// Validate a token with detailed error information
    ///
    /// # Errors
    ///
    /// Returns a [`JwtValidationError`] if:
    /// - Token signature is invalid
    /// - Token has expired
    /// - Token is malformed or not valid JWT format
    /// - Token claims cannot be deserialized
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let claims = self.decode_token_claims(token)?;
        Self::validate_claims_expiry(&claims)?;
        Ok(claims)
    }

    /// Decode token claims without expiration validation
    fn decode_token_claims(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| Self::convert_jwt_error(&e))
    }

    /// Check claims expiration with detailed logging
    fn validate_claims_expiry(claims: &Claims) -> Result<(), JwtValidationError> {
        let current_time = Utc::now();
        if current_time.timestamp() <= claims.exp {
            return Ok(());
        }

        let expired_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        tracing::warn!(
            "JWT token expired for user: {} - Expired {} ago at {}",
            claims.sub,
            humanize_duration(current_time.signed_duration_since(expired_at)),
            expired_at.to_rfc3339()
        );
        Err(JwtValidationError::TokenExpired {
            expired_at,
            current_time,
        })
    }

    /// Convert JWT library errors to detailed validation errors
    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> JwtValidationError {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature => JwtValidationError::TokenInvalid {
                reason: "Token signature verification failed".into(),
            },
            ErrorKind::InvalidToken => JwtValidationError::TokenMalformed {
                details: "Token format is invalid".into(),
            },
            ErrorKind::Base64(base64_err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid base64: {base64_err}"),
            },
            ErrorKind::Json(json_err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid JSON: {json_err}"),
            },
            ErrorKind::Utf8(utf8_err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid UTF-8: {utf8_err}"),
            },
            _ => JwtValidationError::TokenInvalid {
                reason: format!("Token validation failed: {e}"),
            },
        }
    }
}

/// Read the signing secret from `path`, generating and persisting a new
/// one if the file does not exist yet
///
/// # Errors
///
/// Returns an error if the file cannot be read or written
pub fn load_or_generate_secret(path: &Path) -> AppResult<String> {
    if path.exists() {
        let secret = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read JWT secret file: {e}")))?;
        let secret = secret.trim().to_owned();
        if secret.is_empty() {
            return Err(AppError::config(format!(
                "JWT secret file {} is empty",
                path.display()
            )));
        }
        return Ok(secret);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::config(format!("Failed to create JWT secret directory: {e}"))
            })?;
        }
    }

    let secret: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(JWT_SECRET_LEN)
        .map(char::from)
        .collect();

    std::fs::write(path, &secret)
        .map_err(|e| AppError::config(format!("Failed to write JWT secret file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = std::fs::set_permissions(path, perms) {
            tracing::warn!("Failed to restrict JWT secret file permissions: {}", e);
        }
    }

    tracing::info!("Generated new JWT secret at {}", path.display());
    Ok(secret)
}
