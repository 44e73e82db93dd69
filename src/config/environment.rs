// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, runtime tunables, and configuration parsing
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Environment-based configuration management for production deployment

use crate::constants::{defaults, env_config, limits, prompts};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::warn;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Standard operational logging
    #[default]
    Info,
    /// Verbose diagnostics
    Debug,
    /// Everything, including per-chunk stream events
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Environment type for deployment-specific behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Test runs
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    #[must_use]
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// SQLite database with file path
    SQLite {
        /// Path to the database file
        path: PathBuf,
    },
    /// In-memory SQLite (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        let path_str = s.strip_prefix("sqlite:").unwrap_or(s);
        if path_str == ":memory:" {
            Self::Memory
        } else {
            Self::SQLite {
                path: PathBuf::from(path_str),
            }
        }
    }

    /// Convert to a sqlx connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".into(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/apuntador.db"),
        }
    }
}

impl std::fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Log level
    pub log_level: LogLevel,
    /// Deployment environment
    pub environment: Environment,
    /// Allowed CORS origins (`*` for any)
    pub cors_origins: Vec<String>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// AI provider configuration
    pub ai: AiConfig,
    /// Caption pipeline tunables
    pub captions: CaptionConfig,
    /// Generation lock store configuration
    pub locks: LockConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database location
    pub url: DatabaseUrl,
    /// Run schema migrations on startup
    pub auto_migrate: bool,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path to the HS256 signing key file; generated on first boot when
    /// missing
    pub jwt_secret_path: PathBuf,
    /// Token lifetime in hours
    pub jwt_expiry_hours: i64,
}

/// AI provider configuration and context-window tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Process-wide API key; conversations may override per-row
    pub api_key: Option<String>,
    /// OpenAI-compatible API base URL
    pub base_url: String,
    /// Model used when the conversation configures none
    pub default_model: String,
    /// System prompt used when the conversation configures none
    pub default_system_prompt: String,
    /// Recent-message window sent with a summary present
    pub recent_window_size: usize,
    /// Context cap when no summary exists
    pub max_window_without_summary: usize,
    /// New-message count that forces summary regeneration
    pub summary_trigger_count: usize,
    /// Cap on messages folded into one summary pass
    pub summary_max_messages: usize,
    /// Optional model override for summary calls
    pub summary_model: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: defaults::AI_BASE_URL.into(),
            default_model: defaults::AI_DEFAULT_MODEL.into(),
            default_system_prompt: prompts::DEFAULT_SYSTEM_PROMPT.into(),
            recent_window_size: limits::RECENT_WINDOW_SIZE,
            max_window_without_summary: limits::MAX_WINDOW_WITHOUT_SUMMARY,
            summary_trigger_count: limits::SUMMARY_TRIGGER_COUNT,
            summary_max_messages: limits::SUMMARY_MAX_MESSAGES,
            summary_model: None,
        }
    }
}

/// Caption pipeline timing windows and merge thresholds
///
/// These are heuristics observed against live captioning traffic, kept as
/// overridable defaults rather than assumed optimal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Byte-identical resubmissions inside this window are skipped
    pub duplicate_window_secs: i64,
    /// Same-role captions inside this window may merge in place
    pub merge_window_secs: i64,
    /// Minimum interval between automatic assistant suggestions
    pub throttle_interval_secs: i64,
    /// Streaming generation lock expiry
    pub lock_ttl_secs: u64,
    /// Common-prefix share of the shorter body required for a fuzzy merge
    pub merge_prefix_ratio: f64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            duplicate_window_secs: limits::DUPLICATE_WINDOW_SECS,
            merge_window_secs: limits::MERGE_WINDOW_SECS,
            throttle_interval_secs: limits::THROTTLE_INTERVAL_SECS,
            lock_ttl_secs: limits::LOCK_TTL_SECS,
            merge_prefix_ratio: limits::MERGE_PREFIX_RATIO,
        }
    }
}

/// Generation lock store selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockConfig {
    /// Redis URL; in-process store when unset
    pub redis_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error when a numeric or boolean variable fails to parse.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let config = Self {
            http_port: env_config::http_port(),
            log_level: LogLevel::from_str_or_default(&env_config::log_level()),
            environment: Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development")),
            cors_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")),

            database: DatabaseConfig {
                url: DatabaseUrl::parse_url(&env_config::database_url()),
                auto_migrate: env_var_or("AUTO_MIGRATE", "true")
                    .parse()
                    .context("Invalid AUTO_MIGRATE value")?,
            },

            auth: AuthConfig {
                jwt_secret_path: PathBuf::from(env_config::jwt_secret_path()),
                jwt_expiry_hours: env_config::jwt_expiry_hours(),
            },

            ai: AiConfig {
                api_key: env::var("AI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
                base_url: env_var_or("AI_BASE_URL", defaults::AI_BASE_URL),
                default_model: env_var_or("AI_DEFAULT_MODEL", defaults::AI_DEFAULT_MODEL),
                default_system_prompt: env_var_or(
                    "AI_DEFAULT_SYSTEM_PROMPT",
                    prompts::DEFAULT_SYSTEM_PROMPT,
                ),
                recent_window_size: env_var_or(
                    "AI_RECENT_WINDOW_SIZE",
                    &limits::RECENT_WINDOW_SIZE.to_string(),
                )
                .parse()
                .context("Invalid AI_RECENT_WINDOW_SIZE value")?,
                max_window_without_summary: env_var_or(
                    "AI_MAX_WINDOW_WITHOUT_SUMMARY",
                    &limits::MAX_WINDOW_WITHOUT_SUMMARY.to_string(),
                )
                .parse()
                .context("Invalid AI_MAX_WINDOW_WITHOUT_SUMMARY value")?,
                summary_trigger_count: env_var_or(
                    "AI_SUMMARY_TRIGGER_COUNT",
                    &limits::SUMMARY_TRIGGER_COUNT.to_string(),
                )
                .parse()
                .context("Invalid AI_SUMMARY_TRIGGER_COUNT value")?,
                summary_max_messages: env_var_or(
                    "AI_SUMMARY_MAX_MESSAGES",
                    &limits::SUMMARY_MAX_MESSAGES.to_string(),
                )
                .parse()
                .context("Invalid AI_SUMMARY_MAX_MESSAGES value")?,
                summary_model: env::var("AI_SUMMARY_MODEL").ok(),
            },

            captions: CaptionConfig {
                duplicate_window_secs: env_var_or(
                    "CAPTION_DUPLICATE_WINDOW_SECS",
                    &limits::DUPLICATE_WINDOW_SECS.to_string(),
                )
                .parse()
                .context("Invalid CAPTION_DUPLICATE_WINDOW_SECS value")?,
                merge_window_secs: env_var_or(
                    "CAPTION_MERGE_WINDOW_SECS",
                    &limits::MERGE_WINDOW_SECS.to_string(),
                )
                .parse()
                .context("Invalid CAPTION_MERGE_WINDOW_SECS value")?,
                throttle_interval_secs: env_var_or(
                    "CAPTION_THROTTLE_SECS",
                    &limits::THROTTLE_INTERVAL_SECS.to_string(),
                )
                .parse()
                .context("Invalid CAPTION_THROTTLE_SECS value")?,
                lock_ttl_secs: env_var_or(
                    "CAPTION_LOCK_TTL_SECS",
                    &limits::LOCK_TTL_SECS.to_string(),
                )
                .parse()
                .context("Invalid CAPTION_LOCK_TTL_SECS value")?,
                merge_prefix_ratio: env_var_or(
                    "CAPTION_MERGE_PREFIX_RATIO",
                    &limits::MERGE_PREFIX_RATIO.to_string(),
                )
                .parse()
                .context("Invalid CAPTION_MERGE_PREFIX_RATIO value")?,
            },

            locks: LockConfig {
                redis_url: env::var("REDIS_URL").ok(),
            },
        };

        Ok(config)
    }

    /// Socket address string the HTTP server binds to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.http_port)
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
