// ABOUTME: System-wide constants and configuration values for the caption pipeline
// ABOUTME: Contains timing windows, AI context defaults, prompts, and env accessors
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Constants Module
//!
//! Application constants and environment-based configuration values. The
//! timing windows and merge thresholds are heuristics tuned against live
//! captioning traffic; they are defaults, overridable through the
//! environment (see `config::environment`).

use std::env;

/// Service identity
pub mod service {
    /// Server name used in logs and startup banners
    pub const SERVER_NAME: &str = "apuntador-server";

    /// Server version from Cargo.toml
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Network defaults
pub mod ports {
    /// Default HTTP API port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
}

/// Timing windows and size limits
pub mod limits {
    /// Seconds within which a byte-identical caption resubmission is
    /// suppressed as a duplicate
    pub const DUPLICATE_WINDOW_SECS: i64 = 6;

    /// Seconds within which a same-role caption may merge into the
    /// previous message instead of creating a new row
    pub const MERGE_WINDOW_SECS: i64 = 90;

    /// Minimum common-prefix share of the shorter normalized body for a
    /// fuzzy incremental merge
    pub const MERGE_PREFIX_RATIO: f64 = 0.6;

    /// Minimum seconds between automatic assistant suggestions per
    /// conversation
    pub const THROTTLE_INTERVAL_SECS: i64 = 8;

    /// Expiry of the per-conversation generation lock; backstop against
    /// holders that crash without releasing
    pub const LOCK_TTL_SECS: u64 = 30;

    /// Upper bound on tracked lock keys in the in-process store
    pub const LOCK_STORE_MAX_ENTRIES: usize = 10_000;

    /// Sweep interval for expired in-process lock entries
    pub const LOCK_SWEEP_INTERVAL_SECS: u64 = 60;

    /// Recent-message window sent to the provider when a summary exists
    pub const RECENT_WINDOW_SIZE: usize = 18;

    /// Context cap when no summary exists yet
    pub const MAX_WINDOW_WITHOUT_SUMMARY: usize = 60;

    /// New-message count that forces summary regeneration
    pub const SUMMARY_TRIGGER_COUNT: usize = 12;

    /// Cap on messages folded into one summary pass
    pub const SUMMARY_MAX_MESSAGES: usize = 40;

    /// Default JWT lifetime in hours
    pub const DEFAULT_JWT_EXPIRY_HOURS: i64 = 24;

    /// Request body size cap (1 MiB); captions are short
    pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;
}

/// Built-in AI instructions
pub mod prompts {
    /// System prompt for answer suggestions when neither the conversation
    /// nor the environment configures one
    pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a real-time interview assistant. Messages may be labeled as Interviewer or Candidate. Respond with a concise suggested answer the candidate can say next.";

    /// System instruction for the running-summary maintenance call
    pub const SUMMARY_SYSTEM_PROMPT: &str = "You maintain a compact running summary of an interview conversation. Preserve important requirements, decisions, interviewer questions, and strong candidate answers. Keep it under 180 words in clear bullet points.";

    /// Prefix for the context entry carrying the running summary
    pub const SUMMARY_CONTEXT_PREFIX: &str = "Conversation summary so far:\n";
}

/// Static defaults for string-valued settings
pub mod defaults {
    /// Default SQLite database location
    pub const DATABASE_URL: &str = "sqlite:./data/apuntador.db";

    /// Default JWT secret key file
    pub const JWT_SECRET_PATH: &str = "./data/jwt.secret";

    /// Default OpenAI-compatible API base
    pub const AI_BASE_URL: &str = "https://api.openai.com/v1";

    /// Default completion model when nothing else is configured
    pub const AI_DEFAULT_MODEL: &str = "gpt-5-nano";
}

/// Environment-based configuration
pub mod env_config {
    use super::env;

    /// Get HTTP server port from environment or default
    #[must_use]
    pub fn http_port() -> u16 {
        env::var("HTTP_PORT")
            .unwrap_or_else(|_| super::ports::DEFAULT_HTTP_PORT.to_string())
            .parse()
            .unwrap_or(super::ports::DEFAULT_HTTP_PORT)
    }

    /// Get database URL from environment or default
    #[must_use]
    pub fn database_url() -> String {
        env::var("DATABASE_URL").unwrap_or_else(|_| super::defaults::DATABASE_URL.into())
    }

    /// Get JWT secret path from environment or default
    #[must_use]
    pub fn jwt_secret_path() -> String {
        env::var("JWT_SECRET_PATH").unwrap_or_else(|_| super::defaults::JWT_SECRET_PATH.into())
    }

    /// Get JWT expiry hours from environment or default
    #[must_use]
    pub fn jwt_expiry_hours() -> i64 {
        env::var("JWT_EXPIRY_HOURS")
            .unwrap_or_else(|_| super::limits::DEFAULT_JWT_EXPIRY_HOURS.to_string())
            .parse()
            .unwrap_or(super::limits::DEFAULT_JWT_EXPIRY_HOURS)
    }

    /// Get log level from environment or default
    #[must_use]
    pub fn log_level() -> String {
        env::var("RUST_LOG").unwrap_or_else(|_| "info".into())
    }
}
