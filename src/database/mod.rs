// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Database Management
//!
//! SQLite-backed persistence for users, conversations, and messages.
//! Schema is created by idempotent per-concern migrations at startup.
//! Ids are string UUIDs; timestamps are RFC 3339 UTC text, which sorts
//! chronologically under SQLite's lexicographic TEXT ordering.

mod conversations;
mod messages;
mod users;

pub use conversations::ConversationUpdate;

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};

/// Database manager for user, conversation, and message storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist;
        // in-memory databases need no mode flag
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_users().await?;
        self.migrate_conversations().await?;
        self.migrate_messages().await?;
        Ok(())
    }
}

/// Parse a stored RFC 3339 timestamp column
fn parse_timestamp(raw: &str, column: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid {column} timestamp '{raw}': {e}")))
}
