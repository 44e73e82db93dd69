// ABOUTME: Conversation database operations with per-user scoping
// ABOUTME: CRUD plus running-summary cursor updates for the summary trigger

use super::{parse_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{new_id, Conversation};
use chrono::{DateTime, Utc};
use sqlx::Row;

/// Optional field updates for a conversation; `None` leaves the column
/// unchanged
#[derive(Debug, Default, Clone)]
pub struct ConversationUpdate {
    /// New title
    pub title: Option<String>,
    /// New system prompt override
    pub ai_system_prompt: Option<String>,
    /// New model override
    pub ai_model: Option<String>,
    /// New API key override
    pub ai_api_key: Option<String>,
}

impl Database {
    /// Create the conversations table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_conversations(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT,
                ai_system_prompt TEXT,
                ai_model TEXT,
                ai_api_key TEXT,
                ai_summary TEXT,
                ai_summary_message_id TEXT,
                ai_summary_updated_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversations table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, updated_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversations index: {e}")))?;

        Ok(())
    }

    /// Create a conversation owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<&str>,
        ai_system_prompt: Option<&str>,
        ai_model: Option<&str>,
        ai_api_key: Option<&str>,
    ) -> AppResult<Conversation> {
        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO conversations (id, user_id, title, ai_system_prompt, ai_model, ai_api_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(title)
        .bind(ai_system_prompt)
        .bind(ai_model)
        .bind(ai_api_key)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(Conversation {
            id,
            user_id: user_id.to_owned(),
            title: title.map(ToOwned::to_owned),
            ai_system_prompt: ai_system_prompt.map(ToOwned::to_owned),
            ai_model: ai_model.map(ToOwned::to_owned),
            ai_api_key: ai_api_key.map(ToOwned::to_owned),
            ai_summary: None,
            ai_summary_message_id: None,
            ai_summary_updated_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a conversation by id, scoped to its owner
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, ai_system_prompt, ai_model, ai_api_key,
                   ai_summary, ai_summary_message_id, ai_summary_updated_at,
                   created_at, updated_at
            FROM conversations
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        row.map(row_to_conversation).transpose()
    }

    /// List a user's conversations, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_conversations(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, ai_system_prompt, ai_model, ai_api_key,
                   ai_summary, ai_summary_message_id, ai_summary_updated_at,
                   created_at, updated_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY updated_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        rows.into_iter().map(row_to_conversation).collect()
    }

    /// Update title and AI configuration; unset fields stay unchanged
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
        update: &ConversationUpdate,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE conversations
            SET title = COALESCE($3, title),
                ai_system_prompt = COALESCE($4, ai_system_prompt),
                ai_model = COALESCE($5, ai_model),
                ai_api_key = COALESCE($6, ai_api_key),
                updated_at = $7
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(update.title.as_deref())
        .bind(update.ai_system_prompt.as_deref())
        .bind(update.ai_model.as_deref())
        .bind(update.ai_api_key.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a conversation and its messages
    ///
    /// # Errors
    ///
    /// Returns an error if either delete fails
    pub async fn delete_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        // Messages are removed explicitly; SQLite foreign keys are not
        // enforced by default
        sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to delete conversation messages: {e}"))
            })?;

        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(conversation_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist a regenerated running summary with its window cursors
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_conversation_summary(
        &self,
        conversation_id: &str,
        summary: &str,
        last_message_id: &str,
        summarized_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE conversations
            SET ai_summary = $2,
                ai_summary_message_id = $3,
                ai_summary_updated_at = $4
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .bind(summary)
        .bind(last_message_id)
        .bind(summarized_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update summary: {e}")))?;

        Ok(())
    }

    /// Bump a conversation's activity timestamp
    pub(super) async fn touch_conversation(&self, conversation_id: &str) -> AppResult<()> {
        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to touch conversation: {e}")))?;
        Ok(())
    }
}

fn row_to_conversation(row: sqlx::sqlite::SqliteRow) -> AppResult<Conversation> {
    let created_raw: String = row.get("created_at");
    let updated_raw: String = row.get("updated_at");
    let summary_at_raw: Option<String> = row.get("ai_summary_updated_at");

    Ok(Conversation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        ai_system_prompt: row.get("ai_system_prompt"),
        ai_model: row.get("ai_model"),
        ai_api_key: row.get("ai_api_key"),
        ai_summary: row.get("ai_summary"),
        ai_summary_message_id: row.get("ai_summary_message_id"),
        ai_summary_updated_at: summary_at_raw
            .map(|raw| parse_timestamp(&raw, "ai_summary_updated_at"))
            .transpose()?,
        created_at: parse_timestamp(&created_raw, "created_at")?,
        updated_at: parse_timestamp(&updated_raw, "updated_at")?,
    })
}
