// ABOUTME: Message database operations for caption and chat persistence
// ABOUTME: Recent-window, role-scoped latest, and summary-window queries

use super::{parse_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{new_id, Message, MessageRole, MessageStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, user_id, role, content, status, created_at, updated_at";

impl Database {
    /// Create the messages table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_messages(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                user_id TEXT,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create messages index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation_role ON messages(conversation_id, role, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create messages role index: {e}")))?;

        Ok(())
    }

    /// Insert a message and bump its conversation's activity timestamp
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn create_message(
        &self,
        conversation_id: &str,
        user_id: Option<&str>,
        role: MessageRole,
        content: &str,
        status: MessageStatus,
    ) -> AppResult<Message> {
        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, user_id, role, content, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(content)
        .bind(status.as_str())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create message: {e}")))?;

        self.touch_conversation(conversation_id).await?;

        Ok(Message {
            id,
            conversation_id: conversation_id.to_owned(),
            user_id: user_id.map(ToOwned::to_owned),
            role,
            content: content.to_owned(),
            status,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace a message's content and status in place
    ///
    /// Returns the updated message, or `None` if the id does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the update or re-fetch fails
    pub async fn update_message_content(
        &self,
        message_id: &str,
        content: &str,
        status: MessageStatus,
    ) -> AppResult<Option<Message>> {
        let result = sqlx::query(
            "UPDATE messages SET content = $2, status = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(message_id)
        .bind(content)
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update message: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let updated = self.get_message(message_id).await?;
        if let Some(message) = &updated {
            self.touch_conversation(&message.conversation_id).await?;
        }
        Ok(updated)
    }

    /// Fetch one message by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_message(&self, message_id: &str) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get message: {e}")))?;

        row.map(row_to_message).transpose()
    }

    /// Latest message of a given role in a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn latest_message_of_role(
        &self,
        conversation_id: &str,
        role: MessageRole,
    ) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_id = $1 AND role = $2
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "
        ))
        .bind(conversation_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get latest message: {e}")))?;

        row.map(row_to_message).transpose()
    }

    /// Latest assistant message still in suggestion status
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn latest_assistant_suggestion(
        &self,
        conversation_id: &str,
    ) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_id = $1 AND role = $2 AND status = $3
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "
        ))
        .bind(conversation_id)
        .bind(MessageRole::Assistant.as_str())
        .bind(MessageStatus::Suggestion.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get latest suggestion: {e}")))?;

        row.map(row_to_message).transpose()
    }

    /// All messages in a conversation, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_messages(&self, conversation_id: &str) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, rowid ASC
            "
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list messages: {e}")))?;

        rows.into_iter().map(row_to_message).collect()
    }

    /// The `limit` most recent messages, returned oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2
            "
        ))
        .bind(conversation_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get recent messages: {e}")))?;

        let mut messages = rows
            .into_iter()
            .map(row_to_message)
            .collect::<AppResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Messages updated after the given watermark, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn messages_updated_after(
        &self,
        conversation_id: &str,
        watermark: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_id = $1 AND updated_at > $2
            ORDER BY created_at ASC, rowid ASC
            LIMIT $3
            "
        ))
        .bind(conversation_id)
        .bind(watermark.to_rfc3339())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get updated messages: {e}")))?;

        rows.into_iter().map(row_to_message).collect()
    }

    /// Messages inserted after the row holding `cursor_id`, oldest first
    ///
    /// An unknown cursor id matches nothing and yields the whole
    /// conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn messages_after_id(
        &self,
        conversation_id: &str,
        cursor_id: &str,
        limit: usize,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_id = $1
              AND rowid > COALESCE((SELECT rowid FROM messages WHERE id = $2), 0)
            ORDER BY created_at ASC, rowid ASC
            LIMIT $3
            "
        ))
        .bind(conversation_id)
        .bind(cursor_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages after cursor: {e}")))?;

        rows.into_iter().map(row_to_message).collect()
    }
}

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> AppResult<Message> {
    let role_raw: String = row.get("role");
    let status_raw: String = row.get("status");
    let created_raw: String = row.get("created_at");
    let updated_raw: String = row.get("updated_at");

    Ok(Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        user_id: row.get("user_id"),
        role: role_raw
            .parse()
            .map_err(|e| AppError::database(format!("Invalid message role: {e}")))?,
        content: row.get("content"),
        status: status_raw
            .parse()
            .map_err(|e| AppError::database(format!("Invalid message status: {e}")))?,
        created_at: parse_timestamp(&created_raw, "created_at")?,
        updated_at: parse_timestamp(&updated_raw, "updated_at")?,
    })
}
