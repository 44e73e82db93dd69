// ABOUTME: User management database operations
// ABOUTME: Handles account rows, email lookups, and profile text updates

use super::{parse_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::User;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the users table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_users(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                name TEXT,
                password_hash TEXT NOT NULL,
                profile_text TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create users table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create users index: {e}")))?;

        Ok(())
    }

    /// Create a new user; the email must be unused
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including unique violations)
    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> AppResult<User> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query(
            r"
            INSERT INTO users (id, email, name, password_hash, profile_text, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NULL, $5, $5)
            ",
        )
        .bind(id.to_string())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create user: {e}")))?;

        Ok(User {
            id,
            email: email.to_owned(),
            name: name.map(ToOwned::to_owned),
            password_hash: password_hash.to_owned(),
            profile_text: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Look up a user by email
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, email, name, password_hash, profile_text, created_at, updated_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user by email: {e}")))?;

        row.map(row_to_user).transpose()
    }

    /// Look up a user by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, email, name, password_hash, profile_text, created_at, updated_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;

        row.map(row_to_user).transpose()
    }

    /// Update account fields; `None` leaves a field unchanged
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_user_account(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        name: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                updated_at = $4
            WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .bind(email)
        .bind(name)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update user: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the user's profile text
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_profile_text(&self, user_id: Uuid, profile_text: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET profile_text = $2, updated_at = $3
            WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .bind(profile_text)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update profile: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> AppResult<User> {
    let id_raw: String = row.get("id");
    let id = Uuid::parse_str(&id_raw)
        .map_err(|e| AppError::database(format!("Invalid user id '{id_raw}': {e}")))?;
    let created_raw: String = row.get("created_at");
    let updated_raw: String = row.get("updated_at");

    Ok(User {
        id,
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        profile_text: row.get("profile_text"),
        created_at: parse_timestamp(&created_raw, "created_at")?,
        updated_at: parse_timestamp(&updated_raw, "updated_at")?,
    })
}
