// ABOUTME: Core data models for conversations, messages, and users
// ABOUTME: Defines MessageRole, MessageStatus, ResponseMode and API payload shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! # Data Models
//!
//! Core data structures shared by the caption pipeline, the persistence
//! layer, and the HTTP API. Conversations and messages use string UUIDs
//! and RFC 3339 UTC timestamps; role/status enums convert to and from
//! their stored string forms.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;

/// Speaker role of a message
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The interviewer's transcribed speech
    Interviewer,
    /// The candidate (the person being helped)
    User,
    /// AI-generated suggestion or reply
    Assistant,
    /// System instruction
    System,
}

impl MessageRole {
    /// Convert to string for database storage
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Interviewer => "interviewer",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interviewer" => Ok(Self::Interviewer),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(AppError::invalid_input(format!("Invalid message role: {s}")).into()),
        }
    }
}

impl Display for MessageRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a message
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Live caption captured by the merge engine
    Captured,
    /// Assistant suggestion produced by the pipeline
    Suggestion,
    /// Completed assistant reply to an explicit user message
    Completed,
}

impl MessageStatus {
    /// Convert to string for database storage
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Captured => "captured",
            Self::Suggestion => "suggestion",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for MessageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "captured" => Ok(Self::Captured),
            "suggestion" => Ok(Self::Suggestion),
            "completed" => Ok(Self::Completed),
            _ => Err(AppError::invalid_input(format!("Invalid message status: {s}")).into()),
        }
    }
}

impl Display for MessageStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// How assistant suggestions are triggered for a caption request
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Pipeline generates suggestions for question-like interviewer captions
    #[default]
    Auto,
    /// Suggestions only on explicit request; automatic generation suppressed
    ManualLastInterviewer,
}

impl ResponseMode {
    /// Convert to the wire string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::ManualLastInterviewer => "manual_last_interviewer",
        }
    }

    /// Parse from string with fallback to `Auto`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim() {
            "manual_last_interviewer" => Self::ManualLastInterviewer,
            _ => Self::Auto,
        }
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    /// Email address, stored lower-cased
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Hashed password for authentication
    pub password_hash: String,
    /// Free-form background text used to personalize suggestions
    pub profile_text: Option<String>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// Last profile update
    pub updated_at: DateTime<Utc>,
}

/// An interview session owning an ordered sequence of messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Optional title
    pub title: Option<String>,
    /// Per-conversation system prompt override
    pub ai_system_prompt: Option<String>,
    /// Per-conversation model override
    pub ai_model: Option<String>,
    /// Per-conversation API key override
    pub ai_api_key: Option<String>,
    /// Running summary of older turns
    pub ai_summary: Option<String>,
    /// Id of the last message folded into the summary
    pub ai_summary_message_id: Option<String>,
    /// Watermark: messages updated after this feed the next summary pass
    pub ai_summary_updated_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// JSON payload for API responses
    ///
    /// Timestamps and references are emitted under both camelCase and
    /// snake_case keys for client compatibility. `lastMessage` carries the
    /// most recent message's content. The API key is never echoed back.
    #[must_use]
    pub fn to_api_json(&self, last_message: Option<&Message>) -> Value {
        let last_content = last_message.map(|m| m.content.clone());
        json!({
            "id": self.id,
            "userId": self.user_id,
            "user_id": self.user_id,
            "title": self.title,
            "aiSystemPrompt": self.ai_system_prompt,
            "ai_system_prompt": self.ai_system_prompt,
            "aiModel": self.ai_model,
            "ai_model": self.ai_model,
            "ai_summary": self.ai_summary,
            "createdAt": self.created_at.to_rfc3339(),
            "created_at": self.created_at.to_rfc3339(),
            "updatedAt": self.updated_at.to_rfc3339(),
            "updated_at": self.updated_at.to_rfc3339(),
            "lastMessage": last_content,
            "last_message": last_content,
        })
    }
}

/// One conversation turn: a captured caption, a manual message, or an
/// assistant suggestion/reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Authoring user, when applicable
    pub user_id: Option<String>,
    /// Speaker role
    pub role: MessageRole,
    /// Message text; always present
    pub content: String,
    /// Lifecycle status
    pub status: MessageStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last content update; bumped by the merge engine's in-place path
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// JSON payload for API responses and stream events
    ///
    /// Emits both camelCase and snake_case variants of the reference and
    /// timestamp keys.
    #[must_use]
    pub fn to_api_json(&self) -> Value {
        json!({
            "id": self.id,
            "conversationId": self.conversation_id,
            "conversation_id": self.conversation_id,
            "userId": self.user_id,
            "user_id": self.user_id,
            "role": self.role.as_str(),
            "content": self.content,
            "status": self.status.as_str(),
            "createdAt": self.created_at.to_rfc3339(),
            "created_at": self.created_at.to_rfc3339(),
            "updatedAt": self.updated_at.to_rfc3339(),
            "updated_at": self.updated_at.to_rfc3339(),
        })
    }
}

/// Generate a new string UUID for conversation/message rows
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_storage_form() {
        for role in [
            MessageRole::Interviewer,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::System,
        ] {
            assert_eq!(MessageRole::from_str(role.as_str()).unwrap(), role);
        }
        assert!(MessageRole::from_str("moderator").is_err());
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            MessageStatus::Captured,
            MessageStatus::Suggestion,
            MessageStatus::Completed,
        ] {
            assert_eq!(MessageStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn response_mode_defaults_to_auto() {
        assert_eq!(ResponseMode::from_str_or_default(""), ResponseMode::Auto);
        assert_eq!(
            ResponseMode::from_str_or_default("manual_last_interviewer"),
            ResponseMode::ManualLastInterviewer
        );
        assert_eq!(
            ResponseMode::from_str_or_default("something_else"),
            ResponseMode::Auto
        );
    }

    #[test]
    fn message_payload_exposes_both_key_casings() {
        let now = Utc::now();
        let msg = Message {
            id: new_id(),
            conversation_id: "c1".into(),
            user_id: Some("u1".into()),
            role: MessageRole::Interviewer,
            content: "Interviewer: hello".into(),
            status: MessageStatus::Captured,
            created_at: now,
            updated_at: now,
        };
        let payload = msg.to_api_json();
        assert_eq!(payload["conversationId"], payload["conversation_id"]);
        assert_eq!(payload["createdAt"], payload["created_at"]);
        assert_eq!(payload["role"], "interviewer");
        assert_eq!(payload["status"], "captured");
    }
}
