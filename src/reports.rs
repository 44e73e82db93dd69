// ABOUTME: Plain-text transcript report rendering for conversation downloads
// ABOUTME: Filters to spoken turns and formats a timestamped numbered transcript
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Transcript Reports
//!
//! Renders a conversation into a downloadable plain-text transcript. Only
//! the spoken turns appear (interviewer captions and candidate messages);
//! assistant suggestions and system entries are coaching artifacts, not part
//! of what was said.

use chrono::{DateTime, Utc};

use crate::models::{Conversation, Message, MessageRole};

/// A rendered transcript ready to download
#[derive(Debug, Clone)]
pub struct TranscriptReport {
    /// Suggested download filename
    pub filename: String,
    /// Plain-text report body
    pub content: String,
}

/// Render the transcript report for a conversation
///
/// `messages` must be in chronological order; roles other than interviewer
/// and user are dropped here.
#[must_use]
pub fn build_report(
    conversation: &Conversation,
    messages: &[Message],
    generated_at: DateTime<Utc>,
) -> TranscriptReport {
    TranscriptReport {
        filename: build_filename(conversation, generated_at),
        content: build_content(conversation, messages, generated_at),
    }
}

fn build_filename(conversation: &Conversation, generated_at: DateTime<Utc>) -> String {
    let slug = conversation
        .title
        .as_deref()
        .map(parameterize)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| format!("conversation-{}", conversation.id));
    let timestamp = generated_at.format("%Y%m%d-%H%M%S");
    format!("reporte-{slug}-{timestamp}.txt")
}

fn build_content(
    conversation: &Conversation,
    messages: &[Message],
    generated_at: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        format!("Conversation ID: {}", conversation.id),
        format!(
            "Title: {}",
            conversation.title.as_deref().unwrap_or("Sin titulo")
        ),
        format!("Generated At (UTC): {}", iso8601(generated_at)),
        String::new(),
        "Messages:".to_owned(),
    ];

    let spoken: Vec<&Message> = messages
        .iter()
        .filter(|message| {
            matches!(message.role, MessageRole::Interviewer | MessageRole::User)
        })
        .collect();

    if spoken.is_empty() {
        lines.push("No messages found for roles interviewer/user.".to_owned());
    } else {
        for (index, message) in spoken.iter().enumerate() {
            lines.push(format_entry(index + 1, message));
        }
    }

    format!("{}\n", lines.join("\n").trim())
}

fn format_entry(index: usize, message: &Message) -> String {
    let label = if message.role == MessageRole::Interviewer {
        "Interviewer"
    } else {
        "User"
    };
    format!(
        "{index}. [{}] {label}\n{}",
        iso8601(message.created_at),
        message.content.trim()
    )
}

fn iso8601(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// URL-safe slug: lowercase ASCII alphanumerics joined by single dashes
fn parameterize(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}
