// ABOUTME: Duplicate suppression and incremental-merge decisions for live captions
// ABOUTME: Applies each decision against the most recent same-role message row
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Caption Merge Engine
//!
//! Live transcription resubmits an utterance as it grows: "I worked with",
//! then "I worked with Ruby on Rails". The engine keeps such growth inside
//! one message row instead of flooding the conversation, while genuinely new
//! utterances still get their own rows.
//!
//! Two windows govern the decision. Byte-identical resubmissions are dropped
//! when the row was updated inside the duplicate window; a caption may merge
//! into the previous row only while that row's creation is inside the merge
//! window. Duplicate suppression keys on `updated_at` because a long-merged
//! row is still "fresh" long after it was created.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::normalizer::NormalizedCaption;
use crate::config::environment::CaptionConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{Message, MessageStatus};

/// What to do with an incoming caption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Byte-identical resubmission updated moments ago; drop the event
    Skip,
    /// The row already carries exactly this content; no write needed
    KeepExisting,
    /// The caption extends the previous utterance; rewrite that row
    UpdateInPlace,
    /// A new utterance; insert a fresh row
    CreateNew,
}

/// Result of applying a merge decision to the conversation
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// Duplicate suppressed; nothing was persisted
    Skipped,
    /// Existing row returned untouched
    Unchanged(Message),
    /// Existing row rewritten in place
    Updated(Message),
    /// Fresh row inserted
    Created(Message),
}

impl MergeOutcome {
    /// The committed caption message, when one exists
    #[must_use]
    pub const fn message(&self) -> Option<&Message> {
        match self {
            Self::Skipped => None,
            Self::Unchanged(message) | Self::Updated(message) | Self::Created(message) => {
                Some(message)
            }
        }
    }

    /// Consume the outcome, yielding the committed message
    #[must_use]
    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Skipped => None,
            Self::Unchanged(message) | Self::Updated(message) | Self::Created(message) => {
                Some(message)
            }
        }
    }

    /// True when the event was dropped as a duplicate
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Decide how an incoming caption relates to the latest same-role message
#[must_use]
pub fn decide_merge(
    last: Option<&Message>,
    formatted: &str,
    now: DateTime<Utc>,
    config: &CaptionConfig,
) -> MergeAction {
    let Some(last) = last else {
        return MergeAction::CreateNew;
    };

    let same_content = last.content == formatted;

    if same_content
        && now.signed_duration_since(last.updated_at)
            < Duration::seconds(config.duplicate_window_secs)
    {
        return MergeAction::Skip;
    }

    if now.signed_duration_since(last.created_at) >= Duration::seconds(config.merge_window_secs) {
        return MergeAction::CreateNew;
    }

    if same_content {
        return MergeAction::KeepExisting;
    }

    if is_incremental_update(&last.content, formatted, config.merge_prefix_ratio) {
        MergeAction::UpdateInPlace
    } else {
        MergeAction::CreateNew
    }
}

/// True when one caption is a prefix-compatible growth of the other
///
/// Both texts are reduced to normalized bodies first: the speaker label
/// (everything up to the first `:`) is stripped, the remainder lower-cased
/// with internal whitespace collapsed. Strict growth in either direction
/// counts; otherwise the shared prefix must cover at least `prefix_ratio`
/// of the shorter body.
#[must_use]
pub fn is_incremental_update(previous: &str, next: &str, prefix_ratio: f64) -> bool {
    let previous = normalized_body(previous);
    let next = normalized_body(next);

    if previous.is_empty() || next.is_empty() {
        return false;
    }
    if next.starts_with(&previous) || previous.starts_with(&next) {
        return true;
    }

    let shared = common_prefix_chars(&previous, &next);
    let shorter = previous.chars().count().min(next.chars().count());
    shared as f64 >= (prefix_ratio * shorter as f64).floor()
}

/// Caption text reduced to its comparable body
fn normalized_body(formatted: &str) -> String {
    let body = formatted.split_once(':').map_or(formatted, |(_, rest)| rest);
    body.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Length in characters of the shared prefix of two strings
fn common_prefix_chars(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(left, right)| left == right)
        .count()
}

/// Merge a normalized caption into its conversation
///
/// Reads the latest message of the caption's role, decides, and applies.
/// The read-then-write sequence is not serialized across concurrent
/// requests; the caption source is a single live stream and submits
/// roughly sequentially.
///
/// # Errors
///
/// Returns an error when a database read or write fails.
pub async fn merge_caption(
    database: &Database,
    config: &CaptionConfig,
    conversation_id: &str,
    user_id: &str,
    caption: &NormalizedCaption,
) -> AppResult<MergeOutcome> {
    let last = database
        .latest_message_of_role(conversation_id, caption.role)
        .await?;
    let action = decide_merge(last.as_ref(), &caption.formatted, Utc::now(), config);

    debug!(
        conversation_id,
        role = caption.role.as_str(),
        action = ?action,
        "caption merge decision"
    );

    match (action, last) {
        (MergeAction::Skip, _) => Ok(MergeOutcome::Skipped),
        (MergeAction::KeepExisting, Some(existing)) => Ok(MergeOutcome::Unchanged(existing)),
        (MergeAction::UpdateInPlace, Some(existing)) => {
            let updated = database
                .update_message_content(&existing.id, &caption.formatted, MessageStatus::Captured)
                .await?;
            match updated {
                Some(message) => Ok(MergeOutcome::Updated(message)),
                // Row vanished between read and write; fall back to insert
                None => create_caption_row(database, conversation_id, user_id, caption).await,
            }
        }
        (MergeAction::CreateNew | MergeAction::KeepExisting | MergeAction::UpdateInPlace, _) => {
            create_caption_row(database, conversation_id, user_id, caption).await
        }
    }
}

async fn create_caption_row(
    database: &Database,
    conversation_id: &str,
    user_id: &str,
    caption: &NormalizedCaption,
) -> AppResult<MergeOutcome> {
    let message = database
        .create_message(
            conversation_id,
            Some(user_id),
            caption.role,
            &caption.formatted,
            MessageStatus::Captured,
        )
        .await?;
    Ok(MergeOutcome::Created(message))
}
