// ABOUTME: Pre-generation gates deciding whether a caption earns an AI suggestion
// ABOUTME: Throttles suggestion frequency and suppresses re-answering old captions

//! # Generation Gates
//!
//! A caption that survives the merge engine does not automatically earn an
//! assistant suggestion. Two time-based gates run first:
//!
//! - **Throttle**: at most one automatic suggestion per conversation every
//!   `throttle_interval_secs`; live transcription produces caption updates
//!   far faster than a candidate can read answers.
//! - **Already-suggested guard**: a caption that merged into an existing row
//!   keeps its original `created_at`, so a suggestion generated after that
//!   point means this utterance was already answered.
//!
//! Both decisions are pure over rows the orchestrator has already loaded.

use chrono::{DateTime, Duration, Utc};

use crate::models::Message;

/// Whether the suggestion throttle permits generating now
///
/// Allows when the conversation has no assistant message yet, or when the
/// latest one is strictly older than the throttle interval.
#[must_use]
pub fn throttle_allows(
    last_assistant: Option<&Message>,
    now: DateTime<Utc>,
    interval_secs: i64,
) -> bool {
    last_assistant.map_or(true, |message| {
        now.signed_duration_since(message.created_at) > Duration::seconds(interval_secs)
    })
}

/// Whether this caption already has a suggestion
///
/// True when a suggestion exists that was created at or after the caption's
/// `created_at`. Merged captions keep their original creation time, so an
/// extended utterance stays answered by the suggestion it already got.
#[must_use]
pub fn already_suggested(latest_suggestion: Option<&Message>, caption: &Message) -> bool {
    latest_suggestion.is_some_and(|suggestion| suggestion.created_at >= caption.created_at)
}
