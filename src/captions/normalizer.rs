// ABOUTME: Caption text normalization and speaker-role classification
// ABOUTME: Builds the speaker-labeled content stored by the merge engine
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns a raw caption fragment into the labeled form persisted on the
//! conversation. The speaker label decides the message role: a fixed set of
//! second-person/self markers identifies the candidate's own speech, every
//! other label is attributed to the interviewer.

use crate::errors::{AppError, AppResult};
use crate::models::MessageRole;

/// Speaker labels marking the utterance as the candidate's own speech
///
/// English and Spanish second-person/self markers. Matched exactly against
/// the lower-cased trimmed label, never by substring.
const CANDIDATE_MARKERS: [&str; 5] = ["you", "tú", "tu", "yo", "me"];

/// Label used when the caption source provides no speaker
const DEFAULT_SPEAKER: &str = "Interviewer";

/// A caption fragment after normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCaption {
    /// Speaker-labeled text as stored in the message row
    pub formatted: String,
    /// Raw utterance with surrounding whitespace removed; this is what the
    /// question classifier sees
    pub text: String,
    /// Which side of the interview spoke
    pub role: MessageRole,
}

/// Normalize a raw caption fragment
///
/// The formatted text is `"{speaker} ({platform}): {text}"` when a platform
/// tag is present, `"{speaker}: {text}"` otherwise. A blank speaker falls
/// back to `"Interviewer"`.
///
/// # Errors
///
/// Returns a validation error when `text` contains no visible characters.
pub fn normalize_caption(
    text: &str,
    speaker: Option<&str>,
    platform: Option<&str>,
) -> AppResult<NormalizedCaption> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::invalid_input("text is required"));
    }

    let speaker = speaker
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SPEAKER);
    let platform = platform.map(str::trim).filter(|p| !p.is_empty());

    let formatted = match platform {
        Some(platform) => format!("{speaker} ({platform}): {text}"),
        None => format!("{speaker}: {text}"),
    };

    Ok(NormalizedCaption {
        formatted,
        text: text.to_owned(),
        role: classify_speaker(speaker),
    })
}

/// Message role for a speaker label
#[must_use]
pub fn classify_speaker(speaker: &str) -> MessageRole {
    let normalized = speaker.trim().to_lowercase();
    if CANDIDATE_MARKERS.contains(&normalized.as_str()) {
        MessageRole::User
    } else {
        MessageRole::Interviewer
    }
}
