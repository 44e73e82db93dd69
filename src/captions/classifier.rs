// ABOUTME: Question-likeness heuristic for captured utterances
// ABOUTME: Literal question-mark check plus bilingual word-boundary patterns
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic that decides whether a captured utterance warrants an
//! assistant suggestion. Live captioning frequently drops punctuation, so a
//! missing question mark is not trusted: the text is also matched against
//! interrogative openers in English and Spanish.

use std::sync::LazyLock;

use regex::Regex;

// Patterns are stored as Option to handle compilation failures gracefully
// (should never fail for static patterns).

/// English interrogative openers and auxiliaries
static ENGLISH_OPENERS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(can you|could you|would you|tell me|explain|how|what|why|when|where)\b").ok()
});

/// English prompting phrases that rarely carry a question mark
static ENGLISH_PROMPTS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(walk me through|describe|give me an example|share an example)\b").ok()
});

/// Spanish interrogatives, with and without their accented spellings
static SPANISH_OPENERS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\b(puedes|podrias|podrías|como|cómo|que|qué|por que|por qué|cuando|cuándo|donde|dónde)\b",
    )
    .ok()
});

/// True when the utterance reads like a question
///
/// A literal `?` anywhere is decisive. Otherwise the lower-cased, trimmed
/// text is tested against the bilingual opener patterns.
#[must_use]
pub fn is_question_like(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }

    let lowered = text.to_lowercase();
    let normalized = lowered.trim();

    for pattern in [&ENGLISH_OPENERS, &ENGLISH_PROMPTS, &SPANISH_OPENERS] {
        if let Some(regex) = pattern.as_ref() {
            if regex.is_match(normalized) {
                return true;
            }
        }
    }

    false
}
