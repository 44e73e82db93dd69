// ABOUTME: Caption ingestion core: normalization, merge decisions, question heuristics
// ABOUTME: Pure decision logic; streaming and gating sit on top in the services layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Caption Pipeline Core
//!
//! Live transcription arrives as overlapping partial fragments: the same
//! utterance is resubmitted as it grows, interleaved with fragments from the
//! other speaker. This module turns that stream into stable message rows.
//!
//! - [`normalizer`] builds the speaker-labeled text and classifies which
//!   side of the interview spoke.
//! - [`merge`] decides whether a fragment duplicates, extends, or starts an
//!   utterance, and applies the decision to the conversation.
//! - [`classifier`] decides whether a captured utterance reads like a
//!   question worth suggesting an answer to.
//!
//! Throttling, lock management, and streaming are handled by the caption
//! service that drives these pieces.

pub mod classifier;
pub mod gates;
pub mod merge;
pub mod normalizer;
pub mod orchestrator;

pub use classifier::is_question_like;
pub use gates::{already_suggested, throttle_allows};
pub use merge::{decide_merge, merge_caption, MergeAction, MergeOutcome};
pub use normalizer::{normalize_caption, NormalizedCaption};
pub use orchestrator::{CaptionEvent, CaptionOutcome, CaptionPipeline};
