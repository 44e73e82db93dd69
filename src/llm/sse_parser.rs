// ABOUTME: Line-buffering SSE parser for upstream AI streaming responses
// ABOUTME: Handles partial lines across TCP boundaries and batched events
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # SSE Stream Parser
//!
//! A line-buffering parser for the Server-Sent Events framing used by
//! `OpenAI`-compatible streaming endpoints. Two failure modes make naive
//! per-chunk parsing incorrect:
//!
//! 1. **Multiple events per TCP chunk**: network buffers batch several SSE
//!    events into a single `bytes_stream()` chunk, and every one of them
//!    must be emitted.
//!
//! 2. **Partial payloads across TCP boundaries**: a JSON payload split
//!    across two chunks must be buffered until the terminating newline
//!    arrives.
//!
//! The provider supplies a `parse_data` closure that converts raw JSON
//! payloads into [`StreamChunk`] values. SSE framing (line buffering,
//! `data:` prefix stripping, `[DONE]` detection) is handled once here.

use std::mem;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Parse one complete, whitespace-trimmed SSE line
///
/// Empty lines (event separators) and non-data fields (`event:`, `id:`,
/// `retry:`, comments) produce no event.
fn parse_line(line: &str) -> Option<SseEvent> {
    if line.is_empty() {
        return None;
    }
    if line == "data: [DONE]" {
        return Some(SseEvent::Done);
    }
    let data = line.strip_prefix("data: ")?;
    if data.trim().is_empty() {
        return None;
    }
    Some(SseEvent::Data(data.to_owned()))
}

/// Line-buffering SSE parser that tolerates arbitrary TCP chunking
///
/// SSE streams are newline-delimited and TCP does not align chunks with
/// event boundaries. Incomplete trailing lines stay buffered until the
/// next `feed()` completes them.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Accumulated bytes not yet terminated by a newline
    buffer: String,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a TCP chunk, returning any complete SSE events
    ///
    /// Complete lines (terminated by `\n`) are extracted and parsed; any
    /// trailing partial line remains buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let rest = self.buffer.split_off(newline_pos + 1);
            let line = mem::replace(&mut self.buffer, rest);
            if let Some(event) = parse_line(line.trim()) {
                events.push(event);
            }
        }
        events
    }

    /// Flush any remaining buffered content as a final event
    ///
    /// Called when the byte stream ends with a partial line still buffered
    /// (no trailing newline).
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(remaining.trim())
    }
}

/// Create a properly-buffered SSE chunk stream from a raw byte stream
///
/// Wraps a `reqwest` byte stream with SSE line buffering. The `parse_data`
/// closure converts provider-specific JSON payloads into [`StreamChunk`]
/// values; returning `None` skips events with no output (metadata-only
/// chunks). Empty deltas are filtered out unless final.
pub fn create_sse_stream<S, F>(
    byte_stream: S,
    parse_data: F,
    provider_name: &'static str,
) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut parser = SseLineBuffer::new();
        let mut byte_stream = Box::pin(byte_stream);
        let mut finished = false;

        while let Some(next) = byte_stream.next().await {
            match next {
                Ok(bytes) => {
                    for event in parser.feed(&bytes) {
                        match event {
                            SseEvent::Data(payload) => {
                                if let Some(result) = parse_data(&payload) {
                                    yield result;
                                }
                            }
                            SseEvent::Done => {
                                finished = true;
                                yield Ok(terminal_chunk());
                            }
                        }
                    }
                    if finished {
                        return;
                    }
                }
                Err(e) => {
                    yield Err(AppError::provider(
                        provider_name,
                        format!("Stream read error: {e}"),
                    ));
                    return;
                }
            }
        }

        // Byte stream ended without [DONE]; drain the partial line
        match parser.flush() {
            Some(SseEvent::Data(payload)) => {
                if let Some(result) = parse_data(&payload) {
                    yield result;
                }
            }
            Some(SseEvent::Done) => yield Ok(terminal_chunk()),
            None => {}
        }
    };

    let filtered = stream.filter(|result| {
        future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    });

    Box::pin(filtered)
}

fn terminal_chunk() -> StreamChunk {
    StreamChunk {
        delta: String::new(),
        is_final: true,
        finish_reason: Some("stop".to_owned()),
    }
}

// ============================================================================
// Retry Configuration
// ============================================================================

/// Retry configuration for upstream AI requests
///
/// Retries only cover the initial HTTP request. Once bytes start flowing,
/// the stream is not retried since the client may have already consumed
/// partial output.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    /// Initial delay before first retry (milliseconds)
    pub initial_delay_ms: u64,
    /// Maximum delay cap for exponential backoff (milliseconds)
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Default retry config: 3 retries, 500ms initial, 5s max
    #[must_use]
    pub const fn default_config() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }

    /// Exponential backoff delay with jitter for a given attempt
    ///
    /// `delay = min(initial_ms * 2^attempt, max_ms) + jitter(0..100ms)`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay_ms.saturating_mul(1_u64 << attempt);
        let capped_delay = base_delay.min(self.max_delay_ms);
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::from(d.subsec_millis()))
            % 100;
        Duration::from_millis(capped_delay + jitter)
    }
}

/// Check if an HTTP error status code is retryable
///
/// Transient conditions that may resolve on retry: 429 rate limiting,
/// 502 upstream issues, 503 temporary overload.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503)
}

/// Check if a request error is retryable (connection/timeout errors)
#[must_use]
pub fn is_retryable_request_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}
