// ABOUTME: Scripted LLM provider for integration tests
// ABOUTME: Queued responses, call counting, and optional artificial latency

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use apuntador::errors::AppError;
use apuntador::llm::{
    ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider, StreamChunk,
};

/// One scripted provider turn
#[derive(Clone)]
pub enum ScriptedTurn {
    /// Succeed with this content
    Reply(String),
    /// Fail with a provider error carrying this message
    Fail(String),
}

/// Deterministic in-process provider
///
/// Turns are consumed in order; when the script runs out, the provider
/// repeats its last turn. `delay` holds every call open, which lets the
/// lock-contention tests overlap two generations reliably.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ScriptedTurn>>,
    last: Mutex<ScriptedTurn>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn replying(content: &str) -> Arc<Self> {
        Self::with_script(vec![ScriptedTurn::Reply(content.to_owned())])
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::with_script(vec![ScriptedTurn::Fail(message.to_owned())])
    }

    pub fn with_script(turns: Vec<ScriptedTurn>) -> Arc<Self> {
        let last = turns
            .last()
            .cloned()
            .unwrap_or_else(|| ScriptedTurn::Reply("scripted reply".to_owned()));
        Arc::new(Self {
            script: Mutex::new(turns.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
            delay: None,
        })
    }

    pub fn slow_replying(content: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::from(vec![ScriptedTurn::Reply(content.to_owned())])),
            last: Mutex::new(ScriptedTurn::Reply(content.to_owned())),
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_turn(&self) -> ScriptedTurn {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().expect("script lock poisoned");
        script
            .pop_front()
            .unwrap_or_else(|| self.last.lock().expect("last lock poisoned").clone())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn display_name(&self) -> &'static str {
        "Scripted test provider"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_turn() {
            ScriptedTurn::Reply(content) => Ok(ChatResponse {
                content,
                model: request
                    .model
                    .clone()
                    .unwrap_or_else(|| "scripted-model".to_owned()),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            ScriptedTurn::Fail(message) => Err(AppError::provider("scripted", message)),
        }
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_turn() {
            ScriptedTurn::Reply(content) => {
                // Split the reply into word chunks so clients see more than
                // one delta
                let mut chunks: Vec<Result<StreamChunk, AppError>> = content
                    .split_inclusive(' ')
                    .map(|word| {
                        Ok(StreamChunk {
                            delta: word.to_owned(),
                            is_final: false,
                            finish_reason: None,
                        })
                    })
                    .collect();
                chunks.push(Ok(StreamChunk {
                    delta: String::new(),
                    is_final: true,
                    finish_reason: Some("stop".to_owned()),
                }));
                Ok(Box::pin(tokio_stream::iter(chunks)))
            }
            ScriptedTurn::Fail(message) => Err(AppError::provider("scripted", message)),
        }
    }
}
