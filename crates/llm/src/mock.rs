//! Mock LLM Service Implementation
//!
//! Programmable mock used by `LlmServiceFactory` when the provider is `mock`,
//! and by tests:
//! - queued replies for `chat` and `generate` (default: echo the first text part)
//! - optional delay before answering
//! - recording of every request for assertions

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{ChatRequest, ChatResponse, GenerateRequest, LlmError, LlmService, Part};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MockState {
    chat_replies: VecDeque<Result<ChatResponse, LlmError>>,
    generate_replies: VecDeque<Result<String, LlmError>>,
    chat_requests: Vec<ChatRequest>,
    generate_requests: Vec<GenerateRequest>,
    delay_ms: u64,
}

/// Mock LLM service with programmable behavior
#[derive(Debug, Clone, Default)]
pub struct MockLlmService {
    state: Arc<Mutex<MockState>>,
}

impl MockLlmService {
    /// Create a new mock LLM service
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next `chat` call
    pub fn push_chat_reply(&self, reply: Result<ChatResponse, LlmError>) {
        lock(&self.state).chat_replies.push_back(reply);
    }

    /// Queue the outcome of the next `generate` call
    pub fn push_generate_reply(&self, reply: Result<String, LlmError>) {
        lock(&self.state).generate_replies.push_back(reply);
    }

    /// Delay every answer, to observe in-flight state
    pub fn set_delay_ms(&self, delay: u64) {
        lock(&self.state).delay_ms = delay;
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        lock(&self.state).chat_requests.clone()
    }

    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        lock(&self.state).generate_requests.clone()
    }

    async fn pause(&self) {
        let delay = lock(&self.state).delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait::async_trait]
impl LlmService for MockLlmService {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        tracing::info!("Mock LLM service processing chat request");

        let last_text = request
            .message
            .iter()
            .find_map(|p| match p {
                Part::Text(t) => Some(t.clone()),
                Part::InlineData { .. } => None,
            })
            .unwrap_or_else(|| "empty".to_string());

        let queued = {
            let mut state = lock(&self.state);
            state.chat_requests.push(request);
            state.chat_replies.pop_front()
        };

        self.pause().await;

        queued.unwrap_or_else(|| {
            Ok(ChatResponse {
                text: format!("Mock response to: {}", last_text),
                sources: Vec::new(),
            })
        })
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        tracing::info!("Mock LLM service processing generate request");

        let queued = {
            let mut state = lock(&self.state);
            state.generate_requests.push(request);
            state.generate_replies.pop_front()
        };

        self.pause().await;

        queued.unwrap_or_else(|| Ok("Mock title".to_string()))
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}
