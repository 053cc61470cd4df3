//! Aidline LLM Service
//!
//! Provider-neutral chat contract used by the conversation engine:
//! - Google Gemini `generateContent` integration for production
//! - Programmable mock service for testing and development
//! - Strict normalization of provider replies into `{ text, sources }`

pub mod gemini;
pub mod mock;

use std::collections::HashSet;
use std::sync::Arc;

use aidline_common::{Config, LlmProvider};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    #[error("LLM request error: {0}")]
    Request(String),

    #[error("LLM response error: {0}")]
    Response(String),

    #[error("LLM rate limit exceeded")]
    RateLimit,

    #[error("Malformed LLM response: {0}")]
    Malformed(String),
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Model,
}

impl std::fmt::Display for LlmRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmRole::User => write!(f, "user"),
            LlmRole::Model => write!(f, "model"),
        }
    }
}

/// One piece of a turn: text, or a raw inline image with its declared MIME type
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

/// A turn of conversation history
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: LlmRole,
    pub parts: Vec<Part>,
}

/// Chat request: prior history plus the live user turn
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system_instruction: Option<String>,
    pub history: Vec<Content>,
    pub message: Vec<Part>,
    pub use_search_tool: bool,
    pub temperature: Option<f32>,
}

/// Single-shot plain text generation (no history, no tools)
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
}

/// A citation returned by a search-grounded reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// Normalized chat reply
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatResponse {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// Keep entries carrying both a URI and a title, first occurrence of each URI wins.
pub fn normalize_sources<I>(candidates: I) -> Vec<GroundingSource>
where
    I: IntoIterator<Item = (Option<String>, Option<String>)>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|(uri, title)| match (uri, title) {
            (Some(uri), Some(title)) if !uri.is_empty() && !title.is_empty() => {
                Some(GroundingSource { uri, title })
            }
            _ => None,
        })
        .filter(|source| seen.insert(source.uri.clone()))
        .collect()
}

/// LLM service configuration
#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub default_model: String,
    pub base_url: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("default_model", &self.default_model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl From<&Config> for LlmConfig {
    fn from(config: &Config) -> Self {
        Self {
            provider: config.provider,
            api_key: config.api_key.clone(),
            default_model: config.model.clone(),
            base_url: Some(config.base_url.clone()),
        }
    }
}

/// LLM service trait for different providers
#[async_trait::async_trait]
pub trait LlmService: Send + Sync {
    /// Send the live message of a chat session. No retries.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Generate plain text from a single prompt
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError>;

    fn default_model(&self) -> &str;
}

/// Factory for creating LlmService implementations
pub struct LlmServiceFactory;

impl LlmServiceFactory {
    pub fn create(config: LlmConfig) -> Result<Arc<dyn LlmService>, LlmError> {
        match config.provider {
            LlmProvider::Gemini => {
                tracing::info!(model = %config.default_model, "Creating Gemini LLM service");
                if config.api_key.is_empty() {
                    return Err(LlmError::Configuration(
                        "GEMINI_API_KEY is required for Gemini provider".to_string(),
                    ));
                }
                Ok(Arc::new(gemini::GeminiService::new(config)))
            }
            LlmProvider::Mock => {
                tracing::info!("Creating mock LLM service");
                Ok(Arc::new(mock::MockLlmService::new()))
            }
        }
    }
}
