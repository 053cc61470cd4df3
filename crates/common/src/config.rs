//! Configuration loaded from environment variables
//!
//! The only required value is the AI provider credential. Its absence is a
//! startup-fatal configuration error.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_DATA_DIR: &str = ".aidline";
/// Used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "aidline=info";

/// Which AI provider backs the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Mock,
}

impl std::str::FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Configuration(format!(
                "Unknown LLM provider: {}. Supported providers: gemini, mock",
                other
            ))),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub provider: LlmProvider,

    /// Gemini API key (empty only for the mock provider)
    pub api_key: String,
    pub model: String,
    pub base_url: String,

    /// Directory backing the local key/value store
    pub data_dir: PathBuf,

    pub rust_log: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("data_dir", &self.data_dir)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let provider: LlmProvider = env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "gemini".to_string())
            .parse()?;

        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());

        let api_key = match (provider, api_key) {
            (_, Some(key)) => key,
            (LlmProvider::Mock, None) => String::new(),
            (LlmProvider::Gemini, None) => {
                return Err(Error::Configuration(
                    "GEMINI_API_KEY is required".to_string(),
                ))
            }
        };

        let config = Self {
            provider,
            api_key,
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            data_dir: env::var("AIDLINE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        };

        tracing::debug!(provider = %config.provider, model = %config.model, "Configuration loaded");

        Ok(config)
    }
}
