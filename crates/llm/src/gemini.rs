//! Google Gemini API Implementation
//!
//! Calls the Gemini `generateContent` endpoint
//! (`{base}/v1beta/models/{model}:generateContent`) using reqwest.
//! Chat sessions are stateless on the wire: history and the live turn are
//! sent together as `contents`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    normalize_sources, ChatRequest, ChatResponse, Content, GenerateRequest, LlmConfig, LlmError,
    LlmRole, LlmService, Part,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: WireBlob,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

/// Gemini API error response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    status: Option<String>,
    message: String,
}

fn wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart::Text { text: text.clone() },
        Part::InlineData { mime_type, data } => WirePart::InlineData {
            inline_data: WireBlob {
                mime_type: mime_type.clone(),
                data: BASE64.encode(data),
            },
        },
    }
}

fn wire_content(content: &Content) -> WireContent {
    WireContent {
        role: Some(content.role.to_string()),
        parts: content.parts.iter().map(wire_part).collect(),
    }
}

fn user_turn(parts: &[Part]) -> WireContent {
    WireContent {
        role: Some(LlmRole::User.to_string()),
        parts: parts.iter().map(wire_part).collect(),
    }
}

/// Parse the provider reply into the fixed result type, rejecting other shapes.
fn normalize(response: GenerateContentResponse) -> Result<ChatResponse, LlmError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Malformed("response contained no candidates".to_string()))?;

    let texts: Vec<String> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();

    if texts.is_empty() {
        return Err(LlmError::Malformed(
            "first candidate contained no text".to_string(),
        ));
    }

    let sources = normalize_sources(
        candidate
            .grounding_metadata
            .map(|m| m.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .map(|web| (web.uri, web.title)),
    );

    Ok(ChatResponse {
        text: texts.join(""),
        sources,
    })
}

/// Gemini LLM service implementation
pub struct GeminiService {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

impl GeminiService {
    /// Create a new Gemini service
    pub fn new(config: LlmConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            client: Client::new(),
            config,
            base_url,
        }
    }

    async fn generate_content(
        &self,
        body: &GenerateContentRequest,
    ) -> Result<ChatResponse, LlmError> {
        let model = &self.config.default_model;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );

        tracing::debug!(model = %model, turns = body.contents.len(), "Sending Gemini API request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimit);
        }

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_body) {
                return Err(LlmError::Response(format!(
                    "Gemini API error ({}): {}",
                    error_response
                        .error
                        .status
                        .unwrap_or_else(|| status.to_string()),
                    error_response.error.message
                )));
            }

            return Err(LlmError::Response(format!(
                "Gemini API returned {}: {}",
                status, error_body
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("Failed to parse response: {}", e)))?;

        normalize(api_response)
    }
}

#[async_trait::async_trait]
impl LlmService for GeminiService {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        if request.message.is_empty() {
            return Err(LlmError::Request("live message has no parts".to_string()));
        }

        let mut contents: Vec<WireContent> = request.history.iter().map(wire_content).collect();
        contents.push(user_turn(&request.message));

        let tools = if request.use_search_tool {
            vec![WireTool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        let body = GenerateContentRequest {
            system_instruction: request.system_instruction.map(|text| WireContent {
                role: None,
                parts: vec![WirePart::Text { text }],
            }),
            contents,
            tools,
            generation_config: request
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        };

        self.generate_content(&body).await
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        let body = GenerateContentRequest {
            system_instruction: None,
            contents: vec![user_turn(&[Part::Text(request.prompt)])],
            tools: Vec::new(),
            generation_config: request
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        };

        Ok(self.generate_content(&body).await?.text)
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }
}
