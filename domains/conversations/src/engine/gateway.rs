//! AI gateway adapter
//!
//! Turns stored conversation messages into a provider chat request and the
//! provider reply into message content plus deduplicated sources. The gateway
//! is stateless and never retries.

use std::sync::Arc;

use aidline_llm::{
    normalize_sources, ChatRequest, Content, GenerateRequest, LlmError, LlmRole, LlmService, Part,
};

use crate::domain::attachments::decode_data_url;
use crate::domain::entities::{Message, MessageRole, Source};

/// Normalized reply of a chat call
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    pub text: String,
    pub sources: Vec<Source>,
}

fn to_role(role: MessageRole) -> LlmRole {
    match role {
        MessageRole::User => LlmRole::User,
        MessageRole::Model => LlmRole::Model,
    }
}

/// Text part first, then one inline part per decodable attachment
fn to_parts(message: &Message) -> Vec<Part> {
    let mut parts = Vec::new();
    if !message.content.is_empty() {
        parts.push(Part::Text(message.content.clone()));
    }

    for attachment in message.attachments.iter().flatten() {
        match decode_data_url(&attachment.data) {
            Ok(decoded) => parts.push(Part::InlineData {
                mime_type: attachment.mime_type.clone(),
                data: decoded.data,
            }),
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    attachment = %attachment.name,
                    error = %e,
                    "Skipping undecodable attachment"
                );
            }
        }
    }

    parts
}

/// Convert messages to provider turns. The welcome message and entries
/// without any part are dropped.
pub fn build_contents(messages: &[Message]) -> Vec<Content> {
    messages
        .iter()
        .filter(|m| !m.is_welcome())
        .map(|m| Content {
            role: to_role(m.role),
            parts: to_parts(m),
        })
        .filter(|c| !c.parts.is_empty())
        .collect()
}

#[derive(Clone)]
pub struct AiGateway {
    llm: Arc<dyn LlmService>,
}

impl AiGateway {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }

    /// Send `history`, whose last element is the just-composed user turn.
    /// Everything before it becomes session context.
    pub async fn send(
        &self,
        history: &[Message],
        system_instruction: String,
        use_search_tool: bool,
    ) -> Result<GatewayReply, LlmError> {
        let mut contents = build_contents(history);
        let last = contents
            .pop()
            .ok_or_else(|| LlmError::Request("Nothing to send".to_string()))?;

        let request = ChatRequest {
            system_instruction: Some(system_instruction),
            history: contents,
            message: last.parts,
            use_search_tool,
            temperature: None,
        };

        tracing::debug!(
            history_len = request.history.len(),
            parts = request.message.len(),
            model = self.llm.default_model(),
            "Dispatching chat request"
        );

        let response = self.llm.chat(request).await?;
        if response.text.trim().is_empty() {
            return Err(LlmError::Malformed("Reply has no text".to_string()));
        }

        // Providers other than Gemini may not deduplicate
        let sources = normalize_sources(
            response
                .sources
                .into_iter()
                .map(|s| (Some(s.uri), Some(s.title))),
        );

        Ok(GatewayReply {
            text: response.text,
            sources: sources.into_iter().map(Source::from).collect(),
        })
    }

    /// Plain text completion without tools or system instruction
    pub async fn complete(&self, prompt: String, temperature: f32) -> Result<String, LlmError> {
        self.llm
            .generate(GenerateRequest {
                prompt,
                temperature: Some(temperature),
            })
            .await
    }
}
