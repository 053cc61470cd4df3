//! Conversation title generation
//!
//! Runs detached after the first exchange of a conversation. The only effect
//! on engine state is a single rename; failures are logged and dropped.

use std::sync::Arc;

use aidline_common::i18n::TITLE_PROMPT;
use aidline_common::Translator;
use aidline_llm::LlmError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::gateway::AiGateway;
use super::store::SharedStore;

pub const TITLE_TEMPERATURE: f32 = 0.3;

const MAX_TITLE_CHARS: usize = 100;

/// First non-empty line, wrapping quotes and emphasis markers removed.
/// `None` when nothing usable remains.
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let cleaned: String = line
        .trim_matches(|c| matches!(c, '"' | '\'' | '«' | '»' | '“' | '”'))
        .replace('*', "")
        .trim()
        .to_string();

    if cleaned.is_empty() {
        return None;
    }

    if cleaned.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = cleaned.chars().take(MAX_TITLE_CHARS - 3).collect();
        return Some(format!("{}...", truncated.trim_end()));
    }

    Some(cleaned)
}

#[derive(Clone)]
pub struct TitleGenerator {
    gateway: AiGateway,
    translator: Arc<dyn Translator>,
}

impl TitleGenerator {
    pub fn new(gateway: AiGateway, translator: Arc<dyn Translator>) -> Self {
        Self {
            gateway,
            translator,
        }
    }

    pub fn prompt(&self, language: &str, user_text: &str, model_text: &str) -> String {
        format!(
            "{}\n\n---\n\nUSER: \"{}\"\n\nASSISTANT: \"{}\"",
            self.translator.translate(language, TITLE_PROMPT, &[]),
            user_text,
            model_text
        )
    }

    pub async fn generate(
        &self,
        language: &str,
        user_text: &str,
        model_text: &str,
    ) -> Result<Option<String>, LlmError> {
        let raw = self
            .gateway
            .complete(self.prompt(language, user_text, model_text), TITLE_TEMPERATURE)
            .await?;
        Ok(clean_title(&raw))
    }

    /// Detached task: generate then rename at most once
    pub fn spawn(
        &self,
        store: SharedStore,
        conversation_id: Uuid,
        language: String,
        user_text: String,
        model_text: String,
    ) -> JoinHandle<()> {
        let generator = self.clone();
        tokio::spawn(async move {
            match generator.generate(&language, &user_text, &model_text).await {
                Ok(Some(title)) => {
                    let renamed = store
                        .lock()
                        .await
                        .rename_conversation(conversation_id, &title)
                        .await;
                    tracing::debug!(%conversation_id, renamed, title = %title, "Title generated");
                }
                Ok(None) => {
                    tracing::warn!(%conversation_id, "Title generation returned nothing usable");
                }
                Err(e) => {
                    tracing::warn!(%conversation_id, error = %e, "Title generation failed");
                }
            }
        })
    }
}
