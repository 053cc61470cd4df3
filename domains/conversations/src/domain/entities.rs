//! Domain entities for the Conversations domain
//!
//! Serialized field names follow the client-local storage format
//! (camelCase, premium expiry as unix milliseconds).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aidline_llm::GroundingSource;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Model => write!(f, "model"),
        }
    }
}

/// Identity granted at login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable subject id; keys the user's persisted conversations
    pub sub: String,
    pub name: String,
    pub email: String,
    pub picture: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    pub profile: UserProfile,
    pub country: String,
    /// Language code, e.g. `fr`
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_name: Option<String>,
    /// Absent when premium was never purchased
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub premium_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_symbol: Option<String>,
}

impl AppUser {
    /// Simulated identity grant: there is no real authentication.
    pub fn simulated(
        country: impl Into<String>,
        language: impl Into<String>,
        language_name: Option<String>,
        currency_symbol: Option<String>,
    ) -> Self {
        Self {
            profile: UserProfile {
                sub: format!("mock-sub-{}", Utc::now().timestamp_millis()),
                name: "Utilisateur".to_string(),
                email: "user@example.com".to_string(),
                picture: String::new(),
            },
            country: country.into(),
            language: language.into(),
            language_name,
            premium_expires_at: None,
            currency_symbol,
        }
    }

    /// Storage key of this user's conversation list
    pub fn conversations_key(&self) -> String {
        format!("conversations_{}", self.profile.sub)
    }
}

/// Image attached to a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique within one message; used as the removal key while staging
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Self-describing `data:` URL
    pub data: String,
}

/// Citation attached to a model reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

impl From<GroundingSource> for Source {
    fn from(source: GroundingSource) -> Self {
        Self {
            uri: source.uri,
            title: source.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

impl Message {
    /// Reserved id of the synthetic welcome message, never replayed to the model
    pub const WELCOME_ID: Uuid = Uuid::nil();

    pub fn welcome(content: String) -> Self {
        Self {
            id: Self::WELCOME_ID,
            role: MessageRole::Model,
            content,
            attachments: None,
            sources: None,
        }
    }

    pub fn user(content: String, attachments: Vec<Attachment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            content,
            attachments: (!attachments.is_empty()).then_some(attachments),
            sources: None,
        }
    }

    pub fn model(content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Model,
            content,
            attachments: None,
            sources: None,
        }
    }

    /// Reply-pending placeholder
    pub fn placeholder() -> Self {
        Self::model(String::new())
    }

    pub fn is_welcome(&self) -> bool {
        self.id == Self::WELCOME_ID
    }

    pub fn is_pending(&self) -> bool {
        self.role == MessageRole::Model && self.content.is_empty()
    }

    pub fn apply(&mut self, patch: MessagePatch) {
        self.content = patch.content;
        self.sources = patch.sources;
    }
}

/// In-place replacement of a placeholder's content and sources
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePatch {
    pub content: String,
    pub sources: Option<Vec<Source>>,
}

impl MessagePatch {
    /// An empty source list becomes `None`, never `Some(vec![])`.
    pub fn reply(content: String, sources: Vec<Source>) -> Self {
        Self {
            content,
            sources: (!sources.is_empty()).then_some(sources),
        }
    }

    pub fn error(content: String) -> Self {
        Self {
            content,
            sources: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Time-ordered (UUIDv7), so ids sort in creation order
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(title: String, welcome: Message) -> Self {
        Self {
            id: Uuid::now_v7(),
            title,
            messages: vec![welcome],
        }
    }

    /// The pending placeholder, if a reply is awaited
    pub fn pending_reply(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.is_pending())
    }
}
