//! Conversations domain: chat threads, premium gate, persistence, orchestration

pub mod domain;
pub mod engine;
pub mod repository;

// Re-export domain types at the crate root for convenience
pub use domain::attachments::{AttachmentError, AttachmentStaging};
pub use domain::entities::{
    AppUser, Attachment, Conversation, Message, MessagePatch, MessageRole, Source, UserProfile,
};
pub use domain::state::{SendEvent, SendState, SendStateMachine, StateError};

// Re-export engine types
pub use engine::gateway::{AiGateway, GatewayReply};
pub use engine::orchestrator::{Orchestrator, RejectReason, SendOutcome};
pub use engine::store::{ConversationStore, SharedStore, StoreSnapshot};
pub use engine::titles::TitleGenerator;

// Re-export repository types
pub use repository::{
    ConversationRepository, ConversationsRepositories, FileStore, KeyValueStore, MemoryStore,
    SessionRepository, StorageError, SESSION_KEY,
};
