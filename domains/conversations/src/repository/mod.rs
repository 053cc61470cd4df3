//! Repository implementations for the Conversations domain

pub mod conversations;
pub mod session;
pub mod storage;

use std::sync::Arc;

pub use conversations::ConversationRepository;
pub use session::{SessionRepository, SESSION_KEY};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

/// Combined repository access for the Conversations domain
#[derive(Clone)]
pub struct ConversationsRepositories {
    store: Arc<dyn KeyValueStore>,
    pub conversations: ConversationRepository,
    pub sessions: SessionRepository,
}

impl ConversationsRepositories {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            conversations: ConversationRepository::new(store.clone()),
            sessions: SessionRepository::new(store.clone()),
            store,
        }
    }

    /// The underlying key/value store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }
}
