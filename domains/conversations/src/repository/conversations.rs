//! Conversation list repository
//!
//! The whole list of one user is stored as a single JSON array under
//! `conversations_{sub}`.

use std::sync::Arc;

use aidline_common::Result;

use super::storage::{run_blocking, KeyValueStore};
use crate::domain::entities::Conversation;

#[derive(Clone)]
pub struct ConversationRepository {
    store: Arc<dyn KeyValueStore>,
}

impl ConversationRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the stored list. `Ok(None)` when nothing is stored; a value that
    /// does not parse is an error for the caller to recover from.
    pub async fn load(&self, key: &str) -> Result<Option<Vec<Conversation>>> {
        let key = key.to_string();
        let Some(raw) = run_blocking(&self.store, move |s| s.get(&key)).await? else {
            return Ok(None);
        };

        let conversations: Vec<Conversation> = serde_json::from_str(&raw)?;
        Ok(Some(conversations))
    }

    /// Persist the full list; an empty list removes the key
    pub async fn save(&self, key: &str, conversations: &[Conversation]) -> Result<()> {
        let key = key.to_string();
        if conversations.is_empty() {
            return run_blocking(&self.store, move |s| s.remove(&key)).await;
        }

        let json = serde_json::to_string(conversations)?;
        run_blocking(&self.store, move |s| s.set(&key, &json)).await
    }

    pub async fn purge(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        run_blocking(&self.store, move |s| s.remove(&key)).await
    }
}
