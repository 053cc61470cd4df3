//! Conversation store
//!
//! Owns the ordered conversation list and the active pointer of the signed-in
//! user. Every structural change builds a new list and commits it as a whole:
//! the active pointer is repaired, the list is persisted (best effort) and
//! subscribers are notified with a fresh snapshot.

use std::sync::Arc;

use aidline_common::i18n::{ERROR_MESSAGE, INITIAL_BOT_MESSAGE, NEW_CONVERSATION};
use aidline_common::{Error, Result, Translator};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::domain::entities::{AppUser, Conversation, Message, MessagePatch};
use crate::repository::ConversationRepository;

/// Handle shared between the orchestrator and detached title tasks
pub type SharedStore = Arc<Mutex<ConversationStore>>;

/// What subscribers observe after each change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub conversations: Vec<Conversation>,
    pub active_id: Option<Uuid>,
}

impl StoreSnapshot {
    pub fn conversation(&self, id: Uuid) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }
}

/// Turn placeholders left pending by an interrupted send into `notice`.
/// Returns how many were closed.
fn close_abandoned_replies(conversations: &mut [Conversation], notice: &str) -> usize {
    let mut closed = 0;
    for conversation in conversations.iter_mut() {
        if let Some(last) = conversation.messages.last_mut().filter(|m| m.is_pending()) {
            last.apply(MessagePatch::error(notice.to_string()));
            closed += 1;
        }
    }
    closed
}

/// Localized default title for a user's new conversations
pub fn default_title(translator: &dyn Translator, user: &AppUser) -> String {
    translator.translate(&user.language, NEW_CONVERSATION, &[])
}

pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active_id: Option<Uuid>,
    /// Storage key of the open session, `None` when signed out
    storage_key: Option<String>,
    repository: ConversationRepository,
    translator: Arc<dyn Translator>,
    notifier: watch::Sender<StoreSnapshot>,
}

impl ConversationStore {
    pub fn new(repository: ConversationRepository, translator: Arc<dyn Translator>) -> Self {
        let (notifier, _) = watch::channel(StoreSnapshot::default());
        Self {
            conversations: Vec::new(),
            active_id: None,
            storage_key: None,
            repository,
            translator,
            notifier,
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.notifier.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            conversations: self.conversations.clone(),
            active_id: self.active_id,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: Uuid) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.active_id
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.and_then(|id| self.conversation(id))
    }

    pub fn default_title(&self, user: &AppUser) -> String {
        default_title(self.translator.as_ref(), user)
    }

    /// Load the user's stored list, falling back to one fresh conversation
    /// when nothing usable is stored.
    pub async fn open_session(&mut self, user: &AppUser) {
        let key = user.conversations_key();
        self.storage_key = Some(key.clone());
        self.conversations.clear();
        self.active_id = None;

        match self.repository.load(&key).await {
            Ok(Some(mut conversations)) if !conversations.is_empty() => {
                tracing::info!(
                    user_sub = %user.profile.sub,
                    count = conversations.len(),
                    "Restored conversations"
                );
                self.active_id = conversations.first().map(|c| c.id);

                let notice = self.translator.translate(&user.language, ERROR_MESSAGE, &[]);
                let closed = close_abandoned_replies(&mut conversations, &notice);
                if closed > 0 {
                    tracing::warn!(
                        user_sub = %user.profile.sub,
                        closed,
                        "Closed replies left pending by an interrupted session"
                    );
                    self.commit(conversations).await;
                } else {
                    self.conversations = conversations;
                    self.notify();
                }
            }
            Ok(_) => {
                tracing::debug!(user_sub = %user.profile.sub, "No stored conversations");
                self.create_conversation(user).await;
            }
            Err(e) => {
                tracing::warn!(
                    user_sub = %user.profile.sub,
                    error = %e,
                    "Stored conversations unreadable, starting fresh"
                );
                self.create_conversation(user).await;
            }
        }
    }

    /// Forget in-memory state; with `purge` the stored list is removed too
    pub async fn close_session(&mut self, purge: bool) {
        if let (true, Some(key)) = (purge, self.storage_key.as_deref()) {
            if let Err(e) = self.repository.purge(key).await {
                tracing::error!(error = %e, "Failed to purge stored conversations");
            }
        }

        self.storage_key = None;
        self.conversations.clear();
        self.active_id = None;
        self.notify();
    }

    /// Prepend a conversation seeded with the localized welcome message and
    /// make it active.
    pub async fn create_conversation(&mut self, user: &AppUser) -> Conversation {
        let welcome = self.translator.translate(
            &user.language,
            INITIAL_BOT_MESSAGE,
            &[("country", user.country.as_str())],
        );
        let conversation = Conversation::new(self.default_title(user), Message::welcome(welcome));

        let mut next = Vec::with_capacity(self.conversations.len() + 1);
        next.push(conversation.clone());
        next.extend(self.conversations.iter().cloned());

        self.active_id = Some(conversation.id);
        self.commit(next).await;

        tracing::debug!(conversation_id = %conversation.id, "Created conversation");
        conversation
    }

    /// No-op when the id is unknown
    pub fn select_conversation(&mut self, id: Uuid) -> bool {
        if self.conversation(id).is_none() {
            return false;
        }
        self.active_id = Some(id);
        self.notify();
        true
    }

    /// Ignored when the trimmed title is empty or the id is unknown
    pub async fn rename_conversation(&mut self, id: Uuid, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() || self.conversation(id).is_none() {
            return false;
        }

        let next = self
            .conversations
            .iter()
            .map(|c| {
                if c.id == id {
                    Conversation {
                        title: title.to_string(),
                        ..c.clone()
                    }
                } else {
                    c.clone()
                }
            })
            .collect();
        self.commit(next).await;
        true
    }

    pub async fn delete_conversation(&mut self, id: Uuid) -> bool {
        if self.conversation(id).is_none() {
            return false;
        }

        let next = self
            .conversations
            .iter()
            .filter(|c| c.id != id)
            .cloned()
            .collect();
        self.commit(next).await;

        tracing::debug!(conversation_id = %id, "Deleted conversation");
        true
    }

    /// Append messages in order. Refused while a reply is pending so the
    /// placeholder always stays last.
    pub async fn append_messages(&mut self, id: Uuid, messages: Vec<Message>) -> Result<()> {
        let conversation = self
            .conversation(id)
            .ok_or_else(|| Error::NotFound(format!("Conversation {}", id)))?;
        if conversation.pending_reply().is_some() {
            return Err(Error::Validation(format!(
                "Conversation {} is awaiting a reply",
                id
            )));
        }

        let next = self
            .conversations
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.id == id {
                    c.messages.extend(messages.iter().cloned());
                }
                c
            })
            .collect();
        self.commit(next).await;
        Ok(())
    }

    /// Patch one message in place, keeping its position and id
    pub async fn replace_message(
        &mut self,
        id: Uuid,
        message_id: Uuid,
        patch: MessagePatch,
    ) -> Result<()> {
        let conversation = self
            .conversation(id)
            .ok_or_else(|| Error::NotFound(format!("Conversation {}", id)))?;
        if !conversation.messages.iter().any(|m| m.id == message_id) {
            return Err(Error::NotFound(format!("Message {}", message_id)));
        }

        let next = self
            .conversations
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.id == id {
                    if let Some(m) = c.messages.iter_mut().find(|m| m.id == message_id) {
                        m.apply(patch.clone());
                    }
                }
                c
            })
            .collect();
        self.commit(next).await;
        Ok(())
    }

    async fn commit(&mut self, next: Vec<Conversation>) {
        self.conversations = next;

        let active_valid = self
            .active_id
            .is_some_and(|id| self.conversations.iter().any(|c| c.id == id));
        if !active_valid {
            self.active_id = self.conversations.first().map(|c| c.id);
        }

        if let Some(key) = self.storage_key.as_deref() {
            if let Err(e) = self.repository.save(key, &self.conversations).await {
                tracing::error!(error = %e, code = e.error_code(), "Failed to persist conversations");
            }
        }

        self.notify();
    }

    fn notify(&self) {
        self.notifier.send_replace(self.snapshot());
    }
}
