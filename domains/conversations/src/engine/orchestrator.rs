//! Orchestrator: the send-message protocol and session lifecycle
//!
//! One send runs Idle → Composing → AwaitingReply → {Settled | Failed}. The
//! user turn and its placeholder are appended together, the gateway call is
//! the only suspension point, and the placeholder is patched in place with
//! either the reply or a localized error message.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aidline_common::i18n::{ERROR_MESSAGE, PREMIUM_ACTIVATED, PREMIUM_RENEWED};
use aidline_common::{Error, Result, Translator};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use super::gateway::AiGateway;
use super::store::{ConversationStore, SharedStore, StoreSnapshot};
use super::titles::TitleGenerator;
use crate::domain::attachments::AttachmentStaging;
use crate::domain::entities::{AppUser, Attachment, Conversation, Message, MessagePatch};
use crate::domain::instructions::{system_instruction, InstructionContext};
use crate::domain::premium::{self, ActivationKind};
use crate::domain::state::{SendEvent, SendState, SendStateMachine};
use crate::repository::{ConversationsRepositories, SessionRepository};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why a send was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotSignedIn,
    NoActiveConversation,
    EmptyMessage,
    /// A send on this conversation has not settled yet
    Busy,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSignedIn => write!(f, "not signed in"),
            Self::NoActiveConversation => write!(f, "no active conversation"),
            Self::EmptyMessage => write!(f, "empty message"),
            Self::Busy => write!(f, "conversation busy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Rejected(RejectReason),
    PremiumActivated {
        renewed: bool,
        expires_at: DateTime<Utc>,
    },
    Settled {
        conversation_id: Uuid,
        message_id: Uuid,
    },
    Failed {
        conversation_id: Uuid,
        message_id: Uuid,
        /// Localized notice, also kept as the conversation's transient error
        error: String,
    },
}

/// Removes the conversation from the busy set when the send ends, even if
/// the send future is dropped mid-flight.
struct BusyGuard {
    busy: Arc<Mutex<HashSet<Uuid>>>,
    conversation_id: Uuid,
}

impl BusyGuard {
    fn acquire(busy: &Arc<Mutex<HashSet<Uuid>>>, conversation_id: Uuid) -> Option<Self> {
        if !lock(busy).insert(conversation_id) {
            return None;
        }
        Some(Self {
            busy: busy.clone(),
            conversation_id,
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        lock(&self.busy).remove(&self.conversation_id);
    }
}

/// Closes the placeholder with the error notice if the send is dropped
/// before the reply or failure was written.
struct PendingPlaceholder {
    store: SharedStore,
    conversation_id: Uuid,
    message_id: Uuid,
    notice: String,
    armed: bool,
}

impl PendingPlaceholder {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingPlaceholder {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let conversation_id = self.conversation_id;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%conversation_id, "Send abandoned outside a runtime, placeholder left pending");
            return;
        };

        let store = self.store.clone();
        let message_id = self.message_id;
        let notice = std::mem::take(&mut self.notice);
        runtime.spawn(async move {
            let mut store = store.lock().await;
            let still_pending = store
                .conversation(conversation_id)
                .and_then(Conversation::pending_reply)
                .is_some_and(|m| m.id == message_id);
            if !still_pending {
                return;
            }

            tracing::warn!(%conversation_id, "Send abandoned, closing its placeholder");
            if let Err(e) = store
                .replace_message(conversation_id, message_id, MessagePatch::error(notice))
                .await
            {
                tracing::warn!(%conversation_id, error = %e, "Could not close abandoned placeholder");
            }
        });
    }
}

pub struct Orchestrator {
    store: SharedStore,
    sessions: SessionRepository,
    gateway: AiGateway,
    titles: TitleGenerator,
    translator: Arc<dyn Translator>,
    user: Mutex<Option<AppUser>>,
    busy: Arc<Mutex<HashSet<Uuid>>>,
    errors: Mutex<HashMap<Uuid, String>>,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        repositories: ConversationsRepositories,
        gateway: AiGateway,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let store =
            ConversationStore::new(repositories.conversations.clone(), translator.clone()).shared();
        Self {
            store,
            sessions: repositories.sessions.clone(),
            titles: TitleGenerator::new(gateway.clone(), translator.clone()),
            gateway,
            translator,
            user: Mutex::new(None),
            busy: Arc::new(Mutex::new(HashSet::new())),
            errors: Mutex::new(HashMap::new()),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the time source used for premium decisions
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn current_user(&self) -> Option<AppUser> {
        lock(&self.user).clone()
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub async fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.store.lock().await.subscribe()
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.store.lock().await.snapshot()
    }

    pub fn is_busy(&self, conversation_id: Uuid) -> bool {
        lock(&self.busy).contains(&conversation_id)
    }

    pub fn error_for(&self, conversation_id: Uuid) -> Option<String> {
        lock(&self.errors).get(&conversation_id).cloned()
    }

    pub fn clear_error(&self, conversation_id: Uuid) {
        lock(&self.errors).remove(&conversation_id);
    }

    pub fn is_premium(&self) -> bool {
        self.current_user()
            .is_some_and(|u| premium::is_premium(&u, self.now()))
    }

    // --- session lifecycle ---

    /// Resume the stored session, if any
    pub async fn restore_session(&self) -> Result<Option<AppUser>> {
        let Some(user) = self.sessions.load().await? else {
            return Ok(None);
        };

        tracing::info!(user_sub = %user.profile.sub, "Restoring session");
        *lock(&self.user) = Some(user.clone());
        self.store.lock().await.open_session(&user).await;
        Ok(Some(user))
    }

    pub async fn login(&self, user: AppUser) -> Result<()> {
        self.sessions.save(&user).await?;
        tracing::info!(user_sub = %user.profile.sub, country = %user.country, "Signed in");

        *lock(&self.user) = Some(user.clone());
        lock(&self.errors).clear();
        self.store.lock().await.open_session(&user).await;
        Ok(())
    }

    /// Sign out and purge the user's stored conversations and session record
    pub async fn logout(&self) -> Result<()> {
        let previous = lock(&self.user).take();
        self.store.lock().await.close_session(true).await;
        lock(&self.errors).clear();
        self.sessions.clear().await?;

        if let Some(user) = previous {
            tracing::info!(user_sub = %user.profile.sub, "Signed out");
        }
        Ok(())
    }

    // --- conversation management ---

    fn require_user(&self) -> Result<AppUser> {
        self.current_user()
            .ok_or_else(|| Error::Validation("No signed-in user".to_string()))
    }

    pub async fn create_conversation(&self) -> Result<Conversation> {
        let user = self.require_user()?;
        Ok(self.store.lock().await.create_conversation(&user).await)
    }

    pub async fn select_conversation(&self, id: Uuid) -> bool {
        self.store.lock().await.select_conversation(id)
    }

    pub async fn rename_conversation(&self, id: Uuid, title: &str) -> bool {
        self.store.lock().await.rename_conversation(id, title).await
    }

    pub async fn delete_conversation(&self, id: Uuid) -> bool {
        let deleted = self.store.lock().await.delete_conversation(id).await;
        if deleted {
            self.clear_error(id);
        }
        deleted
    }

    // --- send protocol ---

    pub async fn send_message(
        &self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SendOutcome> {
        let Some(user) = self.current_user() else {
            return Ok(SendOutcome::Rejected(RejectReason::NotSignedIn));
        };
        let Some(conversation_id) = self.store.lock().await.active_id() else {
            return Ok(SendOutcome::Rejected(RejectReason::NoActiveConversation));
        };

        if premium::is_activation_command(text) {
            let Some(_busy) = BusyGuard::acquire(&self.busy, conversation_id) else {
                return Ok(SendOutcome::Rejected(RejectReason::Busy));
            };
            return self.activate_premium(user, conversation_id).await;
        }

        let attachments = AttachmentStaging::from_attachments(attachments).take();
        let text = text.trim();
        if text.is_empty() && attachments.is_empty() {
            return Ok(SendOutcome::Rejected(RejectReason::EmptyMessage));
        }

        let Some(_busy) = BusyGuard::acquire(&self.busy, conversation_id) else {
            return Ok(SendOutcome::Rejected(RejectReason::Busy));
        };

        let mut state = SendStateMachine::transition(SendState::Idle, SendEvent::Compose)?;
        self.clear_error(conversation_id);

        let user_message = Message::user(text.to_string(), attachments);
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id;

        let (history, wants_title) = {
            let mut store = self.store.lock().await;
            let Some(conversation) = store.conversation(conversation_id) else {
                return Ok(SendOutcome::Rejected(RejectReason::NoActiveConversation));
            };
            let wants_title = conversation.title == store.default_title(&user);

            let mut history = conversation.messages.clone();
            history.push(user_message.clone());

            match store
                .append_messages(conversation_id, vec![user_message, placeholder])
                .await
            {
                Ok(()) => {}
                Err(Error::Validation(_)) => {
                    return Ok(SendOutcome::Rejected(RejectReason::Busy));
                }
                Err(e) => return Err(e),
            }
            (history, wants_title)
        };

        let notice = self.translator.translate(&user.language, ERROR_MESSAGE, &[]);
        let mut pending = PendingPlaceholder {
            store: self.store.clone(),
            conversation_id,
            message_id: placeholder_id,
            notice: notice.clone(),
            armed: true,
        };

        state = SendStateMachine::transition(state, SendEvent::Dispatch)?;

        let now = self.now();
        let instruction = system_instruction(&InstructionContext {
            country: &user.country,
            language_name: user.language_name.as_deref(),
            is_premium: premium::is_premium(&user, now),
            premium_just_expired: premium::had_just_expired(&user, now),
        });

        let result = self.gateway.send(&history, instruction, true).await;

        match result {
            Ok(reply) => {
                state = SendStateMachine::transition(state, SendEvent::ReplyReceived)?;
                let reply_text = reply.text.clone();
                self.patch_placeholder(
                    conversation_id,
                    placeholder_id,
                    MessagePatch::reply(reply.text, reply.sources),
                )
                .await;
                pending.disarm();

                if wants_title {
                    self.titles.spawn(
                        self.store.clone(),
                        conversation_id,
                        user.language.clone(),
                        text.to_string(),
                        reply_text,
                    );
                }

                tracing::debug!(%conversation_id, %state, "Send finished");
                Ok(SendOutcome::Settled {
                    conversation_id,
                    message_id: placeholder_id,
                })
            }
            Err(e) => {
                state = SendStateMachine::transition(state, SendEvent::ReplyFailed)?;
                tracing::error!(%conversation_id, error = %e, "Gateway call failed");

                self.patch_placeholder(
                    conversation_id,
                    placeholder_id,
                    MessagePatch::error(notice.clone()),
                )
                .await;
                pending.disarm();
                lock(&self.errors).insert(conversation_id, notice.clone());

                tracing::debug!(%conversation_id, %state, "Send finished");
                Ok(SendOutcome::Failed {
                    conversation_id,
                    message_id: placeholder_id,
                    error: notice,
                })
            }
        }
    }

    /// The conversation may have been deleted while the reply was awaited
    async fn patch_placeholder(&self, conversation_id: Uuid, message_id: Uuid, patch: MessagePatch) {
        let result = self
            .store
            .lock()
            .await
            .replace_message(conversation_id, message_id, patch)
            .await;
        if let Err(e) = result {
            tracing::warn!(%conversation_id, error = %e, "Reply arrived for a missing placeholder");
        }
    }

    /// Grant premium and confirm it in the conversation. Nothing is granted
    /// unless the confirmation can be appended.
    async fn activate_premium(&self, mut user: AppUser, conversation_id: Uuid) -> Result<SendOutcome> {
        let mut store = self.store.lock().await;
        match store.conversation(conversation_id) {
            None => return Ok(SendOutcome::Rejected(RejectReason::NoActiveConversation)),
            Some(c) if c.pending_reply().is_some() => {
                return Ok(SendOutcome::Rejected(RejectReason::Busy));
            }
            Some(_) => {}
        }

        let grant = premium::grant(&user, self.now());
        user.premium_expires_at = Some(grant.expires_at);

        if let Err(e) = self.sessions.save(&user).await {
            tracing::error!(error = %e, "Failed to persist premium activation");
        }
        *lock(&self.user) = Some(user.clone());

        let renewed = grant.kind == ActivationKind::Renewed;
        let key = if renewed { PREMIUM_RENEWED } else { PREMIUM_ACTIVATED };
        let confirmation = Message::model(self.translator.translate(&user.language, key, &[]));
        store.append_messages(conversation_id, vec![confirmation]).await?;
        drop(store);

        tracing::info!(
            user_sub = %user.profile.sub,
            renewed,
            expires_at = %grant.expires_at,
            "Premium activated"
        );
        Ok(SendOutcome::PremiumActivated {
            renewed,
            expires_at: grant.expires_at,
        })
    }
}
