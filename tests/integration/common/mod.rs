//! Common test utilities and fixtures for integration tests
//!
//! - `TestApp`: an orchestrator wired to the mock provider and an in-memory store
//! - user and attachment fixtures
//! - snapshot waiting and invariant assertions

use std::sync::Arc;
use std::time::Duration;

use aidline_common::{Catalog, Translator};
use aidline_conversations::{
    AppUser, Attachment, AttachmentStaging, Conversation, KeyValueStore, MemoryStore, Orchestrator,
    StoreSnapshot,
};
use aidline_llm::mock::MockLlmService;
use aidline_llm::{ChatResponse, GroundingSource, LlmError};
use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Orchestrator with inspectable collaborators
#[allow(dead_code)]
pub struct TestApp {
    pub orchestrator: Arc<Orchestrator>,
    pub llm: MockLlmService,
    pub store: MemoryStore,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::build(MemoryStore::new(), None)
    }

    /// Freeze the orchestrator clock at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        Self::build(MemoryStore::new(), Some(now))
    }

    /// Fresh orchestrator over an existing store, as after a restart
    pub fn reopen(store: &MemoryStore) -> Self {
        Self::build(store.clone(), None)
    }

    fn build(store: MemoryStore, now: Option<DateTime<Utc>>) -> Self {
        let llm = MockLlmService::new();
        let mut orchestrator = aidline_app::compose(Arc::new(llm.clone()), Arc::new(store.clone()));
        if let Some(now) = now {
            orchestrator = orchestrator.with_clock(move || now);
        }
        Self {
            orchestrator: Arc::new(orchestrator),
            llm,
            store,
        }
    }

    pub async fn signed_in() -> Self {
        let app = Self::new();
        app.orchestrator
            .login(french_user("tester"))
            .await
            .expect("login");
        app
    }

    pub async fn active(&self) -> Conversation {
        let snapshot = self.orchestrator.snapshot().await;
        snapshot
            .active_id
            .and_then(|id| snapshot.conversation(id).cloned())
            .expect("active conversation")
    }

    pub fn reply(&self, text: &str, sources: &[(&str, &str)]) {
        self.llm.push_chat_reply(Ok(ChatResponse {
            text: text.to_string(),
            sources: sources
                .iter()
                .map(|(uri, title)| GroundingSource {
                    uri: uri.to_string(),
                    title: title.to_string(),
                })
                .collect(),
        }));
    }

    pub fn fail(&self, error: LlmError) {
        self.llm.push_chat_reply(Err(error));
    }

    pub fn stored(&self, key: &str) -> Option<serde_json::Value> {
        self.store
            .get(key)
            .expect("memory store read")
            .map(|raw| serde_json::from_str(&raw).expect("stored json"))
    }
}

#[allow(dead_code)]
pub fn french_user(sub: &str) -> AppUser {
    let mut user = AppUser::simulated("France", "fr", Some("French".to_string()), Some("€".to_string()));
    user.profile.sub = sub.to_string();
    user
}

#[allow(dead_code)]
pub fn t(key: &str) -> String {
    Catalog::new().translate("fr", key, &[])
}

/// Images staged through the same path the terminal uses
#[allow(dead_code)]
pub fn images(files: &[(&str, &[u8])]) -> Vec<Attachment> {
    let mut staging = AttachmentStaging::new();
    for (name, bytes) in files {
        staging
            .stage(Some(name), "image/png", bytes)
            .expect("stage image");
    }
    staging.take()
}

/// Wait until a snapshot satisfies `predicate`
#[allow(dead_code)]
pub async fn wait_for<F>(rx: &mut watch::Receiver<StoreSnapshot>, predicate: F) -> StoreSnapshot
where
    F: Fn(&StoreSnapshot) -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if predicate(&snapshot) {
                    return snapshot.clone();
                }
            }
            rx.changed().await.expect("store dropped");
        }
    })
    .await;
    waited.expect("timed out waiting for store snapshot")
}

/// At most one pending placeholder, and only in last position
#[allow(dead_code)]
pub fn assert_placeholder_invariant(conversation: &Conversation) {
    let pending: Vec<usize> = conversation
        .messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_pending())
        .map(|(i, _)| i)
        .collect();
    assert!(pending.len() <= 1, "multiple placeholders: {pending:?}");
    if let Some(i) = pending.first() {
        assert_eq!(*i, conversation.messages.len() - 1, "placeholder not last");
    }
}
