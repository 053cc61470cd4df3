//! Conversation management and persistence scenarios

use aidline_common::i18n::NEW_CONVERSATION;
use aidline_conversations::{KeyValueStore, SendOutcome, SESSION_KEY};
use uuid::Uuid;

use crate::common::{french_user, images, t, TestApp};

#[tokio::test]
async fn test_login_without_data_creates_welcome_conversation() {
    let app = TestApp::signed_in().await;
    let snapshot = app.orchestrator.snapshot().await;

    assert_eq!(snapshot.conversations.len(), 1);
    let conv = &snapshot.conversations[0];
    assert_eq!(Some(conv.id), snapshot.active_id);
    assert_eq!(conv.title, t(NEW_CONVERSATION));
    assert!(conv.messages[0].content.contains("France"));
    assert!(app.store.contains("conversations_tester"));
    assert!(app.store.contains(SESSION_KEY));
}

#[tokio::test]
async fn test_persistence_round_trip_across_restart() {
    let app = TestApp::signed_in().await;
    let id = app.active().await.id;
    app.orchestrator.rename_conversation(id, "Carte mobilité").await;
    app.reply("Voici", &[("https://www.service-public.fr", "Service Public")]);
    app.orchestrator
        .send_message("Comment l'obtenir ?", images(&[("carte.png", b"img")]))
        .await
        .unwrap();
    app.orchestrator.create_conversation().await.unwrap();
    let before = app.orchestrator.snapshot().await;

    let restarted = TestApp::reopen(&app.store);
    let user = restarted.orchestrator.restore_session().await.unwrap().unwrap();
    assert_eq!(user.profile.sub, "tester");

    let after = restarted.orchestrator.snapshot().await;
    assert_eq!(after.conversations, before.conversations);
    assert_eq!(after.active_id, Some(before.conversations[0].id));
}

#[tokio::test]
async fn test_corrupted_storage_degrades_to_fresh_conversation() {
    let app = TestApp::new();
    app.store.set("conversations_tester", "[{\"id\": 42").unwrap();

    app.orchestrator.login(french_user("tester")).await.unwrap();
    let snapshot = app.orchestrator.snapshot().await;
    assert_eq!(snapshot.conversations.len(), 1);
    assert!(snapshot.conversations[0].messages[0].is_welcome());

    // The fresh list replaced the unreadable value
    let stored = app.stored("conversations_tester").unwrap();
    assert_eq!(stored.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_corrupted_session_record_means_signed_out() {
    let app = TestApp::new();
    app.store.set(SESSION_KEY, "{oops").unwrap();

    assert!(app.orchestrator.restore_session().await.unwrap().is_none());
    assert!(!app.store.contains(SESSION_KEY));
    let outcome = app.orchestrator.send_message("Hello", Vec::new()).await.unwrap();
    assert!(matches!(outcome, SendOutcome::Rejected(_)));
}

#[tokio::test]
async fn test_delete_active_repairs_pointer() {
    let app = TestApp::signed_in().await;
    let first = app.active().await.id;
    let second = app.orchestrator.create_conversation().await.unwrap().id;
    let third = app.orchestrator.create_conversation().await.unwrap().id;

    assert!(app.orchestrator.delete_conversation(third).await);
    assert_eq!(app.orchestrator.snapshot().await.active_id, Some(second));

    assert!(app.orchestrator.select_conversation(first).await);
    assert!(app.orchestrator.delete_conversation(first).await);
    assert_eq!(app.orchestrator.snapshot().await.active_id, Some(second));

    assert!(app.orchestrator.delete_conversation(second).await);
    let snapshot = app.orchestrator.snapshot().await;
    assert!(snapshot.active_id.is_none());
    assert!(!app.store.contains("conversations_tester"));
}

#[tokio::test]
async fn test_unknown_ids_are_ignored() {
    let app = TestApp::signed_in().await;
    let before = app.orchestrator.snapshot().await;

    assert!(!app.orchestrator.select_conversation(Uuid::new_v4()).await);
    assert!(!app.orchestrator.rename_conversation(Uuid::new_v4(), "x").await);
    assert!(!app.orchestrator.delete_conversation(Uuid::new_v4()).await);
    assert_eq!(app.orchestrator.snapshot().await, before);
}

#[tokio::test]
async fn test_blank_rename_ignored() {
    let app = TestApp::signed_in().await;
    let id = app.active().await.id;

    assert!(!app.orchestrator.rename_conversation(id, " \t ").await);
    assert_eq!(app.active().await.title, t(NEW_CONVERSATION));
}

#[tokio::test]
async fn test_logout_purges_user_data() {
    let app = TestApp::signed_in().await;
    app.orchestrator.send_message("Hello", Vec::new()).await.unwrap();

    app.orchestrator.logout().await.unwrap();
    assert!(app.store.keys().is_empty());
    assert!(app.orchestrator.current_user().is_none());
    assert!(app.orchestrator.snapshot().await.conversations.is_empty());

    // Signing in again starts over
    app.orchestrator.login(french_user("tester")).await.unwrap();
    assert_eq!(app.active().await.messages.len(), 1);
}

#[tokio::test]
async fn test_users_do_not_share_conversations() {
    let app = TestApp::signed_in().await;
    let id = app.active().await.id;
    app.orchestrator.rename_conversation(id, "Privé").await;

    app.orchestrator.login(french_user("someone-else")).await.unwrap();
    let snapshot = app.orchestrator.snapshot().await;
    assert_eq!(snapshot.conversations.len(), 1);
    assert_ne!(snapshot.conversations[0].id, id);
    assert!(app.store.contains("conversations_tester"));
    assert!(app.store.contains("conversations_someone-else"));
}
