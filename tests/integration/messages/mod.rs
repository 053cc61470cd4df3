//! Send-message protocol scenarios

use std::time::Duration;

use aidline_common::i18n::{ERROR_MESSAGE, NEW_CONVERSATION};
use aidline_conversations::{MessageRole, RejectReason, SendOutcome};
use aidline_llm::{LlmError, LlmRole, Part};

use crate::common::{assert_placeholder_invariant, images, t, wait_for, TestApp};

#[tokio::test]
async fn test_hello_scenario_from_empty_storage() {
    let app = TestApp::signed_in().await;
    app.reply("Bonjour!", &[]);

    let conv = app.active().await;
    assert_eq!(conv.messages.len(), 1);
    assert!(conv.messages[0].is_welcome());

    let outcome = tokio_test::assert_ok!(app.orchestrator.send_message("Hello", Vec::new()).await);
    assert!(matches!(outcome, SendOutcome::Settled { .. }));

    let conv = app.active().await;
    assert_eq!(conv.messages.len(), 3);
    assert_eq!(conv.messages[1].role, MessageRole::User);
    assert_eq!(conv.messages[1].content, "Hello");
    assert_eq!(conv.messages[2].role, MessageRole::Model);
    assert_eq!(conv.messages[2].content, "Bonjour!");
    assert!(conv.messages[2].sources.is_none());
    assert_placeholder_invariant(&conv);

    // Stored form omits the sources field entirely
    let stored = app.stored("conversations_tester").unwrap();
    assert!(stored[0]["messages"][2].get("sources").is_none());
}

#[tokio::test]
async fn test_gateway_failure_scenario() {
    let app = TestApp::signed_in().await;
    app.fail(LlmError::Request("connection reset".to_string()));

    let outcome = app.orchestrator.send_message("Hello", Vec::new()).await.unwrap();
    let SendOutcome::Failed { conversation_id, error, message_id } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error, t(ERROR_MESSAGE));

    let conv = app.active().await;
    assert_eq!(conv.messages.len(), 3);
    assert_eq!(conv.messages[2].id, message_id);
    assert_eq!(conv.messages[2].content, t(ERROR_MESSAGE));
    assert_eq!(app.orchestrator.error_for(conversation_id), Some(t(ERROR_MESSAGE)));

    // Conversation stays usable
    app.reply("Tout va bien", &[]);
    let outcome = app.orchestrator.send_message("Encore ?", Vec::new()).await.unwrap();
    assert!(matches!(outcome, SendOutcome::Settled { .. }));
    assert_eq!(app.orchestrator.error_for(conversation_id), None);
    assert_eq!(app.active().await.messages.len(), 5);
}

#[tokio::test]
async fn test_history_replay_excludes_welcome() {
    let app = TestApp::signed_in().await;
    app.reply("Première réponse", &[]);
    app.orchestrator.send_message("Question 1", Vec::new()).await.unwrap();
    app.reply("Deuxième réponse", &[]);
    app.orchestrator.send_message("Question 2", Vec::new()).await.unwrap();

    let requests = app.llm.chat_requests();
    assert_eq!(requests.len(), 2);

    let second = &requests[1];
    assert_eq!(second.history.len(), 2);
    assert_eq!(second.history[0].role, LlmRole::User);
    assert_eq!(second.history[0].parts, vec![Part::Text("Question 1".to_string())]);
    assert_eq!(second.history[1].role, LlmRole::Model);
    assert_eq!(second.message, vec![Part::Text("Question 2".to_string())]);
}

#[tokio::test]
async fn test_duplicate_attachments_collapse_and_travel_inline() {
    let app = TestApp::signed_in().await;
    let staged = images(&[("scan.png", b"same-bytes"), ("copy.png", b"same-bytes")]);
    assert_eq!(staged.len(), 1);

    app.orchestrator
        .send_message("Que dit ce document ?", staged)
        .await
        .unwrap();

    let conv = app.active().await;
    let attachments = conv.messages[1].attachments.as_ref().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].name, "scan.png");

    let request = &app.llm.chat_requests()[0];
    assert_eq!(request.message.len(), 2);
    assert_eq!(request.message[0], Part::Text("Que dit ce document ?".to_string()));
    assert_eq!(
        request.message[1],
        Part::InlineData {
            mime_type: "image/png".to_string(),
            data: b"same-bytes".to_vec()
        }
    );
}

#[tokio::test]
async fn test_image_only_message_is_sent() {
    let app = TestApp::signed_in().await;
    let outcome = app
        .orchestrator
        .send_message("   ", images(&[("photo.png", b"\x89PNG")]))
        .await
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Settled { .. }));

    let request = &app.llm.chat_requests()[0];
    assert_eq!(request.message.len(), 1);
    assert!(matches!(request.message[0], Part::InlineData { .. }));
}

#[tokio::test]
async fn test_sources_deduplicated_by_uri() {
    let app = TestApp::signed_in().await;
    app.reply(
        "Voici les aides",
        &[
            ("https://www.service-public.fr/aah", "AAH"),
            ("https://www.mdph.fr", "MDPH"),
        ],
    );

    app.orchestrator.send_message("Aides ?", Vec::new()).await.unwrap();
    let conv = app.active().await;
    let sources = conv.messages[2].sources.as_ref().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].uri, "https://www.service-public.fr/aah");
}

#[tokio::test]
async fn test_title_generated_after_first_exchange() {
    let app = TestApp::signed_in().await;
    let mut rx = app.orchestrator.subscribe().await;
    app.reply("Bonjour!", &[]);
    app.llm.push_generate_reply(Ok("\"**Salutations**\"".to_string()));

    app.orchestrator.send_message("Hello", Vec::new()).await.unwrap();
    let id = app.active().await.id;

    let snapshot = wait_for(&mut rx, |s| {
        s.conversation(id).is_some_and(|c| c.title == "Salutations")
    })
    .await;
    assert_eq!(snapshot.conversation(id).unwrap().messages.len(), 3);

    let prompts = app.llm.generate_requests();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].prompt.contains("USER: \"Hello\""));
    assert!(prompts[0].prompt.contains("ASSISTANT: \"Bonjour!\""));
    assert_eq!(prompts[0].temperature, Some(0.3));

    // Title no longer the default: no second titling
    app.orchestrator.send_message("Merci", Vec::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(app.llm.generate_requests().len(), 1);
}

#[tokio::test]
async fn test_title_failure_is_invisible() {
    let app = TestApp::signed_in().await;
    app.llm.push_generate_reply(Err(LlmError::RateLimit));

    let outcome = app.orchestrator.send_message("Hello", Vec::new()).await.unwrap();
    assert!(matches!(outcome, SendOutcome::Settled { conversation_id, .. } if app.orchestrator.error_for(conversation_id).is_none()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(app.active().await.title, t(NEW_CONVERSATION));
}

#[tokio::test]
async fn test_second_send_rejected_while_awaiting_reply() {
    let app = TestApp::signed_in().await;
    let id = app.active().await.id;
    app.llm.set_delay_ms(150);

    let orchestrator = app.orchestrator.clone();
    let first = tokio::spawn(async move { orchestrator.send_message("Lent", Vec::new()).await });

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(app.orchestrator.is_busy(id));
    let pending = app.active().await;
    assert!(pending.pending_reply().is_some());
    assert_placeholder_invariant(&pending);

    let second = app.orchestrator.send_message("Rapide", Vec::new()).await.unwrap();
    assert_eq!(second, SendOutcome::Rejected(RejectReason::Busy));

    first.await.unwrap().unwrap();
    assert!(!app.orchestrator.is_busy(id));
    assert_eq!(app.active().await.messages.len(), 3);
}

#[tokio::test]
async fn test_other_conversation_usable_while_one_is_busy() {
    let app = TestApp::signed_in().await;
    let slow_id = app.active().await.id;
    app.llm.set_delay_ms(100);

    let orchestrator = app.orchestrator.clone();
    let slow = tokio::spawn(async move { orchestrator.send_message("Lent", Vec::new()).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let other = app.orchestrator.create_conversation().await.unwrap();
    let outcome = app.orchestrator.send_message("Ailleurs", Vec::new()).await.unwrap();
    assert!(matches!(outcome, SendOutcome::Settled { conversation_id, .. } if conversation_id == other.id));

    slow.await.unwrap().unwrap();
    let snapshot = app.orchestrator.snapshot().await;
    assert_eq!(snapshot.conversation(slow_id).unwrap().messages.len(), 3);
    assert_eq!(snapshot.conversation(other.id).unwrap().messages.len(), 3);
}

#[tokio::test]
async fn test_reply_for_deleted_conversation_is_dropped() {
    let app = TestApp::signed_in().await;
    let id = app.active().await.id;
    app.llm.set_delay_ms(100);

    let orchestrator = app.orchestrator.clone();
    let send = tokio::spawn(async move { orchestrator.send_message("Bonjour", Vec::new()).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(app.orchestrator.delete_conversation(id).await);
    let outcome = send.await.unwrap().unwrap();
    assert!(matches!(outcome, SendOutcome::Settled { .. }));

    let snapshot = app.orchestrator.snapshot().await;
    assert!(snapshot.conversation(id).is_none());
    assert!(snapshot.conversations.is_empty());
}
