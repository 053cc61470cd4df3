//! Premium activation scenarios

use aidline_common::i18n::{PREMIUM_ACTIVATED, PREMIUM_RENEWED};
use aidline_conversations::{AppUser, MessageRole, SendOutcome, SESSION_KEY};
use chrono::{Duration, Utc};

use crate::common::{french_user, t, TestApp};

#[tokio::test]
async fn test_keyword_variants_activate() {
    for input in ["premium", " Premium ", "PREMIUM"] {
        let app = TestApp::signed_in().await;
        let outcome = app.orchestrator.send_message(input, Vec::new()).await.unwrap();
        assert!(
            matches!(outcome, SendOutcome::PremiumActivated { renewed: false, .. }),
            "input {input:?}"
        );
        assert!(app.llm.chat_requests().is_empty());
    }
}

#[tokio::test]
async fn test_near_miss_is_a_normal_message() {
    let app = TestApp::signed_in().await;
    let outcome = app.orchestrator.send_message("premiums", Vec::new()).await.unwrap();
    assert!(matches!(outcome, SendOutcome::Settled { .. }));
    assert_eq!(app.llm.chat_requests().len(), 1);
    assert!(!app.orchestrator.is_premium());
}

#[tokio::test]
async fn test_first_activation_appends_confirmation_only() {
    let now = Utc::now();
    let app = TestApp::at(now);
    app.orchestrator.login(french_user("tester")).await.unwrap();

    let outcome = app.orchestrator.send_message("premium", Vec::new()).await.unwrap();
    assert_eq!(
        outcome,
        SendOutcome::PremiumActivated {
            renewed: false,
            expires_at: now + Duration::days(7)
        }
    );

    let conv = app.active().await;
    assert_eq!(conv.messages.len(), 2);
    assert_eq!(conv.messages[1].role, MessageRole::Model);
    assert_eq!(conv.messages[1].content, t(PREMIUM_ACTIVATED));
    assert!(conv.pending_reply().is_none());

    let stored: AppUser = serde_json::from_value(app.stored(SESSION_KEY).unwrap()).unwrap();
    assert_eq!(stored.premium_expires_at, Some(now + Duration::days(7)));
}

#[tokio::test]
async fn test_renewal_resets_to_seven_days_from_now() {
    let now = Utc::now();
    let app = TestApp::at(now);
    let mut user = french_user("tester");
    user.premium_expires_at = Some(now + Duration::days(5));
    app.orchestrator.login(user).await.unwrap();

    let outcome = app.orchestrator.send_message("Premium", Vec::new()).await.unwrap();
    assert_eq!(
        outcome,
        SendOutcome::PremiumActivated {
            renewed: true,
            expires_at: now + Duration::days(7)
        }
    );
    assert_eq!(app.active().await.messages[1].content, t(PREMIUM_RENEWED));
}

#[tokio::test]
async fn test_expired_user_gets_notice_then_premium_rules() {
    let now = Utc::now();
    let app = TestApp::at(now);
    let mut user = french_user("tester");
    user.premium_expires_at = Some(now - Duration::minutes(5));
    app.orchestrator.login(user).await.unwrap();

    app.orchestrator.send_message("Bonjour", Vec::new()).await.unwrap();
    let instruction = app.llm.chat_requests()[0].system_instruction.clone().unwrap();
    assert!(instruction.contains("PREMIUM EXPIRED NOTICE"));
    assert!(instruction.contains("Reply only in French"));

    let outcome = app.orchestrator.send_message("premium", Vec::new()).await.unwrap();
    assert!(matches!(outcome, SendOutcome::PremiumActivated { renewed: false, .. }));

    app.orchestrator.send_message("Traduisez ce document", Vec::new()).await.unwrap();
    let instruction = app.llm.chat_requests()[1].system_instruction.clone().unwrap();
    assert!(instruction.contains("PREMIUM USER MODE"));
    assert!(!instruction.contains("PREMIUM EXPIRED NOTICE"));
}

#[tokio::test]
async fn test_premium_survives_restart() {
    let app = TestApp::signed_in().await;
    app.orchestrator.send_message("premium", Vec::new()).await.unwrap();

    let restarted = TestApp::reopen(&app.store);
    restarted.orchestrator.restore_session().await.unwrap();
    assert!(restarted.orchestrator.is_premium());
}
