//! Session lifecycle driven by identity events

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use airsense_lib::transport::mock::MockHttpClient;
use airsense_lib::{Identity, SessionState};

use crate::test_harness::{
    identity_for, wait_failed, wait_for_state, wait_signed_in, ScriptedPushToken,
    TestEnvironment, AUTH_URL, WAIT,
};

fn alice() -> Identity {
    identity_for("alice@example.com")
}

fn bob() -> Identity {
    identity_for("bob@example.com")
}

#[tokio::test]
async fn test_new_registration_publishes_refreshed_session() {
    let env = TestEnvironment::new(201);
    env.client.start().await;

    env.provider.switch_to(alice()).await;
    let state = wait_signed_in(env.store(), &alice().id).await;

    let session = state.session().cloned().unwrap();
    assert_eq!(session.token, "fresh-token-2");
    assert_eq!(session.identity_id, alice().id);
    assert_eq!(
        env.provider.token_calls(),
        vec![(alice().id, false), (alice().id, true)]
    );

    // The registration is authorized with the identity token, not a session
    let requests = env.http.get_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, AUTH_URL);
    assert_eq!(requests[0].header("authorization"), Some("Bearer id-token-1"));
    assert_eq!(requests[0].body.as_deref(), Some(r#"{"pushToken":"push-1"}"#));
}

#[tokio::test]
async fn test_existing_registration_uses_identity_token() {
    let env = TestEnvironment::new(200);
    env.client.start().await;

    env.provider.switch_to(alice()).await;
    let state = wait_signed_in(env.store(), &alice().id).await;

    let session = state.session().cloned().unwrap();
    assert_eq!(session.token, "id-token-1");
    assert_eq!(env.store().current_session(), Some(session));
    assert_eq!(env.provider.forced_refreshes(), 0);
    assert_eq!(env.auth_requests(), 1);
}

#[tokio::test]
async fn test_error_status_fails_exchange() {
    let env = TestEnvironment::new(500);
    env.client.start().await;

    env.provider.switch_to(alice()).await;
    let state = wait_failed(env.store()).await;

    assert!(state.session().is_none());
    assert!(env.store().current_session().is_none());
    assert_eq!(env.provider.forced_refreshes(), 0);
}

#[tokio::test]
async fn test_start_applies_current_identity() {
    let env = TestEnvironment::new(201);
    env.provider.switch_to(alice()).await;

    env.client.start().await;
    wait_signed_in(env.store(), &alice().id).await;
    assert_eq!(env.auth_requests(), 1);
}

#[tokio::test]
async fn test_start_twice_keeps_one_subscription() {
    let env = TestEnvironment::new(201);
    env.client.start().await;
    env.client.start().await;
    assert!(env.client.sessions().is_started().await);

    env.provider.switch_to(alice()).await;
    wait_signed_in(env.store(), &alice().id).await;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(env.auth_requests(), 1);
}

#[tokio::test]
async fn test_repeated_event_does_not_reregister() {
    let env = TestEnvironment::new(201);
    env.client.start().await;

    env.provider.switch_to(alice()).await;
    wait_signed_in(env.store(), &alice().id).await;

    env.provider.announce(alice()).await;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(env.auth_requests(), 1);
    assert!(env.store().state().is_settled_for(&alice().id));
}

#[tokio::test]
async fn test_identity_switch_exchanges_again() {
    let env = TestEnvironment::new(201);
    env.client.start().await;

    env.provider.switch_to(alice()).await;
    let first = wait_signed_in(env.store(), &alice().id).await;

    env.provider.switch_to(bob()).await;
    let second = wait_signed_in(env.store(), &bob().id).await;

    assert_eq!(env.auth_requests(), 2);
    assert_ne!(first.session().unwrap().token, second.session().unwrap().token);
    assert_eq!(second.session().unwrap().identity_id, bob().id);
}

#[tokio::test]
async fn test_previous_session_served_while_exchanging() {
    let env = TestEnvironment::new(201);
    env.client.start().await;

    env.provider.switch_to(alice()).await;
    let signed_in = wait_signed_in(env.store(), &alice().id).await;
    let previous = signed_in.session().cloned().unwrap();

    let gate = env.provider.hold_tokens();
    env.provider.switch_to(bob()).await;
    wait_for_state(env.store(), SessionState::is_exchanging).await;
    assert_eq!(env.store().current_session(), Some(previous));

    gate.add_permits(2);
    wait_signed_in(env.store(), &bob().id).await;
}

#[tokio::test]
async fn test_sign_out_during_exchange_discards_result() {
    let env = TestEnvironment::new(201);
    env.client.start().await;
    let gate = env.provider.hold_tokens();

    env.provider.switch_to(alice()).await;
    wait_for_state(env.store(), SessionState::is_exchanging).await;
    timeout(WAIT, async {
        while env.provider.token_calls().is_empty() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    env.client.auth().sign_out().await.unwrap();
    // Absence is immediate, no round trip gates it
    assert_eq!(env.store().state(), SessionState::SignedOut);
    assert!(env.store().current_session().is_none());

    gate.add_permits(10);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(env.store().state(), SessionState::SignedOut);
    assert_eq!(env.auth_requests(), 0);
}

#[tokio::test]
async fn test_stop_fails_pending_exchange_and_ignores_events() {
    let env = TestEnvironment::new(201);
    env.client.start().await;
    let _gate = env.provider.hold_tokens();

    env.provider.switch_to(alice()).await;
    wait_for_state(env.store(), SessionState::is_exchanging).await;

    env.client.stop().await;
    assert!(!env.client.sessions().is_started().await);
    match env.store().state() {
        SessionState::ExchangeFailed { identity, .. } => assert_eq!(identity, alice()),
        other => panic!("unexpected state after stop: {:?}", other),
    }

    env.provider.switch_to(bob()).await;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(env.store().state().identity(), Some(&alice()));
    assert_eq!(env.auth_requests(), 0);

    // Stopping twice is harmless
    env.client.stop().await;
}

#[tokio::test]
async fn test_missing_push_token_fails_exchange() {
    let http = MockHttpClient::new();
    http.mock_response(AUTH_URL, 201, "");
    let push_tokens = Arc::new(ScriptedPushToken::default());
    let env = TestEnvironment::with_push_tokens(http, push_tokens.clone());
    env.client.start().await;

    env.provider.switch_to(alice()).await;
    match wait_failed(env.store()).await {
        SessionState::ExchangeFailed { reason, .. } => assert!(reason.contains("push token")),
        other => panic!("unexpected state: {:?}", other),
    }
    assert_eq!(env.auth_requests(), 0);

    push_tokens.set("push-late");
    assert_eq!(env.client.sessions().retry().await, Ok(true));
    wait_signed_in(env.store(), &alice().id).await;
    let registration = env.http.get_requests().pop().unwrap();
    assert_eq!(registration.body.as_deref(), Some(r#"{"pushToken":"push-late"}"#));
}

#[tokio::test]
async fn test_retry_after_failed_registration() {
    let http = MockHttpClient::new();
    http.queue_response(AUTH_URL, 500, "");
    http.mock_response(AUTH_URL, 201, "");
    let env = TestEnvironment::with_http(http);
    env.client.start().await;

    env.provider.switch_to(alice()).await;
    wait_failed(env.store()).await;

    assert_eq!(env.client.sessions().retry().await, Ok(true));
    wait_signed_in(env.store(), &alice().id).await;
    assert_eq!(env.auth_requests(), 2);

    // Nothing to retry once signed in
    assert_eq!(env.client.sessions().retry().await, Ok(false));
}

#[tokio::test]
async fn test_push_token_rotation_during_exchange_leaves_refresh_to_exchange() {
    let env = TestEnvironment::new(201);
    env.client.start().await;
    let gate = env.provider.hold_tokens();

    env.provider.switch_to(alice()).await;
    wait_for_state(env.store(), SessionState::is_exchanging).await;

    assert_eq!(env.client.sessions().register_push_token("push-2").await, Ok(true));
    assert!(env.store().state().is_exchanging());
    assert_eq!(env.provider.forced_refreshes(), 0);

    gate.add_permits(2);
    let state = wait_signed_in(env.store(), &alice().id).await;
    assert_eq!(env.provider.forced_refreshes(), 1);
    assert!(state.session().unwrap().token.starts_with("fresh-token-"));
    assert_eq!(env.auth_requests(), 2);
}

#[tokio::test]
async fn test_push_token_rotation_refreshes_session() {
    let env = TestEnvironment::new(201);
    env.client.start().await;
    env.provider.switch_to(alice()).await;
    wait_signed_in(env.store(), &alice().id).await;
    let before = env.store().current_session().unwrap();

    assert_eq!(env.client.sessions().register_push_token("push-2").await, Ok(true));
    let after = env.store().current_session().unwrap();
    assert_ne!(after.token, before.token);
    assert_eq!(env.provider.forced_refreshes(), 2);

    let rotation = env.http.get_requests().pop().unwrap();
    assert_eq!(rotation.body.as_deref(), Some(r#"{"pushToken":"push-2"}"#));
    assert_eq!(rotation.header("Authorization"), Some(before.bearer().as_str()));

    // Already registered: no refresh, session unchanged
    env.http.mock_response(AUTH_URL, 200, "");
    assert_eq!(env.client.sessions().register_push_token("push-2").await, Ok(false));
    assert_eq!(env.store().current_session(), Some(after));
    assert_eq!(env.auth_requests(), 3);
}
