//! End-to-end tests for [`AccountClient`] over mock providers: the full
//! sign-up → verify → profile scenario, resend throttling, session
//! restoration, and teardown.

#![allow(clippy::unwrap_used, clippy::panic)]

use shortloop_account::{
    error::AccountError,
    mocks::{MockAuthGateway, MockProfileRepository},
    state::{Session, UserId},
    AccountClient,
};
use std::time::Duration;

type TestClient = AccountClient<MockAuthGateway, MockProfileRepository>;

async fn connect(
    gateway: &MockAuthGateway,
    profiles: &MockProfileRepository,
) -> TestClient {
    AccountClient::connect(gateway.clone(), profiles.clone())
        .await
        .unwrap_or_else(|e| panic!("connect failed: {e}"))
}

/// Poll an async condition until it holds or a second passes.
async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn full_registration_scenario() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    let client = connect(&gateway, &profiles).await;

    client.sign_up("a@x.com", "p1", "alice").await.unwrap();
    let phase = client.phase().await;
    assert_eq!(phase.pending_email(), Some("a@x.com"));

    let session = client.verify_otp("123456").await.unwrap();
    assert_eq!(session.email, "a@x.com");
    assert!(client.phase().await.is_authenticated());

    let profile = client.ensure_profile().await.unwrap();
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.followers_count, 0);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn resend_twice_in_quick_succession_is_throttled() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    let client = connect(&gateway, &profiles).await;

    client.sign_up("a@x.com", "p1", "alice").await.unwrap();

    // The sign-up armed the cooldown; an immediate resend must be
    // rejected with most of the 60 seconds still remaining.
    let error = client.resend_otp().await.unwrap_err();
    let AccountError::ResendThrottled { seconds_remaining } = error else {
        panic!("expected ResendThrottled, got {error:?}");
    };
    assert!(
        (55..=60).contains(&seconds_remaining),
        "unexpected remaining time {seconds_remaining}"
    );

    // The throttled attempt never reached the backend
    assert_eq!(gateway.resend_calls(), 0);
}

#[tokio::test]
async fn verify_without_sign_up_fails_without_a_network_call() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    let client = connect(&gateway, &profiles).await;

    let error = client.verify_otp("123456").await.unwrap_err();
    assert_eq!(error, AccountError::MissingRegistrationState);
    assert_eq!(gateway.verify_calls(), 0);
}

#[tokio::test]
async fn malformed_code_is_rejected_before_submission() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    let client = connect(&gateway, &profiles).await;

    client.sign_up("a@x.com", "p1", "alice").await.unwrap();

    let error = client.verify_otp("12 456").await.unwrap_err();
    assert_eq!(error, AccountError::MalformedOtp);
    assert_eq!(gateway.verify_calls(), 0);
}

#[tokio::test]
async fn persisted_session_is_restored_at_startup() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();

    let session = Session {
        user_id: UserId::new(),
        email: "a@x.com".to_string(),
        email_confirmed: true,
        access_token: "persisted-token".to_string(),
        refresh_token: None,
        expires_at: None,
    };
    gateway.set_restored_session(session.clone());

    let client = connect(&gateway, &profiles).await;

    let snapshot = client.session().restored().await;
    assert!(!snapshot.restoring);
    assert_eq!(snapshot.session, Some(session));

    assert!(
        eventually(|| async { client.phase().await.is_authenticated() }).await,
        "restored session should reach the reducer"
    );
}

#[tokio::test]
async fn startup_without_a_persisted_session_settles_anonymous() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    let client = connect(&gateway, &profiles).await;

    let snapshot = client.session().restored().await;
    assert!(!snapshot.restoring);
    assert!(snapshot.session.is_none());
    assert!(client.phase().await.is_anonymous());
}

#[tokio::test]
async fn failed_subscription_registration_is_fatal() {
    let gateway = MockAuthGateway::new();
    gateway.fail_subscription();

    let result = AccountClient::connect(gateway, MockProfileRepository::new()).await;
    assert!(matches!(result, Err(AccountError::Backend(_))));
}

#[tokio::test]
async fn sign_in_and_sign_out_round_trip() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    gateway.add_confirmed_account("a@x.com", "p1");

    let client = connect(&gateway, &profiles).await;

    let session = client.sign_in("a@x.com", "p1").await.unwrap();
    assert_eq!(session.email, "a@x.com");
    assert!(client.phase().await.is_authenticated());

    // The gateway announced the session; the watcher catches up
    assert!(
        eventually(|| async { client.session().snapshot().is_authenticated() }).await,
        "watcher should observe the announced session"
    );

    client.sign_out().await.unwrap();
    assert!(client.phase().await.is_anonymous());
    assert!(client.profiles().cached().is_none());

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_credentials_surface_to_the_caller() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    gateway.add_confirmed_account("a@x.com", "p1");

    let client = connect(&gateway, &profiles).await;

    let error = client.sign_in("a@x.com", "nope").await.unwrap_err();
    assert_eq!(error, AccountError::InvalidCredentials);
    assert!(client.phase().await.is_anonymous());
}

#[tokio::test]
async fn failed_sign_out_keeps_the_session() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    gateway.add_confirmed_account("a@x.com", "p1");

    let client = connect(&gateway, &profiles).await;
    client.sign_in("a@x.com", "p1").await.unwrap();

    gateway.fail_next_sign_out(AccountError::SignOutFailed("backend down".to_string()));

    let error = client.sign_out().await.unwrap_err();
    assert!(matches!(error, AccountError::SignOutFailed(_)));
    assert!(client.phase().await.is_authenticated());
}

#[tokio::test]
async fn profile_operations_require_a_session() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    let client = connect(&gateway, &profiles).await;

    let error = client.ensure_profile().await.unwrap_err();
    assert_eq!(error, AccountError::NotAuthenticated);
}

#[tokio::test]
async fn update_profile_round_trip_after_registration() {
    let gateway = MockAuthGateway::new();
    let profiles = MockProfileRepository::new();
    let client = connect(&gateway, &profiles).await;

    client.sign_up("a@x.com", "p1", "alice").await.unwrap();
    client.verify_otp("123456").await.unwrap();

    let before = client.ensure_profile().await.unwrap();

    let updated = client
        .update_profile(&shortloop_account::ProfilePatch {
            bio: Some("hello".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.bio.as_deref(), Some("hello"));

    let after = client.ensure_profile().await.unwrap();
    assert_eq!(after.bio.as_deref(), Some("hello"));
    assert_eq!(after.username, before.username);
    assert_eq!(after.followers_count, before.followers_count);
}
