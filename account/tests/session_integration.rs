//! Integration tests for the session flow: sign-in, sign-out, and pushed
//! auth-change notifications.

#![allow(clippy::unwrap_used, clippy::panic)]

use shortloop_account::{
    actions::AccountAction,
    environment::AccountEnvironment,
    error::AccountError,
    mocks::{MockAuthGateway, MockProfileRepository},
    reducers::AccountReducer,
    state::{AccountState, AuthPhase, PendingSignUp, Session, UserId},
};
use shortloop_core::effect::Effect;
use shortloop_core::reducer::Reducer;
use shortloop_core::SmallVec;
use shortloop_testing::{assertions, ReducerTest};

type TestEnv = AccountEnvironment<MockAuthGateway, MockProfileRepository>;
type TestReducer = AccountReducer<MockAuthGateway, MockProfileRepository>;

fn create_test_env() -> TestEnv {
    AccountEnvironment::new(MockAuthGateway::new(), MockProfileRepository::new())
}

fn test_session(email: &str) -> Session {
    Session {
        user_id: UserId::new(),
        email: email.to_string(),
        email_confirmed: true,
        access_token: "token".to_string(),
        refresh_token: None,
        expires_at: None,
    }
}

async fn run_first_effect(
    effects: SmallVec<[Effect<AccountAction>; 4]>,
) -> Option<AccountAction> {
    for effect in effects {
        if let Effect::Future(fut) = effect {
            return fut.await;
        }
    }
    None
}

#[tokio::test]
async fn sign_in_with_valid_credentials_authenticates() {
    let reducer = TestReducer::new();
    let env = create_test_env();
    let mut state = AccountState::default();

    env.gateway.add_confirmed_account("a@x.com", "p1");

    let effects = reducer.reduce(
        &mut state,
        AccountAction::SignIn {
            correlation_id: uuid::Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password: "p1".to_string(),
        },
        &env,
    );

    let event = run_first_effect(effects).await.unwrap();
    let AccountAction::SignedIn { ref session, .. } = event else {
        panic!("expected SignedIn, got {event:?}");
    };
    assert_eq!(session.email, "a@x.com");

    reducer.reduce(&mut state, event, &env);
    assert!(state.phase.is_authenticated());
    assert!(!state.restoring);
}

#[tokio::test]
async fn sign_in_with_wrong_password_is_invalid_credentials() {
    let reducer = TestReducer::new();
    let env = create_test_env();
    let mut state = AccountState::default();

    env.gateway.add_confirmed_account("a@x.com", "p1");

    let effects = reducer.reduce(
        &mut state,
        AccountAction::SignIn {
            correlation_id: uuid::Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password: "wrong".to_string(),
        },
        &env,
    );

    let event = run_first_effect(effects).await.unwrap();
    assert!(matches!(
        event,
        AccountAction::SignInFailed {
            error: AccountError::InvalidCredentials,
            ..
        }
    ));

    reducer.reduce(&mut state, event, &env);
    assert!(state.phase.is_anonymous());
}

#[tokio::test]
async fn sign_in_validates_fields_before_any_network_call() {
    let reducer = TestReducer::new();
    let env = create_test_env();
    let mut state = AccountState::default();

    let effects = reducer.reduce(
        &mut state,
        AccountAction::SignIn {
            correlation_id: uuid::Uuid::new_v4(),
            email: String::new(),
            password: "p1".to_string(),
        },
        &env,
    );

    let event = run_first_effect(effects).await.unwrap();
    assert!(matches!(
        event,
        AccountAction::SignInFailed {
            error: AccountError::MissingEmail,
            ..
        }
    ));
    assert_eq!(env.gateway.sign_in_calls(), 0);
}

#[tokio::test]
async fn failed_sign_out_leaves_the_session_intact() {
    let reducer = TestReducer::new();
    let env = create_test_env();
    let session = test_session("a@x.com");
    let mut state = AccountState {
        phase: AuthPhase::Authenticated {
            session: session.clone(),
        },
        restoring: false,
        pending: None,
        resend_cooldown: 0,
    };

    env.gateway
        .fail_next_sign_out(AccountError::SignOutFailed("backend down".to_string()));

    let effects = reducer.reduce(
        &mut state,
        AccountAction::SignOut {
            correlation_id: uuid::Uuid::new_v4(),
        },
        &env,
    );

    let event = run_first_effect(effects).await.unwrap();
    assert!(matches!(
        event,
        AccountAction::SignOutFailed {
            error: AccountError::SignOutFailed(_),
            ..
        }
    ));

    reducer.reduce(&mut state, event, &env);
    // No optimistic clear
    assert_eq!(state.phase.session(), Some(&session));
}

#[tokio::test]
async fn successful_sign_out_returns_to_anonymous() {
    let reducer = TestReducer::new();
    let env = create_test_env();
    let mut state = AccountState {
        phase: AuthPhase::Authenticated {
            session: test_session("a@x.com"),
        },
        restoring: false,
        pending: None,
        resend_cooldown: 0,
    };

    let effects = reducer.reduce(
        &mut state,
        AccountAction::SignOut {
            correlation_id: uuid::Uuid::new_v4(),
        },
        &env,
    );

    let event = run_first_effect(effects).await.unwrap();
    assert!(matches!(event, AccountAction::SignedOut { .. }));

    reducer.reduce(&mut state, event, &env);
    assert!(state.phase.is_anonymous());
}

#[test]
fn pushed_session_replaces_phase_and_clears_restoring() {
    let session = test_session("a@x.com");
    let expected = session.clone();

    ReducerTest::new(TestReducer::new())
        .with_env(create_test_env())
        .given_state(AccountState::default())
        .when_action(AccountAction::SessionChanged {
            session: Some(session),
        })
        .then_state(move |state| {
            assert!(!state.restoring);
            assert_eq!(state.phase.session(), Some(&expected));
        })
        .then_effects(|effects| {
            assertions::assert_no_effects(effects);
        })
        .run();
}

#[test]
fn null_push_does_not_cancel_a_pending_verification() {
    ReducerTest::new(TestReducer::new())
        .with_env(create_test_env())
        .given_state(AccountState {
            phase: AuthPhase::PendingVerification {
                email: "a@x.com".to_string(),
            },
            restoring: false,
            pending: Some(PendingSignUp {
                email: "a@x.com".to_string(),
                password: "p1".to_string(),
                username: "alice".to_string(),
            }),
            resend_cooldown: 42,
        })
        .when_action(AccountAction::SessionChanged { session: None })
        .then_state(|state| {
            // Sign-up has not created a session; a null push is not a
            // sign-out
            assert!(state.phase.is_pending_verification());
            assert!(state.pending.is_some());
        })
        .run();
}

#[test]
fn null_push_signs_out_an_authenticated_session() {
    ReducerTest::new(TestReducer::new())
        .with_env(create_test_env())
        .given_state(AccountState {
            phase: AuthPhase::Authenticated {
                session: test_session("a@x.com"),
            },
            restoring: false,
            pending: None,
            resend_cooldown: 0,
        })
        .when_action(AccountAction::SessionChanged { session: None })
        .then_state(|state| {
            assert!(state.phase.is_anonymous());
        })
        .run();
}
