//! The account client: the surface screens call into.
//!
//! [`AccountClient`] owns the reducer store, the session watcher, and the
//! profile store. Commands are dispatched into the store and awaited as
//! request/response pairs on the action broadcast; failure events come
//! back as [`AccountError`]s for user-facing display.
//!
//! One client exists per process, created explicitly at startup and torn
//! down with [`AccountClient::shutdown`] — injected wherever it is
//! needed, never an ambient global.

use crate::actions::AccountAction;
use crate::environment::AccountEnvironment;
use crate::error::{AccountError, Result};
use crate::profile_store::ProfileStore;
use crate::providers::{AuthGateway, Profile, ProfilePatch, ProfileRepository};
use crate::reducers::AccountReducer;
use crate::session_watch::SessionWatcher;
use crate::state::{AccountState, AuthPhase, Session};
use shortloop_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// How long `shutdown` waits for in-flight effects to drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

impl From<StoreError> for AccountError {
    fn from(error: StoreError) -> Self {
        Self::Backend(error.to_string())
    }
}

type AccountStore<G, P> =
    Store<AccountState, AccountAction, AccountEnvironment<G, P>, AccountReducer<G, P>>;

/// Process-wide entry point for the account flow.
pub struct AccountClient<G, P>
where
    G: AuthGateway + Clone + 'static,
    P: ProfileRepository + Clone + 'static,
{
    store: Arc<AccountStore<G, P>>,
    watcher: SessionWatcher,
    profiles: ProfileStore<P>,
    pump: JoinHandle<()>,
    timeout: Duration,
}

impl<G, P> AccountClient<G, P>
where
    G: AuthGateway + Clone + 'static,
    P: ProfileRepository + Clone + 'static,
{
    /// Wire up the store, subscribe to auth changes, and restore any
    /// persisted session.
    ///
    /// # Errors
    ///
    /// Fails if the auth-change subscription cannot be registered; that
    /// failure is fatal, not swallowed. A failed session *restore* is not
    /// fatal — the client starts signed out.
    pub async fn connect(gateway: G, profiles: P) -> Result<Self> {
        Self::connect_with_timeout(gateway, profiles, crate::config::DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Like [`AccountClient::connect`] with an explicit dispatch timeout.
    ///
    /// # Errors
    ///
    /// See [`AccountClient::connect`].
    pub async fn connect_with_timeout(
        gateway: G,
        profiles: P,
        timeout: Duration,
    ) -> Result<Self> {
        let environment = AccountEnvironment::new(gateway.clone(), profiles.clone());
        let store = Arc::new(Store::new(
            AccountState::default(),
            AccountReducer::new(),
            environment,
        ));

        let watcher = SessionWatcher::spawn(&gateway)?;

        // Second subscription feeds pushed changes into the reducer.
        let mut changes = gateway.subscribe_changes()?;
        let pump_store = Arc::clone(&store);
        let pump = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(session) => {
                        if pump_store
                            .send(AccountAction::SessionChanged { session })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session pump lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Fire the initial auth-state notification with whatever is
        // persisted.
        if let Err(error) = gateway.restore_session().await {
            tracing::warn!(%error, "Session restore failed, starting signed out");
        }

        Ok(Self {
            store,
            watcher,
            profiles: ProfileStore::new(profiles),
            pump,
            timeout,
        })
    }

    /// Start a registration. On success the flow is pending verification
    /// and an OTP email is on its way.
    ///
    /// # Errors
    ///
    /// `MissingEmail` / `MissingPassword` / `MissingUsername` before any
    /// network call, `EmailAlreadyRegistered` from the pre-check, or
    /// `SignUpRejected` verbatim from the backend.
    pub async fn sign_up(&self, email: &str, password: &str, username: &str) -> Result<()> {
        let correlation_id = uuid::Uuid::new_v4();
        let result = self
            .dispatch(
                AccountAction::SignUp {
                    correlation_id,
                    email: email.to_string(),
                    password: password.to_string(),
                    username: username.to_string(),
                },
                move |a| {
                    matches!(
                        a,
                        AccountAction::SignUpAccepted { correlation_id: id, .. }
                        | AccountAction::SignUpFailed { correlation_id: id, .. }
                            if *id == correlation_id
                    )
                },
            )
            .await?;

        match result {
            AccountAction::SignUpAccepted { .. } => Ok(()),
            AccountAction::SignUpFailed { error, .. } => Err(error),
            _ => Err(AccountError::Backend("unexpected event".to_string())),
        }
    }

    /// Submit the emailed 6-digit code.
    ///
    /// On success the user is verified, signed in, and the profile row is
    /// seeded (or left for the lazy fetch-or-create path).
    ///
    /// # Errors
    ///
    /// `MalformedOtp` before any network call,
    /// `MissingRegistrationState` when no sign-up is pending, or the
    /// backend's classified rejection.
    pub async fn verify_otp(&self, code: &str) -> Result<Session> {
        let correlation_id = uuid::Uuid::new_v4();
        let result = self
            .dispatch(
                AccountAction::VerifyOtp {
                    correlation_id,
                    code: code.to_string(),
                },
                move |a| {
                    matches!(
                        a,
                        AccountAction::OtpAccepted { correlation_id: id, .. }
                        | AccountAction::VerifyFailed { correlation_id: id, .. }
                            if *id == correlation_id
                    )
                },
            )
            .await?;

        match result {
            AccountAction::OtpAccepted { session, .. } => Ok(session),
            AccountAction::VerifyFailed { error, .. } => Err(error),
            _ => Err(AccountError::Backend("unexpected event".to_string())),
        }
    }

    /// Request a fresh verification code.
    ///
    /// # Errors
    ///
    /// `ResendThrottled` with the remaining seconds while the local
    /// cooldown runs, `RateLimited` when the backend throttles, or
    /// `MissingRegistrationState` when no sign-up is pending.
    pub async fn resend_otp(&self) -> Result<()> {
        let correlation_id = uuid::Uuid::new_v4();
        let result = self
            .dispatch(AccountAction::ResendOtp { correlation_id }, move |a| {
                matches!(
                    a,
                    AccountAction::ResendAccepted { correlation_id: id, .. }
                    | AccountAction::ResendFailed { correlation_id: id, .. }
                        if *id == correlation_id
                )
            })
            .await?;

        match result {
            AccountAction::ResendAccepted { .. } => Ok(()),
            AccountAction::ResendFailed { error, .. } => Err(error),
            _ => Err(AccountError::Backend("unexpected event".to_string())),
        }
    }

    /// Sign in with existing credentials.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for declined credentials (an expected
    /// outcome), `SignInRejected` for anything else.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let correlation_id = uuid::Uuid::new_v4();
        let result = self
            .dispatch(
                AccountAction::SignIn {
                    correlation_id,
                    email: email.to_string(),
                    password: password.to_string(),
                },
                move |a| {
                    matches!(
                        a,
                        AccountAction::SignedIn { correlation_id: id, .. }
                        | AccountAction::SignInFailed { correlation_id: id, .. }
                            if *id == correlation_id
                    )
                },
            )
            .await?;

        match result {
            AccountAction::SignedIn { session, .. } => Ok(session),
            AccountAction::SignInFailed { error, .. } => Err(error),
            _ => Err(AccountError::Backend("unexpected event".to_string())),
        }
    }

    /// Revoke the current session.
    ///
    /// # Errors
    ///
    /// `SignOutFailed` if the backend call errors; the session is left
    /// intact in that case.
    pub async fn sign_out(&self) -> Result<()> {
        let correlation_id = uuid::Uuid::new_v4();
        let result = self
            .dispatch(AccountAction::SignOut { correlation_id }, move |a| {
                matches!(
                    a,
                    AccountAction::SignedOut { correlation_id: id, .. }
                    | AccountAction::SignOutFailed { correlation_id: id, .. }
                        if *id == correlation_id
                )
            })
            .await?;

        match result {
            AccountAction::SignedOut { .. } => {
                self.profiles.invalidate();
                Ok(())
            }
            AccountAction::SignOutFailed { error, .. } => Err(error),
            _ => Err(AccountError::Backend("unexpected event".to_string())),
        }
    }

    /// Fetch-or-create the signed-in user's profile row.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session; otherwise whatever the
    /// profile store propagates.
    pub async fn ensure_profile(&self) -> Result<Profile> {
        let phase = self.phase().await;
        let Some(session) = phase.session() else {
            return Err(AccountError::NotAuthenticated);
        };

        self.profiles
            .ensure_profile(session.user_id, &session.email)
            .await
    }

    /// Partially update the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session; otherwise whatever the
    /// profile store propagates.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<Profile> {
        let phase = self.phase().await;
        let Some(session) = phase.session() else {
            return Err(AccountError::NotAuthenticated);
        };

        self.profiles.update_profile(session.user_id, patch).await
    }

    /// Current phase of the flow.
    pub async fn phase(&self) -> AuthPhase {
        self.store.state(|s| s.phase.clone()).await
    }

    /// Seconds until the next resend is allowed (for countdown display).
    pub async fn resend_cooldown(&self) -> u32 {
        self.store.state(|s| s.resend_cooldown).await
    }

    /// The session watcher (read side of the current session).
    #[must_use]
    pub const fn session(&self) -> &SessionWatcher {
        &self.watcher
    }

    /// The profile store (cache + fetch-or-create).
    #[must_use]
    pub const fn profiles(&self) -> &ProfileStore<P> {
        &self.profiles
    }

    /// Tear down: stop the pumps and drain in-flight effects.
    ///
    /// # Errors
    ///
    /// Propagates a shutdown timeout as `Backend`.
    pub async fn shutdown(&self) -> Result<()> {
        self.pump.abort();
        self.watcher.shutdown();
        self.store
            .shutdown(SHUTDOWN_TIMEOUT)
            .await
            .map_err(AccountError::from)
    }

    async fn dispatch<F>(&self, action: AccountAction, matches: F) -> Result<AccountAction>
    where
        F: Fn(&AccountAction) -> bool,
    {
        self.store
            .send_and_wait_for(action, matches, self.timeout)
            .await
            .map_err(AccountError::from)
    }
}

impl<G, P> Drop for AccountClient<G, P>
where
    G: AuthGateway + Clone + 'static,
    P: ProfileRepository + Clone + 'static,
{
    fn drop(&mut self) {
        self.pump.abort();
    }
}
