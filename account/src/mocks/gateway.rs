//! Mock auth gateway for testing.

use crate::error::{AccountError, Result};
use crate::providers::{AuthGateway, AuthUser, NewAccount};
use crate::state::{Session, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// The verification code every mock account accepts by default.
pub const DEFAULT_OTP: &str = "123456";

#[derive(Debug, Clone)]
struct MockAccount {
    user_id: UserId,
    password: String,
    confirmed: bool,
}

#[derive(Debug)]
struct Inner {
    accounts: HashMap<String, MockAccount>,
    expected_otp: String,
    restored: Option<Session>,
    fail_subscribe: bool,
    sign_up_error: Option<AccountError>,
    verify_error: Option<AccountError>,
    sign_in_error: Option<AccountError>,
    sign_out_error: Option<AccountError>,
    resend_error: Option<AccountError>,
    restore_error: Option<AccountError>,
    sign_up_calls: usize,
    verify_calls: usize,
    sign_in_calls: usize,
    sign_out_calls: usize,
    resend_calls: usize,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
            expected_otp: DEFAULT_OTP.to_string(),
            restored: None,
            fail_subscribe: false,
            sign_up_error: None,
            verify_error: None,
            sign_in_error: None,
            sign_out_error: None,
            resend_error: None,
            restore_error: None,
            sign_up_calls: 0,
            verify_calls: 0,
            sign_in_calls: 0,
            sign_out_calls: 0,
            resend_calls: 0,
        }
    }
}

/// Mock auth gateway.
///
/// Holds accounts in memory; verification succeeds for the configured
/// code (default [`DEFAULT_OTP`]) and confirms the account, sign-in
/// requires a confirmed account with a matching password.
#[derive(Debug, Clone)]
pub struct MockAuthGateway {
    inner: Arc<Mutex<Inner>>,
    changes: broadcast::Sender<Option<Session>>,
}

impl MockAuthGateway {
    /// Create a new mock gateway with no accounts.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            changes,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AccountError::Backend("mock lock poisoned".to_string()))
    }

    /// Register a confirmed account directly (for sign-in tests).
    pub fn add_confirmed_account(&self, email: &str, password: &str) -> UserId {
        let user_id = UserId::new();
        if let Ok(mut inner) = self.lock() {
            inner.accounts.insert(
                email.to_string(),
                MockAccount {
                    user_id,
                    password: password.to_string(),
                    confirmed: true,
                },
            );
        }
        user_id
    }

    /// Set the session returned (and announced) by `restore_session`.
    pub fn set_restored_session(&self, session: Session) {
        if let Ok(mut inner) = self.lock() {
            inner.restored = Some(session);
        }
    }

    /// Change the accepted verification code.
    pub fn set_expected_otp(&self, code: &str) {
        if let Ok(mut inner) = self.lock() {
            inner.expected_otp = code.to_string();
        }
    }

    /// Make `subscribe_changes` fail.
    pub fn fail_subscription(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_subscribe = true;
        }
    }

    /// Fail the next `sign_up` call with `error`.
    pub fn fail_next_sign_up(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.sign_up_error = Some(error);
        }
    }

    /// Fail the next `verify_otp` call with `error`.
    pub fn fail_next_verify(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.verify_error = Some(error);
        }
    }

    /// Fail the next `sign_in_with_password` call with `error`.
    pub fn fail_next_sign_in(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.sign_in_error = Some(error);
        }
    }

    /// Fail the next `sign_out` call with `error`.
    pub fn fail_next_sign_out(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.sign_out_error = Some(error);
        }
    }

    /// Fail the next `resend_signup_otp` call with `error`.
    pub fn fail_next_resend(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.resend_error = Some(error);
        }
    }

    /// Fail the next `restore_session` call with `error`.
    pub fn fail_next_restore(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.restore_error = Some(error);
        }
    }

    /// Push a session change to subscribers, as the backend would.
    pub fn emit(&self, session: Option<Session>) {
        let _ = self.changes.send(session);
    }

    /// Number of `sign_up` calls that reached the gateway.
    #[must_use]
    pub fn sign_up_calls(&self) -> usize {
        self.lock().map(|i| i.sign_up_calls).unwrap_or(0)
    }

    /// Number of `verify_otp` calls that reached the gateway.
    #[must_use]
    pub fn verify_calls(&self) -> usize {
        self.lock().map(|i| i.verify_calls).unwrap_or(0)
    }

    /// Number of `sign_in_with_password` calls that reached the gateway.
    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.lock().map(|i| i.sign_in_calls).unwrap_or(0)
    }

    /// Number of `resend_signup_otp` calls that reached the gateway.
    #[must_use]
    pub fn resend_calls(&self) -> usize {
        self.lock().map(|i| i.resend_calls).unwrap_or(0)
    }

    /// Number of `sign_out` calls that reached the gateway.
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.lock().map(|i| i.sign_out_calls).unwrap_or(0)
    }
}

impl Default for MockAuthGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGateway for MockAuthGateway {
    fn sign_up(&self, account: &NewAccount) -> impl Future<Output = Result<AuthUser>> + Send {
        let this = self.clone();
        let account = account.clone();

        async move {
            let mut inner = this.lock()?;
            inner.sign_up_calls += 1;

            if let Some(error) = inner.sign_up_error.take() {
                return Err(error);
            }

            let user_id = UserId::new();
            inner.accounts.insert(
                account.email.clone(),
                MockAccount {
                    user_id,
                    password: account.password.clone(),
                    confirmed: false,
                },
            );

            Ok(AuthUser {
                user_id,
                email: account.email,
                email_confirmed: false,
            })
        }
    }

    fn verify_otp(&self, email: &str, code: &str) -> impl Future<Output = Result<AuthUser>> + Send {
        let this = self.clone();
        let email = email.to_string();
        let code = code.to_string();

        async move {
            let mut inner = this.lock()?;
            inner.verify_calls += 1;

            if let Some(error) = inner.verify_error.take() {
                return Err(error);
            }

            let expected = inner.expected_otp.clone();
            let Some(account) = inner.accounts.get_mut(&email) else {
                return Err(AccountError::VerifyRejected("unknown email".to_string()));
            };

            if code != expected {
                return Err(AccountError::OtpInvalid);
            }

            account.confirmed = true;
            let user_id = account.user_id;

            Ok(AuthUser {
                user_id,
                email,
                email_confirmed: true,
            })
        }
    }

    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session>> + Send {
        let this = self.clone();
        let email = email.to_string();
        let password = password.to_string();

        async move {
            let session = {
                let mut inner = this.lock()?;
                inner.sign_in_calls += 1;

                if let Some(error) = inner.sign_in_error.take() {
                    return Err(error);
                }

                let Some(account) = inner.accounts.get(&email) else {
                    return Err(AccountError::InvalidCredentials);
                };

                if account.password != password || !account.confirmed {
                    return Err(AccountError::InvalidCredentials);
                }

                Session {
                    user_id: account.user_id,
                    email: email.clone(),
                    email_confirmed: true,
                    access_token: format!("mock-token-{}", uuid::Uuid::new_v4()),
                    refresh_token: None,
                    expires_at: None,
                }
            };

            let _ = this.changes.send(Some(session.clone()));

            Ok(session)
        }
    }

    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();

        async move {
            {
                let mut inner = this.lock()?;
                inner.sign_out_calls += 1;

                if let Some(error) = inner.sign_out_error.take() {
                    return Err(error);
                }
            }

            let _ = this.changes.send(None);

            Ok(())
        }
    }

    fn resend_signup_otp(&self, _email: &str) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();

        async move {
            let mut inner = this.lock()?;
            inner.resend_calls += 1;

            if let Some(error) = inner.resend_error.take() {
                return Err(error);
            }

            Ok(())
        }
    }

    fn subscribe_changes(&self) -> Result<broadcast::Receiver<Option<Session>>> {
        if self.lock()?.fail_subscribe {
            return Err(AccountError::Backend(
                "subscription registration refused".to_string(),
            ));
        }

        Ok(self.changes.subscribe())
    }

    fn restore_session(&self) -> impl Future<Output = Result<Option<Session>>> + Send {
        let this = self.clone();

        async move {
            let restored = {
                let mut inner = this.lock()?;

                if let Some(error) = inner.restore_error.take() {
                    drop(inner);
                    let _ = this.changes.send(None);
                    return Err(error);
                }

                inner.restored.clone()
            };

            let _ = this.changes.send(restored.clone());

            Ok(restored)
        }
    }
}
