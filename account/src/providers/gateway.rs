//! Auth gateway trait.

use crate::error::Result;
use crate::state::Session;
use super::{AuthUser, NewAccount};
use tokio::sync::broadcast;

/// Auth gateway.
///
/// This trait abstracts over the hosted backend's auth surface: sign-up,
/// OTP verification, password sign-in, sign-out, resend, and the pushed
/// auth-change stream.
///
/// # Implementation Notes
///
/// - The backend dispatches OTP emails out-of-band after `sign_up` and
///   `resend_signup_otp`; the gateway never sees email delivery.
/// - Implementations that hold a session (sign-in, sign-out, restore)
///   must announce every change on the broadcast returned by
///   [`AuthGateway::subscribe_changes`].
pub trait AuthGateway: Send + Sync {
    /// Register a new account with the username as pending metadata.
    ///
    /// Triggers an OTP email out-of-band. The returned user is not yet
    /// confirmed and has no active session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Backend declines the registration → `AccountError::SignUpRejected`
    /// - Transport fails → `AccountError::Backend`
    fn sign_up(
        &self,
        account: &NewAccount,
    ) -> impl std::future::Future<Output = Result<AuthUser>> + Send;

    /// Submit the emailed signup OTP.
    ///
    /// Acceptance confirms the email but does **not** guarantee an active
    /// session in all backend configurations; callers follow up with an
    /// explicit [`AuthGateway::sign_in_with_password`].
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Code expired → `AccountError::OtpExpired`
    /// - Code wrong → `AccountError::OtpInvalid`
    /// - Anything else → `AccountError::VerifyRejected` / `Backend`
    fn verify_otp(
        &self,
        email: &str,
        code: &str,
    ) -> impl std::future::Future<Output = Result<AuthUser>> + Send;

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Credentials declined → `AccountError::InvalidCredentials`
    /// - Anything else → `AccountError::SignInRejected` / `Backend`
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Session>> + Send;

    /// Revoke the current session.
    ///
    /// On failure the session must be left intact (no optimistic clear).
    ///
    /// # Errors
    ///
    /// Returns `AccountError::SignOutFailed` if the backend call errors.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Request a fresh signup OTP for `email`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Backend rate limit ("security purposes" class) →
    ///   `AccountError::RateLimited`
    /// - Anything else → `AccountError::Backend`
    fn resend_signup_otp(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Subscribe to pushed session changes.
    ///
    /// The stream carries the new session on sign-in and `None` on
    /// sign-out; [`AuthGateway::restore_session`] produces the initial
    /// notification after startup.
    ///
    /// # Errors
    ///
    /// A failed subscription registration is fatal to the caller and must
    /// be surfaced, not swallowed.
    fn subscribe_changes(&self) -> Result<broadcast::Receiver<Option<Session>>>;

    /// Load the persisted session, announce it on the change broadcast,
    /// and return it.
    ///
    /// Must announce at least once — `None` when nothing valid is
    /// persisted — so subscribers can leave their loading state.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Storage` if the persisted value cannot be
    /// read; implementations still announce `None` in that case.
    fn restore_session(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Session>>> + Send;
}
