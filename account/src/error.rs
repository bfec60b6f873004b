//! Error types for account operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for account operations.
pub type Result<T> = std::result::Result<T, AccountError>;

/// Error taxonomy for the account flow.
///
/// Variants are organized by category: validation failures are caught
/// before any network call, auth rejections are surfaced to the user
/// verbatim, throttle errors carry remaining-time context, and the
/// persistence conflict is recovered internally and never shown.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountError {
    // ═══════════════════════════════════════════════════════════
    // Validation (caught client-side, before any network call)
    // ═══════════════════════════════════════════════════════════

    /// Email was empty.
    #[error("Email is required")]
    MissingEmail,

    /// Password was empty.
    #[error("Password is required")]
    MissingPassword,

    /// Username was empty.
    #[error("Username is required")]
    MissingUsername,

    /// Verification code was not exactly 6 numeric digits.
    #[error("Verification code must be 6 digits")]
    MalformedOtp,

    // ═══════════════════════════════════════════════════════════
    // Auth rejections (backend declined, surfaced verbatim)
    // ═══════════════════════════════════════════════════════════

    /// The pre-signup check found a profile row with this email.
    #[error("Email already registered")]
    EmailAlreadyRegistered,

    /// Backend rejected the sign-up request.
    #[error("Sign-up rejected: {0}")]
    SignUpRejected(String),

    /// Invalid credentials provided.
    ///
    /// Expected user-facing outcome; never logged at error severity.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Backend rejected the sign-in for a reason other than credentials.
    #[error("Sign-in rejected: {0}")]
    SignInRejected(String),

    /// Backend failed the sign-out call; the session is left intact.
    #[error("Sign-out failed: {0}")]
    SignOutFailed(String),

    /// Verification code has expired.
    #[error("Verification code has expired")]
    OtpExpired,

    /// Verification code is invalid.
    #[error("Invalid verification code")]
    OtpInvalid,

    /// Backend rejected the verification for another reason.
    #[error("Verification rejected: {0}")]
    VerifyRejected(String),

    // ═══════════════════════════════════════════════════════════
    // Throttling
    // ═══════════════════════════════════════════════════════════

    /// Resend requested while the local cooldown is still running.
    #[error("New code available in {seconds_remaining}s")]
    ResendThrottled {
        /// Seconds until the next resend is allowed.
        seconds_remaining: u32,
    },

    /// Backend rate-limited the request ("security purposes" class).
    #[error("Rate limited, please wait before retrying")]
    RateLimited,

    // ═══════════════════════════════════════════════════════════
    // Flow-state errors (indicate a UI-flow bug)
    // ═══════════════════════════════════════════════════════════

    /// Verification or resend attempted without pending sign-up state.
    #[error("Missing registration state")]
    MissingRegistrationState,

    /// Operation that requires a signed-in user ran without a session.
    #[error("Not signed in")]
    NotAuthenticated,

    // ═══════════════════════════════════════════════════════════
    // Persistence
    // ═══════════════════════════════════════════════════════════

    /// Duplicate profile insert (unique constraint on id).
    ///
    /// Recovered transparently inside the profile store by re-reading the
    /// winning row; callers of `ensure_profile` never see this.
    #[error("Profile row already exists")]
    ProfileConflict,

    /// Profile row not found where one was required.
    #[error("Profile not found")]
    ProfileNotFound,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Backend call failed (transport or unexpected response).
    #[error("Backend error: {0}")]
    Backend(String),

    /// Local session storage failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AccountError {
    /// Returns `true` if this error is an expected user-facing outcome.
    ///
    /// User errors must not be logged at error severity.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shortloop_account::AccountError;
    /// assert!(AccountError::InvalidCredentials.is_user_error());
    /// assert!(!AccountError::Backend("boom".into()).is_user_error());
    /// ```
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::MissingEmail
                | Self::MissingPassword
                | Self::MissingUsername
                | Self::MalformedOtp
                | Self::EmailAlreadyRegistered
                | Self::InvalidCredentials
                | Self::OtpExpired
                | Self::OtpInvalid
                | Self::ResendThrottled { .. }
                | Self::RateLimited
        )
    }

    /// Returns `true` for throttle-class errors (local cooldown or backend
    /// rate limit).
    pub const fn is_throttle(&self) -> bool {
        matches!(self, Self::ResendThrottled { .. } | Self::RateLimited)
    }

    /// Returns `true` for the duplicate-insert conflict that the profile
    /// store recovers from.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ProfileConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_cover_validation_and_rejections() {
        assert!(AccountError::MalformedOtp.is_user_error());
        assert!(AccountError::EmailAlreadyRegistered.is_user_error());
        assert!(AccountError::OtpExpired.is_user_error());
        assert!(!AccountError::MissingRegistrationState.is_user_error());
        assert!(!AccountError::SignUpRejected("x".into()).is_user_error());
    }

    #[test]
    fn throttle_class_carries_remaining_time() {
        let err = AccountError::ResendThrottled {
            seconds_remaining: 55,
        };
        assert!(err.is_throttle());
        assert!(err.to_string().contains("55"));
        assert!(AccountError::RateLimited.is_throttle());
        assert!(!AccountError::OtpInvalid.is_throttle());
    }

    #[test]
    fn conflict_is_only_the_duplicate_insert() {
        assert!(AccountError::ProfileConflict.is_conflict());
        assert!(!AccountError::ProfileNotFound.is_conflict());
    }
}
