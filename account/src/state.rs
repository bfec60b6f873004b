//! Account state types.
//!
//! This module defines the core state types for the account flow.
//! All types are `Clone` to support the functional architecture pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds a user must wait between OTP resend requests.
pub const RESEND_COOLDOWN_SECS: u32 = 60;

/// Exact length of a verification code.
pub const OTP_LENGTH: usize = 6;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a user, issued by the backend.
///
/// Doubles as the profile-row key: exactly one profile row exists per
/// verified user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    /// Generate a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Core State Types
// ═══════════════════════════════════════════════════════════════════════

/// User session issued by the backend.
///
/// The token fields are opaque: they are stored, persisted, and attached
/// to requests, never inspected. At most one live session exists per
/// process, owned by the session watcher and read-shared everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User ID this session belongs to.
    pub user_id: UserId,

    /// Email the session was issued for.
    pub email: String,

    /// Whether the backend has confirmed the email address.
    pub email_confirmed: bool,

    /// Opaque access token.
    pub access_token: String,

    /// Opaque refresh token, when the backend issues one.
    pub refresh_token: Option<String>,

    /// Expiry of the access token, when known.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Credentials held between "sign up" and "verify" steps.
///
/// Created when sign-up is initiated and consumed exactly once: either by
/// a successful verification (the password signs the user in, the username
/// seeds the profile row) or discarded on sign-up failure. Verification
/// without this state fails fast with
/// [`AccountError::MissingRegistrationState`](crate::AccountError::MissingRegistrationState).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSignUp {
    /// Email the OTP was sent to.
    pub email: String,

    /// Password chosen at sign-up, replayed for the post-verify sign-in.
    pub password: String,

    /// Username chosen at sign-up, used to seed the profile row.
    pub username: String,
}

/// Where the account flow currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthPhase {
    /// No user signed in.
    #[default]
    Anonymous,

    /// Sign-up accepted, waiting for the emailed OTP.
    PendingVerification {
        /// Email the verification code was sent to.
        email: String,
    },

    /// Signed in.
    Authenticated {
        /// The live session.
        session: Session,
    },
}

impl AuthPhase {
    /// Returns `true` if no user is signed in.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns `true` while an OTP verification is outstanding.
    #[must_use]
    pub const fn is_pending_verification(&self) -> bool {
        matches!(self, Self::PendingVerification { .. })
    }

    /// Returns `true` once a session is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The current session, if authenticated.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated { session } => Some(session),
            _ => None,
        }
    }

    /// The email awaiting verification, if any.
    #[must_use]
    pub fn pending_email(&self) -> Option<&str> {
        match self {
            Self::PendingVerification { email } => Some(email),
            _ => None,
        }
    }
}

/// Root account state.
///
/// Managed by the account reducer. `restoring` is `true` only until the
/// first auth-change notification after process start, mirroring the
/// backend's session-restoration handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Current phase of the flow.
    pub phase: AuthPhase,

    /// True until the first auth-change notification arrives.
    pub restoring: bool,

    /// Credentials-in-flight between sign-up and verification.
    pub pending: Option<PendingSignUp>,

    /// Seconds until the next OTP resend is allowed. Zero means resend is
    /// available; armed to [`RESEND_COOLDOWN_SECS`] on every successful
    /// send.
    pub resend_cooldown: u32,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            phase: AuthPhase::Anonymous,
            restoring: true,
            pending: None,
            resend_cooldown: 0,
        }
    }
}

/// Returns `true` when `code` is a well-formed verification code: exactly
/// [`OTP_LENGTH`] ASCII digits. Anything else is rejected client-side
/// before any network call.
#[must_use]
pub fn is_valid_otp(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(email: &str) -> Session {
        Session {
            user_id: UserId::new(),
            email: email.to_string(),
            email_confirmed: true,
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_user_id_generation() {
        let id1 = UserId::new();
        let id2 = UserId::new();

        // IDs should be unique
        assert_ne!(id1, id2);
    }

    #[test]
    fn default_state_is_anonymous_and_restoring() {
        let state = AccountState::default();
        assert!(state.phase.is_anonymous());
        assert!(state.restoring);
        assert!(state.pending.is_none());
        assert_eq!(state.resend_cooldown, 0);
    }

    #[test]
    fn phase_accessors() {
        let pending = AuthPhase::PendingVerification {
            email: "a@x.com".to_string(),
        };
        assert!(pending.is_pending_verification());
        assert_eq!(pending.pending_email(), Some("a@x.com"));
        assert!(pending.session().is_none());

        let authed = AuthPhase::Authenticated {
            session: session("a@x.com"),
        };
        assert!(authed.is_authenticated());
        assert_eq!(authed.session().map(|s| s.email.as_str()), Some("a@x.com"));
    }

    #[test]
    fn otp_validation_requires_exactly_six_digits() {
        assert!(is_valid_otp("123456"));
        assert!(is_valid_otp("000000"));
        assert!(!is_valid_otp("12345"));
        assert!(!is_valid_otp("1234567"));
        assert!(!is_valid_otp("12a456"));
        assert!(!is_valid_otp("12 456"));
        assert!(!is_valid_otp(""));
        // Multi-byte input must not panic or pass
        assert!(!is_valid_otp("１２３４５６"));
    }
}
