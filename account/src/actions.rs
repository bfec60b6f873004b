//! Account actions.
//!
//! This module defines all possible inputs to the account reducer:
//! **commands** (user intent from screens) and **events** (results of
//! async backend calls, fed back by the effect executor).

use crate::error::AccountError;
use crate::state::Session;
use serde::{Deserialize, Serialize};

/// Account action.
///
/// Actions are the **only** way to communicate with the account flow.
/// The reducer is a pure function: `(State, Action, Env) → (State, Effects)`.
///
/// Commands carry a `correlation_id` so callers can wait for the matching
/// terminal event among concurrent requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccountAction {
    // ═══════════════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════════════
    /// Start a new registration.
    ///
    /// # Flow
    ///
    /// 1. Client-side validation of the three fields
    /// 2. Best-effort "email already registered" pre-check (UX hint only)
    /// 3. Backend sign-up with the username as pending metadata
    /// 4. Backend dispatches the OTP email out-of-band
    SignUp {
        /// Correlation ID for matching the terminal event.
        correlation_id: uuid::Uuid,

        /// Email to register.
        email: String,

        /// Chosen password.
        password: String,

        /// Chosen username, seeds the profile row after verification.
        username: String,
    },

    /// Submit the emailed verification code.
    ///
    /// Requires credentials-in-flight from a prior `SignUp`; fails fast
    /// with `MissingRegistrationState` otherwise, without any network call.
    VerifyOtp {
        /// Correlation ID for matching the terminal event.
        correlation_id: uuid::Uuid,

        /// The 6-digit code as typed.
        code: String,
    },

    /// Request a fresh verification code.
    ///
    /// Gated by the local resend cooldown; throttled attempts fail without
    /// touching the network and without resetting the countdown.
    ResendOtp {
        /// Correlation ID for matching the terminal event.
        correlation_id: uuid::Uuid,
    },

    /// Sign in with existing credentials.
    SignIn {
        /// Correlation ID for matching the terminal event.
        correlation_id: uuid::Uuid,

        /// Account email.
        email: String,

        /// Account password.
        password: String,
    },

    /// Revoke the current session.
    SignOut {
        /// Correlation ID for matching the terminal event.
        correlation_id: uuid::Uuid,
    },

    /// Session pushed from the backend's auth-change stream.
    ///
    /// Fired at least once after startup with the restored session or
    /// `None`, then on every subsequent change.
    SessionChanged {
        /// The new session, or `None` when signed out / nothing restored.
        session: Option<Session>,
    },

    /// One-second countdown tick for the resend cooldown.
    ///
    /// Self-rescheduling while a verification is pending and the countdown
    /// is above zero; the chain dies when the phase moves on.
    CooldownTick,

    // ═══════════════════════════════════════════════════════════════════
    // Events (produced by effects)
    // ═══════════════════════════════════════════════════════════════════
    /// Backend accepted the sign-up; an OTP email is on its way.
    SignUpAccepted {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,

        /// Email the OTP was sent to.
        email: String,
    },

    /// Sign-up failed (pre-check hit or backend rejection).
    SignUpFailed {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,

        /// What went wrong.
        error: AccountError,
    },

    /// Verification completed: code accepted, signed in, profile seeded
    /// (or seeding deferred to the lazy fetch-or-create path).
    OtpAccepted {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,

        /// The session from the post-verification sign-in.
        session: Session,
    },

    /// Verification failed.
    VerifyFailed {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,

        /// What went wrong.
        error: AccountError,
    },

    /// Backend accepted the resend request.
    ResendAccepted {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,
    },

    /// Resend failed (local throttle or backend rate limit).
    ResendFailed {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,

        /// What went wrong.
        error: AccountError,
    },

    /// Sign-in succeeded.
    SignedIn {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,

        /// The new session.
        session: Session,
    },

    /// Sign-in failed.
    SignInFailed {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,

        /// What went wrong.
        error: AccountError,
    },

    /// Sign-out succeeded; the session is gone.
    SignedOut {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,
    },

    /// Sign-out failed; the session is left intact.
    SignOutFailed {
        /// Correlation ID of the originating command.
        correlation_id: uuid::Uuid,

        /// What went wrong.
        error: AccountError,
    },
}
