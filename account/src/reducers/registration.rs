//! Registration reducer: sign-up, OTP verification, resend.
//!
//! # Flow
//!
//! 1. User signs up with email, password, and chosen username
//! 2. Best-effort check that no profile row already has that email
//! 3. Backend registers the account and emails a 6-digit code
//! 4. Credentials stay in flight while the user types the code
//! 5. On verification: explicit sign-in with the cached password, then
//!    profile-row seeding with the cached username
//! 6. Resends are gated by a 60-second countdown ticking in state
//!
//! # Invariants
//!
//! - Verification never proceeds without credentials-in-flight; their
//!   absence is a flow bug surfaced as `MissingRegistrationState`
//! - Credentials-in-flight are cleared exactly once: on reaching
//!   `Authenticated`, or when the sign-up itself fails
//! - A profile-seeding failure never fails the verification transition;
//!   the row is created lazily on first profile read instead
//! - The cooldown tick chain dies as soon as the phase leaves
//!   `PendingVerification`

use crate::actions::AccountAction;
use crate::environment::AccountEnvironment;
use crate::error::AccountError;
use crate::providers::{AuthGateway, NewAccount, Profile, ProfileRepository};
use crate::state::{is_valid_otp, AccountState, AuthPhase, PendingSignUp, RESEND_COOLDOWN_SECS};
use shortloop_core::effect::Effect;
use shortloop_core::reducer::Reducer;
use shortloop_core::{smallvec, SmallVec};
use std::time::Duration;

use super::feedback;

/// Registration reducer.
///
/// Handles the sign-up → verify → resend portion of the account flow.
#[derive(Debug, Clone)]
pub struct RegistrationReducer<G, P> {
    /// Phantom data to hold type parameters.
    _phantom: std::marker::PhantomData<(G, P)>,
}

impl<G, P> RegistrationReducer<G, P> {
    /// Create a new registration reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<G, P> Default for RegistrationReducer<G, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G, P> Reducer for RegistrationReducer<G, P>
where
    G: AuthGateway + Clone + 'static,
    P: ProfileRepository + Clone + 'static,
{
    type State = AccountState;
    type Action = AccountAction;
    type Environment = AccountEnvironment<G, P>;

    #[allow(clippy::too_many_lines)] // One arm per transition
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // SignUp: validate, pre-check email, register
            // ═══════════════════════════════════════════════════════════════
            AccountAction::SignUp {
                correlation_id,
                email,
                password,
                username,
            } => {
                if email.trim().is_empty() {
                    return feedback(AccountAction::SignUpFailed {
                        correlation_id,
                        error: AccountError::MissingEmail,
                    });
                }
                if password.is_empty() {
                    return feedback(AccountAction::SignUpFailed {
                        correlation_id,
                        error: AccountError::MissingPassword,
                    });
                }
                if username.trim().is_empty() {
                    return feedback(AccountAction::SignUpFailed {
                        correlation_id,
                        error: AccountError::MissingUsername,
                    });
                }

                // Credentials-in-flight; consumed by verification or
                // discarded on failure.
                state.pending = Some(PendingSignUp {
                    email: email.clone(),
                    password: password.clone(),
                    username: username.clone(),
                });

                let gateway = env.gateway.clone();
                let profiles = env.profiles.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    // UX hint only: the backend's unique constraint is the
                    // real authority, and this read races against it.
                    match profiles.find_by_email(&email).await {
                        Ok(Some(_)) => {
                            return Some(AccountAction::SignUpFailed {
                                correlation_id,
                                error: AccountError::EmailAlreadyRegistered,
                            });
                        }
                        Ok(None) => {}
                        Err(error) => {
                            tracing::warn!(%error, "Email pre-check failed, continuing with sign-up");
                        }
                    }

                    let account = NewAccount {
                        email: email.clone(),
                        password,
                        username,
                    };

                    match gateway.sign_up(&account).await {
                        Ok(_user) => Some(AccountAction::SignUpAccepted {
                            correlation_id,
                            email,
                        }),
                        Err(error) => Some(AccountAction::SignUpFailed {
                            correlation_id,
                            error,
                        }),
                    }
                }))]
            }

            // ═══════════════════════════════════════════════════════════════
            // SignUpAccepted: await the emailed code, arm the cooldown
            // ═══════════════════════════════════════════════════════════════
            AccountAction::SignUpAccepted { email, .. } => {
                state.phase = AuthPhase::PendingVerification { email };
                state.resend_cooldown = RESEND_COOLDOWN_SECS;

                smallvec![Effect::delayed(
                    Duration::from_secs(1),
                    AccountAction::CooldownTick,
                )]
            }

            AccountAction::SignUpFailed { ref error, .. } => {
                state.pending = None;

                if error.is_user_error() {
                    tracing::debug!(%error, "Sign-up declined");
                } else {
                    tracing::error!(%error, "Sign-up failed");
                }

                smallvec![Effect::None]
            }

            // ═══════════════════════════════════════════════════════════════
            // VerifyOtp: gate the code, then verify / sign in / seed profile
            // ═══════════════════════════════════════════════════════════════
            AccountAction::VerifyOtp {
                correlation_id,
                code,
            } => {
                if !is_valid_otp(&code) {
                    return feedback(AccountAction::VerifyFailed {
                        correlation_id,
                        error: AccountError::MalformedOtp,
                    });
                }

                let Some(pending) = state.pending.clone() else {
                    tracing::warn!("VerifyOtp without prior SignUp");
                    return feedback(AccountAction::VerifyFailed {
                        correlation_id,
                        error: AccountError::MissingRegistrationState,
                    });
                };

                let gateway = env.gateway.clone();
                let profiles = env.profiles.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    let user = match gateway.verify_otp(&pending.email, &code).await {
                        Ok(user) => user,
                        Err(error) => {
                            return Some(AccountAction::VerifyFailed {
                                correlation_id,
                                error,
                            });
                        }
                    };

                    // Verification alone does not guarantee an active
                    // session in every backend configuration; sign in
                    // explicitly with the cached password.
                    let session = match gateway
                        .sign_in_with_password(&pending.email, &pending.password)
                        .await
                    {
                        Ok(session) => session,
                        Err(error) => {
                            return Some(AccountAction::VerifyFailed {
                                correlation_id,
                                error,
                            });
                        }
                    };

                    // Seed the profile row. The backend trigger may have
                    // already inserted it; the user is verified and signed
                    // in either way, so failures here defer to the lazy
                    // fetch-or-create path.
                    let row =
                        Profile::seeded(user.user_id, &pending.email, Some(&pending.username));
                    match profiles.insert(&row).await {
                        Ok(_) => {}
                        Err(error) if error.is_conflict() => {
                            tracing::debug!(user_id = %user.user_id, "Profile row already present");
                        }
                        Err(error) => {
                            tracing::warn!(
                                %error,
                                user_id = %user.user_id,
                                "Profile seeding failed, deferring to first profile read",
                            );
                        }
                    }

                    Some(AccountAction::OtpAccepted {
                        correlation_id,
                        session,
                    })
                }))]
            }

            AccountAction::OtpAccepted { session, .. } => {
                // Credentials-in-flight consumed; cleared unconditionally.
                state.pending = None;
                state.resend_cooldown = 0;
                state.restoring = false;
                state.phase = AuthPhase::Authenticated { session };

                smallvec![Effect::None]
            }

            AccountAction::VerifyFailed { ref error, .. } => {
                // Credentials stay in flight so the user can retry or
                // request a fresh code.
                if error.is_user_error() {
                    tracing::debug!(%error, "Verification declined");
                } else if matches!(error, AccountError::MissingRegistrationState) {
                    tracing::warn!("Verification attempted without registration state");
                } else {
                    tracing::error!(%error, "Verification failed");
                }

                smallvec![Effect::None]
            }

            // ═══════════════════════════════════════════════════════════════
            // ResendOtp: throttled locally before the backend sees it
            // ═══════════════════════════════════════════════════════════════
            AccountAction::ResendOtp { correlation_id } => {
                let Some(pending) = state.pending.as_ref() else {
                    tracing::warn!("ResendOtp without prior SignUp");
                    return feedback(AccountAction::ResendFailed {
                        correlation_id,
                        error: AccountError::MissingRegistrationState,
                    });
                };

                if state.resend_cooldown > 0 {
                    return feedback(AccountAction::ResendFailed {
                        correlation_id,
                        error: AccountError::ResendThrottled {
                            seconds_remaining: state.resend_cooldown,
                        },
                    });
                }

                let email = pending.email.clone();
                let gateway = env.gateway.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    match gateway.resend_signup_otp(&email).await {
                        Ok(()) => Some(AccountAction::ResendAccepted { correlation_id }),
                        Err(error) => Some(AccountAction::ResendFailed {
                            correlation_id,
                            error,
                        }),
                    }
                }))]
            }

            AccountAction::ResendAccepted { .. } => {
                state.resend_cooldown = RESEND_COOLDOWN_SECS;

                smallvec![Effect::delayed(
                    Duration::from_secs(1),
                    AccountAction::CooldownTick,
                )]
            }

            AccountAction::ResendFailed { ref error, .. } => {
                if error.is_throttle() || error.is_user_error() {
                    tracing::debug!(%error, "Resend declined");
                } else {
                    tracing::error!(%error, "Resend failed");
                }

                smallvec![Effect::None]
            }

            // ═══════════════════════════════════════════════════════════════
            // CooldownTick: one-second countdown, alive only while pending
            // ═══════════════════════════════════════════════════════════════
            AccountAction::CooldownTick => {
                if state.phase.is_pending_verification() && state.resend_cooldown > 0 {
                    state.resend_cooldown -= 1;
                    if state.resend_cooldown > 0 {
                        return smallvec![Effect::delayed(
                            Duration::from_secs(1),
                            AccountAction::CooldownTick,
                        )];
                    }
                }

                smallvec![Effect::None]
            }

            // Other actions are not handled by this reducer
            _ => smallvec![Effect::None],
        }
    }
}
