//! Session reducer: sign-in, sign-out, pushed session changes.
//!
//! # Invariants
//!
//! - Declined credentials are an expected user-facing outcome and are
//!   never logged at error severity
//! - A failed sign-out leaves the session intact; there is no optimistic
//!   clear
//! - The first pushed session change clears the restoring flag
//! - A `None` push during `PendingVerification` does not cancel the
//!   pending flow; sign-up has not created a session yet

use crate::actions::AccountAction;
use crate::environment::AccountEnvironment;
use crate::providers::{AuthGateway, ProfileRepository};
use crate::state::{AccountState, AuthPhase};
use shortloop_core::effect::Effect;
use shortloop_core::reducer::Reducer;
use shortloop_core::{smallvec, SmallVec};

use super::feedback;
use crate::error::AccountError;

/// Session reducer.
///
/// Handles credential sign-in, sign-out, and the backend's pushed
/// auth-change notifications.
#[derive(Debug, Clone)]
pub struct SessionReducer<G, P> {
    /// Phantom data to hold type parameters.
    _phantom: std::marker::PhantomData<(G, P)>,
}

impl<G, P> SessionReducer<G, P> {
    /// Create a new session reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<G, P> Default for SessionReducer<G, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G, P> Reducer for SessionReducer<G, P>
where
    G: AuthGateway + Clone + 'static,
    P: ProfileRepository + Clone + 'static,
{
    type State = AccountState;
    type Action = AccountAction;
    type Environment = AccountEnvironment<G, P>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // SignIn: direct credential sign-in
            // ═══════════════════════════════════════════════════════════════
            AccountAction::SignIn {
                correlation_id,
                email,
                password,
            } => {
                if email.trim().is_empty() {
                    return feedback(AccountAction::SignInFailed {
                        correlation_id,
                        error: AccountError::MissingEmail,
                    });
                }
                if password.is_empty() {
                    return feedback(AccountAction::SignInFailed {
                        correlation_id,
                        error: AccountError::MissingPassword,
                    });
                }

                let gateway = env.gateway.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    match gateway.sign_in_with_password(&email, &password).await {
                        Ok(session) => Some(AccountAction::SignedIn {
                            correlation_id,
                            session,
                        }),
                        Err(error) => Some(AccountAction::SignInFailed {
                            correlation_id,
                            error,
                        }),
                    }
                }))]
            }

            AccountAction::SignedIn { session, .. } => {
                state.restoring = false;
                state.phase = AuthPhase::Authenticated { session };

                smallvec![Effect::None]
            }

            AccountAction::SignInFailed { ref error, .. } => {
                // Bad credentials are an expected outcome, not a system
                // error.
                if error.is_user_error() {
                    tracing::debug!(%error, "Sign-in declined");
                } else {
                    tracing::error!(%error, "Sign-in failed");
                }

                smallvec![Effect::None]
            }

            // ═══════════════════════════════════════════════════════════════
            // SignOut: revoke, keeping the session on failure
            // ═══════════════════════════════════════════════════════════════
            AccountAction::SignOut { correlation_id } => {
                let gateway = env.gateway.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    match gateway.sign_out().await {
                        Ok(()) => Some(AccountAction::SignedOut { correlation_id }),
                        Err(error) => Some(AccountAction::SignOutFailed {
                            correlation_id,
                            error,
                        }),
                    }
                }))]
            }

            AccountAction::SignedOut { .. } => {
                state.phase = AuthPhase::Anonymous;

                smallvec![Effect::None]
            }

            AccountAction::SignOutFailed { ref error, .. } => {
                // Session stays intact until the backend confirms the
                // revocation.
                tracing::error!(%error, "Sign-out failed, session kept");

                smallvec![Effect::None]
            }

            // ═══════════════════════════════════════════════════════════════
            // SessionChanged: pushed from the backend's auth-change stream
            // ═══════════════════════════════════════════════════════════════
            AccountAction::SessionChanged { session } => {
                state.restoring = false;

                match session {
                    Some(session) => {
                        state.phase = AuthPhase::Authenticated { session };
                    }
                    None => {
                        if !state.phase.is_pending_verification() {
                            state.phase = AuthPhase::Anonymous;
                        }
                    }
                }

                smallvec![Effect::None]
            }

            // Other actions are not handled by this reducer
            _ => smallvec![Effect::None],
        }
    }
}
