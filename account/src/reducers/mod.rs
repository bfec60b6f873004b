//! Account reducers.
//!
//! This module contains pure reducer functions for the account flow.
//!
//! Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.

pub mod registration;
pub mod session;

use crate::actions::AccountAction;
use crate::environment::AccountEnvironment;
use crate::providers::{AuthGateway, ProfileRepository};
use crate::state::AccountState;
use shortloop_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};

// Re-export
pub use registration::RegistrationReducer;
pub use session::SessionReducer;

/// Wrap an already-decided event as an immediately-completing effect.
///
/// Used for failures decided client-side (validation, throttling, missing
/// flow state): the event still travels through the effect feedback loop
/// so callers waiting on the action broadcast observe it, but no network
/// call is ever made.
pub(crate) fn feedback<A: Send + 'static>(action: A) -> SmallVec<[Effect<A>; 4]> {
    smallvec![Effect::Future(Box::pin(async move { Some(action) }))]
}

/// Unified account reducer.
///
/// Combines the registration flow (sign-up, verification, resend) and the
/// session flow (sign-in, sign-out, pushed session changes) into a single
/// reducer. Routes actions to the appropriate sub-reducer by action type.
#[derive(Clone, Debug)]
pub struct AccountReducer<G, P>
where
    G: AuthGateway + Clone + 'static,
    P: ProfileRepository + Clone + 'static,
{
    registration: RegistrationReducer<G, P>,
    session: SessionReducer<G, P>,
}

impl<G, P> AccountReducer<G, P>
where
    G: AuthGateway + Clone + 'static,
    P: ProfileRepository + Clone + 'static,
{
    /// Create a new unified account reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registration: RegistrationReducer::new(),
            session: SessionReducer::new(),
        }
    }
}

impl<G, P> Default for AccountReducer<G, P>
where
    G: AuthGateway + Clone + 'static,
    P: ProfileRepository + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<G, P> Reducer for AccountReducer<G, P>
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
            // Registration flow
            AccountAction::SignUp { .. }
            | AccountAction::SignUpAccepted { .. }
            | AccountAction::SignUpFailed { .. }
            | AccountAction::VerifyOtp { .. }
            | AccountAction::OtpAccepted { .. }
            | AccountAction::VerifyFailed { .. }
            | AccountAction::ResendOtp { .. }
            | AccountAction::ResendAccepted { .. }
            | AccountAction::ResendFailed { .. }
            | AccountAction::CooldownTick => self.registration.reduce(state, action, env),

            // Session flow
            AccountAction::SignIn { .. }
            | AccountAction::SignedIn { .. }
            | AccountAction::SignInFailed { .. }
            | AccountAction::SignOut { .. }
            | AccountAction::SignedOut { .. }
            | AccountAction::SignOutFailed { .. }
            | AccountAction::SessionChanged { .. } => self.session.reduce(state, action, env),
        }
    }
}
