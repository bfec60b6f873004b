//! # Shortloop Account
//!
//! Authentication, session, and profile bootstrap core for the shortloop
//! client.
//!
//! This crate owns the sign-up → verify → sign-in lifecycle against a
//! hosted backend: sign-up with deferred profile creation, OTP email
//! verification with resend throttling, session restoration at process
//! start, and idempotent profile-row bootstrap that tolerates losing the
//! creation race against the backend's own trigger.
//!
//! ## Architecture
//!
//! The flow is implemented as reducers and effects:
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! Screens talk to [`AccountClient`], which dispatches commands into a
//! [`shortloop_runtime::Store`] and waits for the matching terminal event.
//! All backend access goes through the provider traits in [`providers`],
//! so the whole flow runs at memory speed under test.
//!
//! ## Example: sign-up and verification
//!
//! ```rust,ignore
//! use shortloop_account::AccountClient;
//!
//! let client = AccountClient::connect(gateway, profiles).await?;
//! client.sign_up("a@x.com", "p1", "alice").await?;
//! // user types the 6-digit code from their inbox
//! client.verify_otp("123456").await?;
//! let profile = client.ensure_profile().await?;
//! assert_eq!(profile.username, "alice");
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod client;
pub mod config;
pub mod environment;
pub mod error;
pub mod profile_store;
pub mod providers;
pub mod reducers;
pub mod session_watch;
pub mod state;

#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use actions::AccountAction;
pub use client::AccountClient;
pub use config::AccountConfig;
pub use environment::AccountEnvironment;
pub use error::{AccountError, Result};
pub use profile_store::ProfileStore;
pub use providers::{AuthUser, NewAccount, Profile, ProfilePatch};
pub use reducers::AccountReducer;
pub use session_watch::{SessionSnapshot, SessionWatcher};
pub use state::{AccountState, AuthPhase, PendingSignUp, Session, UserId};
