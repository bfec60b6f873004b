//! Account environment.
//!
//! This module defines the environment type for dependency injection in
//! account reducers.

use crate::providers::{AuthGateway, ProfileRepository};

/// Account environment.
///
/// Contains the external collaborators the account reducers need. Both
/// are cheap to clone (implementations hold their state behind `Arc`s),
/// which lets effects move owned copies into spawned futures.
///
/// # Type Parameters
///
/// - `G`: Auth gateway
/// - `P`: Profile repository
#[derive(Debug, Clone)]
pub struct AccountEnvironment<G, P>
where
    G: AuthGateway + Clone,
    P: ProfileRepository + Clone,
{
    /// Auth gateway (hosted backend's auth surface).
    pub gateway: G,

    /// Profile repository (hosted backend's row API).
    pub profiles: P,
}

impl<G, P> AccountEnvironment<G, P>
where
    G: AuthGateway + Clone,
    P: ProfileRepository + Clone,
{
    /// Create a new account environment.
    #[must_use]
    pub const fn new(gateway: G, profiles: P) -> Self {
        Self { gateway, profiles }
    }
}
