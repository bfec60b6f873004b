//! Backend providers.
//!
//! This module defines traits for the hosted-backend collaborators the
//! account flow consumes. These traits enable dependency injection and
//! make the flow testable.
//!
//! # Architecture
//!
//! Providers are **interfaces**, not implementations. The reducers and
//! stores depend on these traits; the application wires in concrete
//! implementations:
//!
//! - **Production**: [`rest::RestGateway`] against the hosted platform
//! - **Testing**: the in-memory mocks behind the `test-utils` feature

use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod gateway;
pub mod profiles;
pub mod rest;
pub mod storage;

// Re-export provider traits
pub use gateway::AuthGateway;
pub use profiles::ProfileRepository;
pub use rest::RestGateway;
pub use storage::{MemoryStorage, SessionStorage};

/// Auth-side view of a user, as returned by sign-up and verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Backend-issued user ID.
    pub user_id: UserId,

    /// Email address.
    pub email: String,

    /// Whether the email has been confirmed.
    pub email_confirmed: bool,
}

/// Registration request: credentials plus the username carried as pending
/// user metadata until the profile row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    /// Email to register.
    pub email: String,

    /// Chosen password.
    pub password: String,

    /// Chosen username (pending metadata, later the profile row seed).
    pub username: String,
}

/// The per-user profile row.
///
/// Keyed by user id (`id` *is* the user id, not a separate generated key);
/// exactly one row exists per verified user. Counters are maintained by
/// other parts of the system and only read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// User id, the row key.
    pub id: UserId,

    /// Account email (used by the best-effort pre-signup check).
    pub email: String,

    /// Display username.
    pub username: String,

    /// Full name, when set.
    pub full_name: Option<String>,

    /// Bio, when set.
    pub bio: Option<String>,

    /// Avatar URL, when set.
    pub avatar_url: Option<String>,

    /// Follower count (maintained elsewhere).
    pub followers_count: i64,

    /// Following count (maintained elsewhere).
    pub following_count: i64,

    /// Total likes received (maintained elsewhere).
    pub likes_count: i64,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Build the default row inserted when no profile exists yet: the
    /// given username (or the email's local part when absent), all
    /// counters zero, display fields unset.
    #[must_use]
    pub fn seeded(id: UserId, email: &str, username: Option<&str>) -> Self {
        let username = match username {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => username_from_email(email),
        };

        Self {
            id,
            email: email.to_string(),
            username,
            full_name: None,
            bio: None,
            avatar_url: None,
            followers_count: 0,
            following_count: 0,
            likes_count: 0,
            updated_at: Utc::now(),
        }
    }

    /// Merge a patch into this profile, leaving unset fields untouched.
    ///
    /// Counters are deliberately not part of a patch; they belong to the
    /// backend.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(username) = &patch.username {
            self.username = username.clone();
        }
        if let Some(full_name) = &patch.full_name {
            self.full_name = Some(full_name.clone());
        }
        if let Some(bio) = &patch.bio {
            self.bio = Some(bio.clone());
        }
        if let Some(avatar_url) = &patch.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
    }
}

/// Partial profile update; `None` fields are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    /// New username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// New full name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    /// New bio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    /// New avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfilePatch {
    /// Returns `true` when no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.full_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
    }
}

/// Derive a default username from the email's local part.
#[must_use]
pub fn username_from_email(email: &str) -> String {
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => "user".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_profile_uses_given_username() {
        let id = UserId::new();
        let profile = Profile::seeded(id, "a@x.com", Some("alice"));

        assert_eq!(profile.id, id);
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.followers_count, 0);
        assert_eq!(profile.following_count, 0);
        assert_eq!(profile.likes_count, 0);
        assert!(profile.bio.is_none());
    }

    #[test]
    fn seeded_profile_falls_back_to_email_local_part() {
        let profile = Profile::seeded(UserId::new(), "carol@example.com", None);
        assert_eq!(profile.username, "carol");

        // Degenerate email still yields a usable name
        let odd = Profile::seeded(UserId::new(), "@example.com", None);
        assert_eq!(odd.username, "user");
    }

    #[test]
    fn apply_patch_preserves_unset_fields() {
        let mut profile = Profile::seeded(UserId::new(), "a@x.com", Some("alice"));
        profile.bio = Some("old bio".to_string());

        profile.apply(&ProfilePatch {
            full_name: Some("Alice".to_string()),
            ..ProfilePatch::default()
        });

        assert_eq!(profile.username, "alice");
        assert_eq!(profile.full_name.as_deref(), Some("Alice"));
        assert_eq!(profile.bio.as_deref(), Some("old bio"));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(ProfilePatch::default().is_empty());
        assert!(!ProfilePatch {
            bio: Some("hi".to_string()),
            ..ProfilePatch::default()
        }
        .is_empty());
    }
}
