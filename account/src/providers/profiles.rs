//! Profile repository trait.

use crate::error::Result;
use crate::state::UserId;
use super::{Profile, ProfilePatch};

/// Profile repository.
///
/// This trait abstracts over the hosted backend's profile row API. The
/// table carries a unique constraint on `id`; an insert that loses a
/// creation race must be distinguishable as
/// [`AccountError::ProfileConflict`](crate::AccountError::ProfileConflict)
/// so callers can treat it as success and re-read.
pub trait ProfileRepository: Send + Sync {
    /// Read a profile by user id.
    ///
    /// Returns `None` when no row exists (that is the signal for the
    /// fetch-or-create path, not an error).
    ///
    /// # Errors
    ///
    /// Returns error if the backend query fails.
    fn find_by_id(
        &self,
        id: UserId,
    ) -> impl std::future::Future<Output = Result<Option<Profile>>> + Send;

    /// Read a profile by email.
    ///
    /// Used only by the best-effort pre-signup check; racy by nature and
    /// never authoritative.
    ///
    /// # Errors
    ///
    /// Returns error if the backend query fails.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<Profile>>> + Send;

    /// Insert a new profile row.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - A row with this id already exists → `AccountError::ProfileConflict`
    /// - The backend query fails otherwise → `AccountError::Backend`
    fn insert(
        &self,
        profile: &Profile,
    ) -> impl std::future::Future<Output = Result<Profile>> + Send;

    /// Partially update a profile row, returning the updated row.
    ///
    /// Unset patch fields are preserved.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No row with this id → `AccountError::ProfileNotFound`
    /// - The backend query fails otherwise
    fn update(
        &self,
        id: UserId,
        patch: &ProfilePatch,
    ) -> impl std::future::Future<Output = Result<Profile>> + Send;
}
