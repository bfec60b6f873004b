//! Profile store: client-side cache plus the fetch-or-create protocol.
//!
//! Two independent writers can race to create the same profile row: the
//! backend's own sign-up trigger and this client (either right after OTP
//! verification or lazily on first profile read). The store resolves the
//! race with idempotent insert-then-reread, never locking: a duplicate
//! insert is treated as success and the winning row is returned.

use crate::error::{AccountError, Result};
use crate::providers::{Profile, ProfilePatch, ProfileRepository};
use crate::state::UserId;
use tokio::sync::watch;

/// Client-side cache of the signed-in user's profile row.
///
/// Single-writer from the caller's perspective: mutations go through
/// [`ProfileStore::ensure_profile`] and [`ProfileStore::update_profile`],
/// reads through [`ProfileStore::cached`] or a [`watch`] subscription.
#[derive(Debug)]
pub struct ProfileStore<P>
where
    P: ProfileRepository + Clone,
{
    repo: P,
    cache: watch::Sender<Option<Profile>>,
}

impl<P> ProfileStore<P>
where
    P: ProfileRepository + Clone,
{
    /// Create a store over the given repository with an empty cache.
    #[must_use]
    pub fn new(repo: P) -> Self {
        let (cache, _) = watch::channel(None);
        Self { repo, cache }
    }

    /// Fetch the profile row for `user_id`, creating the default row if
    /// none exists yet.
    ///
    /// Safe to call redundantly and concurrently: if the insert loses the
    /// race (backend trigger, or another call site), the duplicate-key
    /// rejection is treated as success and the winning row is re-read and
    /// returned.
    ///
    /// The default row derives its username from the email's local part
    /// and starts all counters at zero.
    ///
    /// # Errors
    ///
    /// Propagates any repository failure other than the duplicate-insert
    /// conflict, which is recovered internally.
    pub async fn ensure_profile(&self, user_id: UserId, email: &str) -> Result<Profile> {
        if let Some(existing) = self.repo.find_by_id(user_id).await? {
            self.publish(existing.clone());
            return Ok(existing);
        }

        let fresh = Profile::seeded(user_id, email, None);

        match self.repo.insert(&fresh).await {
            Ok(inserted) => {
                self.publish(inserted.clone());
                Ok(inserted)
            }
            Err(error) if error.is_conflict() => {
                // Lost the creation race; the winner's row is the row.
                tracing::debug!(%user_id, "Profile insert lost the race, re-reading");
                let winner = self
                    .repo
                    .find_by_id(user_id)
                    .await?
                    .ok_or(AccountError::ProfileNotFound)?;
                self.publish(winner.clone());
                Ok(winner)
            }
            Err(error) => Err(error),
        }
    }

    /// Apply a partial update, then merge it into the cached copy.
    ///
    /// The merge is optimistic and deliberately does not reconcile the
    /// counter fields with concurrent server-side updates; callers that
    /// need fresh counters re-fetch via [`ProfileStore::ensure_profile`].
    ///
    /// # Errors
    ///
    /// Propagates the repository failure; the cache is untouched on error.
    pub async fn update_profile(&self, user_id: UserId, patch: &ProfilePatch) -> Result<Profile> {
        let updated = self.repo.update(user_id, patch).await?;

        self.cache.send_modify(|cached| match cached {
            Some(profile) if profile.id == user_id => {
                profile.apply(patch);
                profile.updated_at = updated.updated_at;
            }
            _ => *cached = Some(updated.clone()),
        });

        Ok(updated)
    }

    /// The cached profile, if one has been loaded.
    #[must_use]
    pub fn cached(&self) -> Option<Profile> {
        self.cache.borrow().clone()
    }

    /// Subscribe to cache changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Profile>> {
        self.cache.subscribe()
    }

    /// Drop the cached profile (e.g. on sign-out).
    pub fn invalidate(&self) {
        let _ = self.cache.send(None);
    }

    fn publish(&self, profile: Profile) {
        let _ = self.cache.send(Some(profile));
    }
}
