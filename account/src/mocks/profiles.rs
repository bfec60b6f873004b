//! Mock profile repository for testing.

use crate::error::{AccountError, Result};
use crate::providers::{Profile, ProfilePatch, ProfileRepository};
use crate::state::UserId;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<UserId, Profile>,
    find_error: Option<AccountError>,
    insert_error: Option<AccountError>,
    update_error: Option<AccountError>,
    miss_next_find: bool,
    find_calls: usize,
    insert_calls: usize,
}

/// Mock profile repository.
///
/// Uses in-memory storage with the same unique-id semantics as the real
/// row API: a duplicate insert is rejected with `ProfileConflict`, and
/// the check-and-insert is atomic, so concurrent creators race exactly
/// the way the backend makes them.
#[derive(Debug, Clone, Default)]
pub struct MockProfileRepository {
    inner: Arc<Mutex<Inner>>,
}

impl MockProfileRepository {
    /// Create an empty mock repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AccountError::Backend("mock lock poisoned".to_string()))
    }

    /// Pre-insert a row, as the backend trigger would.
    pub fn seed_row(&self, profile: Profile) {
        if let Ok(mut inner) = self.lock() {
            inner.rows.insert(profile.id, profile);
        }
    }

    /// Fail the next read with `error`.
    pub fn fail_next_find(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.find_error = Some(error);
        }
    }

    /// Make the next read miss even if a row exists.
    ///
    /// Reproduces the lost creation race deterministically: the reader
    /// sees no row, inserts, and collides with a row created in between.
    pub fn miss_next_find(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.miss_next_find = true;
        }
    }

    /// Fail the next insert with `error`.
    pub fn fail_next_insert(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.insert_error = Some(error);
        }
    }

    /// Fail the next update with `error`.
    pub fn fail_next_update(&self, error: AccountError) {
        if let Ok(mut inner) = self.lock() {
            inner.update_error = Some(error);
        }
    }

    /// Number of stored rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.lock().map(|i| i.rows.len()).unwrap_or(0)
    }

    /// A stored row by id.
    #[must_use]
    pub fn row(&self, id: UserId) -> Option<Profile> {
        self.lock().ok().and_then(|i| i.rows.get(&id).cloned())
    }

    /// Number of reads that reached the repository.
    #[must_use]
    pub fn find_calls(&self) -> usize {
        self.lock().map(|i| i.find_calls).unwrap_or(0)
    }

    /// Number of inserts that reached the repository.
    #[must_use]
    pub fn insert_calls(&self) -> usize {
        self.lock().map(|i| i.insert_calls).unwrap_or(0)
    }
}

impl ProfileRepository for MockProfileRepository {
    fn find_by_id(&self, id: UserId) -> impl Future<Output = Result<Option<Profile>>> + Send {
        let this = self.clone();

        async move {
            let mut inner = this.lock()?;
            inner.find_calls += 1;

            if let Some(error) = inner.find_error.take() {
                return Err(error);
            }

            if inner.miss_next_find {
                inner.miss_next_find = false;
                return Ok(None);
            }

            Ok(inner.rows.get(&id).cloned())
        }
    }

    fn find_by_email(&self, email: &str) -> impl Future<Output = Result<Option<Profile>>> + Send {
        let this = self.clone();
        let email = email.to_string();

        async move {
            let mut inner = this.lock()?;
            inner.find_calls += 1;

            if let Some(error) = inner.find_error.take() {
                return Err(error);
            }

            Ok(inner.rows.values().find(|p| p.email == email).cloned())
        }
    }

    fn insert(&self, profile: &Profile) -> impl Future<Output = Result<Profile>> + Send {
        let this = self.clone();
        let profile = profile.clone();

        async move {
            let mut inner = this.lock()?;
            inner.insert_calls += 1;

            if let Some(error) = inner.insert_error.take() {
                return Err(error);
            }

            // Check-and-insert under one lock: the unique constraint.
            if inner.rows.contains_key(&profile.id) {
                return Err(AccountError::ProfileConflict);
            }

            inner.rows.insert(profile.id, profile.clone());

            Ok(profile)
        }
    }

    fn update(
        &self,
        id: UserId,
        patch: &ProfilePatch,
    ) -> impl Future<Output = Result<Profile>> + Send {
        let this = self.clone();
        let patch = patch.clone();

        async move {
            let mut inner = this.lock()?;

            if let Some(error) = inner.update_error.take() {
                return Err(error);
            }

            let Some(row) = inner.rows.get_mut(&id) else {
                return Err(AccountError::ProfileNotFound);
            };

            row.apply(&patch);
            row.updated_at = Utc::now();

            Ok(row.clone())
        }
    }
}
