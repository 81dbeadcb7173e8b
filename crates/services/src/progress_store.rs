use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use progress_core::model::{CompletionKind, ItemId, Progress, UserId};
use progress_core::rules::{CompletionOutcome, apply_completion, merge_snapshots};
use storage::repository::{LocalCache, ProgressRepository, StorageError};
use tracing::{debug, info, warn};

use crate::error::ProgressStoreError;

/// Cache key under which a user's snapshot is stored locally.
#[must_use]
pub fn cache_key(user_id: &UserId) -> String {
    format!("progress_{user_id}")
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of the store for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready(Progress),
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

/// Client-side progress holder backed by a local cache and a remote store.
///
/// Reads prefer the local cache: once a user's entry exists there the remote
/// store is not consulted. Writes go to the cache first and then to the
/// remote store; remote failures are logged and the cache stays the source of
/// truth for the session. Completion events are applied to the in-memory
/// snapshot before any I/O, so `snapshot()` reflects them immediately.
///
/// Writes are serialized by `writer` and always carry the snapshot current
/// at the time of the write, so a slow save never lands on top of a newer one.
pub struct ProgressStore {
    remote: Arc<dyn ProgressRepository>,
    cache: Arc<dyn LocalCache>,
    state: Mutex<LoadState>,
    writer: tokio::sync::Mutex<()>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(remote: Arc<dyn ProgressRepository>, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            remote,
            cache,
            state: Mutex::new(LoadState::Unloaded),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> LoadState {
        self.lock_state().clone()
    }

    /// Current in-memory snapshot, if loaded.
    #[must_use]
    pub fn snapshot(&self) -> Option<Progress> {
        match &*self.lock_state() {
            LoadState::Ready(progress) => Some(progress.clone()),
            LoadState::Unloaded | LoadState::Loading => None,
        }
    }

    #[must_use]
    pub fn level(&self) -> Option<u32> {
        self.snapshot().map(|progress| progress.level())
    }

    /// Drop the loaded snapshot, e.g. when the user signs out.
    pub fn teardown(&self) {
        *self.lock_state() = LoadState::Unloaded;
    }

    /// Load the snapshot for `user_id`.
    ///
    /// Never fails: when neither the cache nor the remote store can supply a
    /// snapshot, a fresh empty one is used and cached locally.
    pub async fn load(&self, user_id: &UserId) -> Progress {
        let _writer = self.writer.lock().await;
        *self.lock_state() = LoadState::Loading;
        let key = cache_key(user_id);

        let progress = match self.read_cache(&key, user_id).await {
            Some(cached) => {
                debug!(user_id = %user_id, "loaded progress from local cache");
                cached
            }
            None => self.load_remote(user_id, &key).await,
        };

        *self.lock_state() = LoadState::Ready(progress.clone());
        progress
    }

    /// Record a completed tutorial.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::NotLoaded` if `load` has not completed.
    pub async fn complete_tutorial(
        &self,
        item_id: &ItemId,
    ) -> Result<CompletionOutcome, ProgressStoreError> {
        self.complete(CompletionKind::Tutorial, item_id).await
    }

    /// Record a completed challenge.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::NotLoaded` if `load` has not completed.
    pub async fn complete_challenge(
        &self,
        item_id: &ItemId,
    ) -> Result<CompletionOutcome, ProgressStoreError> {
        self.complete(CompletionKind::Challenge, item_id).await
    }

    /// Apply a completion to the loaded snapshot and persist it.
    ///
    /// Completing an item twice returns a no-op outcome and skips persistence.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::NotLoaded` if `load` has not completed.
    pub async fn complete(
        &self,
        kind: CompletionKind,
        item_id: &ItemId,
    ) -> Result<CompletionOutcome, ProgressStoreError> {
        let outcome = {
            let mut state = self.lock_state();
            let LoadState::Ready(current) = &mut *state else {
                return Err(ProgressStoreError::NotLoaded);
            };
            let outcome = apply_completion(current, kind, item_id);
            *current = outcome.progress.clone();
            outcome
        };

        if outcome.is_noop() {
            debug!(%kind, item_id = %item_id, "item already completed");
            return Ok(outcome);
        }

        info!(
            user_id = %outcome.progress.user_id(),
            %kind,
            item_id = %item_id,
            xp_gained = outcome.xp_gained,
            total_xp = outcome.progress.total_xp(),
            "completion recorded"
        );
        self.persist(outcome.progress.user_id()).await;
        Ok(outcome)
    }

    async fn read_cache(&self, key: &str, user_id: &UserId) -> Option<Progress> {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, error = %err, "local cache read failed");
                return None;
            }
        };
        match serde_json::from_str::<Progress>(&raw) {
            Ok(progress) if progress.user_id() == user_id => Some(progress),
            Ok(_) => {
                warn!(key, "cached progress belongs to another user, ignoring");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "discarding undecodable cached progress");
                None
            }
        }
    }

    async fn load_remote(&self, user_id: &UserId, key: &str) -> Progress {
        let progress = match self.remote.find_by_user(user_id).await {
            Ok(Some(found)) => {
                debug!(user_id = %user_id, "loaded progress from remote store");
                found
            }
            Ok(None) => {
                let fresh = Progress::new(user_id.clone());
                match self.remote.create(&fresh).await {
                    Ok(record_id) => {
                        info!(user_id = %user_id, record_id = %record_id, "created progress record");
                        fresh.with_record_id(record_id)
                    }
                    Err(err) => {
                        warn!(user_id = %user_id, error = %err, "could not create remote progress, using default");
                        fresh
                    }
                }
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "remote progress lookup failed, using default");
                Progress::new(user_id.clone())
            }
        };

        self.write_cache(key, &progress).await;
        progress
    }

    async fn write_cache(&self, key: &str, progress: &Progress) {
        let encoded = match serde_json::to_string(progress) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "could not encode progress for local cache");
                return;
            }
        };
        if let Err(err) = self.cache.set(key, &encoded).await {
            warn!(key, error = %err, "local cache write failed");
        }
    }

    /// Snapshot currently held for `user_id`, if it is still the loaded user.
    fn current_for(&self, user_id: &UserId) -> Option<Progress> {
        match &*self.lock_state() {
            LoadState::Ready(current) if current.user_id() == user_id => Some(current.clone()),
            _ => None,
        }
    }

    async fn persist(&self, user_id: &UserId) {
        let _writer = self.writer.lock().await;
        let Some(progress) = self.current_for(user_id) else {
            debug!(user_id = %user_id, "progress unloaded before save, skipping");
            return;
        };
        self.write_cache(&cache_key(user_id), &progress).await;

        let result = match progress.record_id() {
            Some(record_id) => self.remote.update(record_id, &progress).await,
            None => self.create_remote(&progress).await,
        };
        if let Err(err) = result {
            warn!(user_id = %user_id, error = %err, "remote save failed, continuing with local cache");
        }
    }

    /// Create the remote record for a snapshot that has none yet and adopt its id.
    ///
    /// If the store already holds a record for the user (an earlier load fell
    /// back to a local default), the two snapshots are merged and the merge is
    /// written to both tiers.
    async fn create_remote(&self, progress: &Progress) -> Result<(), StorageError> {
        let stored = match self.remote.create(progress).await {
            Ok(record_id) => progress.clone().with_record_id(record_id),
            Err(StorageError::Conflict) => {
                let existing = self
                    .remote
                    .find_by_user(progress.user_id())
                    .await?
                    .ok_or(StorageError::NotFound)?;
                let record_id = existing.record_id().cloned().ok_or(StorageError::NotFound)?;
                let merged = merge_snapshots(progress, &existing);
                self.remote.update(&record_id, &merged).await?;
                info!(
                    user_id = %progress.user_id(),
                    record_id = %record_id,
                    total_xp = merged.total_xp(),
                    "merged local progress into existing remote record"
                );
                merged
            }
            Err(err) => return Err(err),
        };

        if let Some(adopted) = self.adopt_remote(&stored) {
            debug!(user_id = %adopted.user_id(), "adopted remote record");
            self.write_cache(&cache_key(adopted.user_id()), &adopted).await;
        }
        Ok(())
    }

    /// Fold what the remote store now holds into the loaded snapshot.
    fn adopt_remote(&self, stored: &Progress) -> Option<Progress> {
        let mut state = self.lock_state();
        match &mut *state {
            LoadState::Ready(current) if current.user_id() == stored.user_id() => {
                *current = merge_snapshots(current, stored);
                Some(current.clone())
            }
            _ => None,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
