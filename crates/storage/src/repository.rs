use async_trait::async_trait;
use progress_core::model::{Progress, RecordId, UserId, UserProfile};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::auth::{AuthBackend, InMemoryAuth};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Remote `user-progress` collection.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the progress document whose `userId` matches, tagged with its record id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Progress>, StorageError>;

    /// Create a new document and return the id the store assigned to it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has a document,
    /// or other storage errors.
    async fn create(&self, progress: &Progress) -> Result<RecordId, StorageError>;

    /// Overwrite the document with the given record id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such record exists, or other storage errors.
    async fn update(&self, record_id: &RecordId, progress: &Progress) -> Result<(), StorageError>;
}

/// Remote `user-profiles` collection.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create a profile document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be stored.
    async fn create_profile(&self, profile: &UserProfile) -> Result<RecordId, StorageError>;

    /// Fetch the profile for a user, if one was written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError>;
}

/// String-keyed, string-valued local cache.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<RecordId, Progress>>>,
    profiles: Arc<Mutex<HashMap<RecordId, UserProfile>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored progress documents.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn progress_count(&self) -> Result<usize, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Progress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .find(|(_, progress)| progress.user_id() == user_id)
            .map(|(id, progress)| progress.clone().with_record_id(id.clone())))
    }

    async fn create(&self, progress: &Progress) -> Result<RecordId, StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.values().any(|p| p.user_id() == progress.user_id()) {
            return Err(StorageError::Conflict);
        }
        let id = RecordId::unique();
        guard.insert(id.clone(), progress.clone().with_record_id(id.clone()));
        Ok(id)
    }

    async fn update(&self, record_id: &RecordId, progress: &Progress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let slot = guard.get_mut(record_id).ok_or(StorageError::NotFound)?;
        *slot = progress.clone().with_record_id(record_id.clone());
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn create_profile(&self, profile: &UserProfile) -> Result<RecordId, StorageError> {
        let mut guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = RecordId::unique();
        guard.insert(id.clone(), profile.clone());
        Ok(id)
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.values().find(|p| &p.user_id == user_id).cloned())
    }
}

/// In-memory stand-in for the local key-value cache.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Aggregates the remote collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub auth: Arc<dyn AuthBackend>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo);
        let auth: Arc<dyn AuthBackend> = Arc::new(InMemoryAuth::new());
        Self {
            progress,
            profiles,
            auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::{CompletionKind, ItemId};
    use progress_core::rules::apply_completion;
    use progress_core::time::fixed_now;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn create_then_find_by_user() {
        let repo = InMemoryRepository::new();
        let progress = Progress::new(user("u-1"));

        let id = repo.create(&progress).await.unwrap();
        let found = repo.find_by_user(&user("u-1")).await.unwrap().unwrap();

        assert_eq!(found.record_id(), Some(&id));
        assert_eq!(found.user_id(), &user("u-1"));
        assert!(repo.find_by_user(&user("u-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rejects_second_document_for_user() {
        let repo = InMemoryRepository::new();
        repo.create(&Progress::new(user("u-1"))).await.unwrap();
        let err = repo.create(&Progress::new(user("u-1"))).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn update_overwrites_existing_document() {
        let repo = InMemoryRepository::new();
        let id = repo.create(&Progress::new(user("u-1"))).await.unwrap();
        let stored = repo.find_by_user(&user("u-1")).await.unwrap().unwrap();

        let outcome = apply_completion(
            &stored,
            CompletionKind::Challenge,
            &ItemId::new("c-1").unwrap(),
        );
        repo.update(&id, &outcome.progress).await.unwrap();

        let refreshed = repo.find_by_user(&user("u-1")).await.unwrap().unwrap();
        assert_eq!(refreshed.total_xp(), 100);
        assert_eq!(refreshed.record_id(), Some(&id));
    }

    #[tokio::test]
    async fn update_unknown_record_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .update(&RecordId::new("missing").unwrap(), &Progress::new(user("u-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn profile_round_trip() {
        let repo = InMemoryRepository::new();
        let profile = UserProfile {
            user_id: user("u-1"),
            display_name: "Ada".into(),
            email: "ada@example.com".into(),
            created_at: fixed_now(),
        };
        repo.create_profile(&profile).await.unwrap();
        let fetched = repo.get_profile(&user("u-1")).await.unwrap();
        assert_eq!(fetched, Some(profile));
    }

    #[tokio::test]
    async fn cache_get_and_set() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);
        cache.set("k", "v1").await.unwrap();
        cache.set("k", "v2").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v2"));
    }
}
