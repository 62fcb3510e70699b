use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quest_core::model::{LevelId, TaskProgress, UserId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

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

/// A user row to be inserted. The password is already hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted shape for a registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    #[must_use]
    pub fn from_new(id: UserId, new: NewUserRecord) -> Self {
        Self {
            id,
            username: new.username,
            password_hash: new.password_hash,
            created_at: new.created_at,
        }
    }
}

/// Repository contract for per-task progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert the record, or overwrite `completed`/`updated_at` if one
    /// already exists for `(user_id, level, task_idx)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, progress: &TaskProgress) -> Result<(), StorageError>;

    /// Fetch the record for one task, if the user ever submitted it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_progress(
        &self,
        user_id: UserId,
        level: LevelId,
        task_idx: usize,
    ) -> Result<Option<TaskProgress>, StorageError>;

    /// All records of a user, ordered by level then task index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn progress_for_user(&self, user_id: UserId) -> Result<Vec<TaskProgress>, StorageError>;

    /// Records of a user for one level, ordered by task index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn progress_for_level(
        &self,
        user_id: UserId,
        level: LevelId,
    ) -> Result<Vec<TaskProgress>, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username is taken.
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;
}

type ProgressKey = (UserId, LevelId, usize);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<BTreeMap<ProgressKey, TaskProgress>>>,
    users: Arc<Mutex<BTreeMap<UserId, UserRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_progress(&self, progress: &TaskProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(progress.key(), progress.clone());
        Ok(())
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        level: LevelId,
        task_idx: usize,
    ) -> Result<Option<TaskProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id, level, task_idx)).cloned())
    }

    async fn progress_for_user(&self, user_id: UserId) -> Result<Vec<TaskProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn progress_for_level(
        &self,
        user_id: UserId,
        level: LevelId,
    ) -> Result<Vec<TaskProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|p| p.user_id == user_id && p.level == level)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut guard = self
            .users
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.values().any(|u| u.username == user.username) {
            return Err(StorageError::Conflict);
        }
        let next = guard.keys().next_back().map_or(1, |id| id.value() + 1);
        let id = UserId::new(next);
        guard.insert(id, UserRecord::from_new(id, user));
        Ok(id)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError> {
        let guard = self
            .users
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let guard = self
            .users
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.values().find(|u| u.username == username).cloned())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Self { progress, users }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_core::time::fixed_now;

    fn record(user: u64, level: u32, idx: usize, completed: bool) -> TaskProgress {
        TaskProgress::new(UserId::new(user), LevelId::new(level), idx, completed, fixed_now())
    }

    #[tokio::test]
    async fn upsert_overwrites_instead_of_duplicating() {
        let repo = InMemoryRepository::new();
        repo.upsert_progress(&record(1, 1, 0, false)).await.unwrap();
        repo.upsert_progress(&record(1, 1, 0, true)).await.unwrap();

        let all = repo.progress_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].completed);
    }

    #[tokio::test]
    async fn queries_are_scoped_to_user_and_level() {
        let repo = InMemoryRepository::new();
        repo.upsert_progress(&record(1, 1, 0, true)).await.unwrap();
        repo.upsert_progress(&record(1, 2, 0, true)).await.unwrap();
        repo.upsert_progress(&record(2, 1, 0, true)).await.unwrap();

        let level_one = repo
            .progress_for_level(UserId::new(1), LevelId::new(1))
            .await
            .unwrap();
        assert_eq!(level_one.len(), 1);
        assert_eq!(repo.progress_for_user(UserId::new(1)).await.unwrap().len(), 2);
        assert!(repo
            .get_progress(UserId::new(2), LevelId::new(2), 0)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let repo = InMemoryRepository::new();
        let new = NewUserRecord {
            username: "alice".into(),
            password_hash: "h".into(),
            created_at: fixed_now(),
        };
        let id = repo.insert_user(new.clone()).await.unwrap();
        assert_eq!(id, UserId::new(1));

        let err = repo.insert_user(new).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));

        let found = repo.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(repo.get_user(id).await.unwrap(), Some(found));
    }
}
