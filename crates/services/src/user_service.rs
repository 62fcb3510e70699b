use std::sync::Arc;

use quest_core::model::{RegistrationDraft, RegistrationError, UserId};
use storage::repository::{NewUserRecord, StorageError, UserRecord, UserRepository};

use crate::Clock;
use crate::error::UserServiceError;

/// Registration and lookup of learners.
///
/// Password hashing and verification belong to the auth provider; this
/// service only stores the hash it is given.
#[derive(Clone)]
pub struct UserService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Validate the form, hash the password with `hash_password` and store
    /// the user.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Registration` for field errors or a taken
    /// username, `UserServiceError::Storage` for other storage failures.
    pub async fn register<F>(
        &self,
        draft: RegistrationDraft,
        hash_password: F,
    ) -> Result<UserId, UserServiceError>
    where
        F: FnOnce(&str) -> String,
    {
        let registration = draft.validate()?;
        if self
            .users
            .find_by_username(registration.username())
            .await?
            .is_some()
        {
            return Err(RegistrationError::UsernameTaken.into());
        }

        let record = NewUserRecord {
            username: registration.username().to_owned(),
            password_hash: hash_password(registration.password()),
            created_at: self.clock.now(),
        };
        match self.users.insert_user(record).await {
            Ok(id) => {
                tracing::info!(user = %id, "registered user");
                Ok(id)
            }
            Err(StorageError::Conflict) => Err(RegistrationError::UsernameTaken.into()),
            Err(other) => Err(other.into()),
        }
    }

    /// Check a login attempt against the stored hash.
    ///
    /// `verify` receives the plain password and the stored hash. Unknown
    /// usernames and rejected passwords both yield `None`.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on repository failures.
    pub async fn authenticate<F>(
        &self,
        username: &str,
        password: &str,
        verify: F,
    ) -> Result<Option<UserId>, UserServiceError>
    where
        F: FnOnce(&str, &str) -> bool,
    {
        let Some(user) = self.users.find_by_username(username.trim()).await? else {
            tracing::debug!("login for unknown username");
            return Ok(None);
        };
        if verify(password, &user.password_hash) {
            tracing::info!(user = %user.id, "user logged in");
            Ok(Some(user.id))
        } else {
            tracing::debug!(user = %user.id, "login rejected");
            Ok(None)
        }
    }

    /// Look up a user by name.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on repository failures.
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, UserServiceError> {
        Ok(self.users.find_by_username(username.trim()).await?)
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on repository failures.
    pub async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, UserServiceError> {
        Ok(self.users.get_user(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quest_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn service() -> UserService {
        UserService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    fn fake_hash(password: &str) -> String {
        format!("hashed:{password}")
    }

    #[tokio::test]
    async fn registers_and_finds_user() {
        let service = service();
        let id = service
            .register(RegistrationDraft::new("alice", "secret1", "secret1"), fake_hash)
            .await
            .unwrap();

        let user = service.find_by_username(" alice ").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.password_hash, "hashed:secret1");
        assert_eq!(user.created_at, fixed_now());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_registration_error() {
        let service = service();
        service
            .register(RegistrationDraft::new("alice", "secret1", "secret1"), fake_hash)
            .await
            .unwrap();

        let err = service
            .register(RegistrationDraft::new("alice", "other12", "other12"), fake_hash)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserServiceError::Registration(RegistrationError::UsernameTaken)
        ));
    }

    fn fake_verify(password: &str, hash: &str) -> bool {
        fake_hash(password) == hash
    }

    #[tokio::test]
    async fn authenticates_with_matching_password_only() {
        let service = service();
        let id = service
            .register(RegistrationDraft::new("alice", "secret1", "secret1"), fake_hash)
            .await
            .unwrap();

        let ok = service
            .authenticate(" alice", "secret1", fake_verify)
            .await
            .unwrap();
        assert_eq!(ok, Some(id));

        let wrong = service
            .authenticate("alice", "secret2", fake_verify)
            .await
            .unwrap();
        assert_eq!(wrong, None);
    }

    #[tokio::test]
    async fn unknown_username_never_calls_verify() {
        let service = service();
        let found = service
            .authenticate("nobody", "secret1", |_, _| {
                panic!("verify must not run without a stored hash")
            })
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_storage() {
        let service = service();
        let err = service
            .register(RegistrationDraft::new("al", "secret1", "secret1"), |_| {
                panic!("hash must not be computed for invalid input")
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserServiceError::Registration(RegistrationError::UsernameLength)
        ));
        assert!(service.find_by_username("al").await.unwrap().is_none());
    }
}
