use quest_core::model::UserId;

use super::{
    SqliteRepository,
    mapping::{map_user_row, user_id_from_i64, user_id_to_i64},
};
use crate::repository::{NewUserRecord, StorageError, UserRecord, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (username, password_hash, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => StorageError::Connection(other.to_string()),
        })?;

        user_id_from_i64(res.last_insert_rowid())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE id = ?1
            ",
        )
        .bind(user_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = ?1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_user_row).transpose()
    }
}
