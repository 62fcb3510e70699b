use quest_core::model::{LevelId, TaskProgress, UserId};
use sqlx::Row;

use crate::repository::{StorageError, UserRecord};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    u64::try_from(v)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))
}

pub(crate) fn level_to_i64(level: LevelId) -> i64 {
    i64::from(level.value())
}

pub(crate) fn level_from_i64(v: i64) -> Result<LevelId, StorageError> {
    u32::try_from(v)
        .map(LevelId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid level: {v}")))
}

pub(crate) fn task_idx_to_i64(idx: usize) -> Result<i64, StorageError> {
    i64::try_from(idx).map_err(|_| StorageError::Serialization("task_idx overflow".into()))
}

pub(crate) fn task_idx_from_i64(v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid task_idx: {v}")))
}

pub(crate) fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<TaskProgress, StorageError> {
    Ok(TaskProgress {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        level: level_from_i64(row.try_get::<i64, _>("level").map_err(ser)?)?,
        task_idx: task_idx_from_i64(row.try_get::<i64, _>("task_idx").map_err(ser)?)?,
        completed: row.try_get::<bool, _>("completed").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord, StorageError> {
    Ok(UserRecord {
        id: user_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        username: row.try_get("username").map_err(ser)?,
        password_hash: row.try_get("password_hash").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
