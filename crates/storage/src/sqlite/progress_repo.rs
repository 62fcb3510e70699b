use quest_core::model::{LevelId, TaskProgress, UserId};

use super::{
    SqliteRepository,
    mapping::{level_to_i64, map_progress_row, task_idx_to_i64, user_id_to_i64},
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(&self, progress: &TaskProgress) -> Result<(), StorageError> {
        // Single statement so concurrent submissions for the same key
        // serialize on the unique constraint; last writer wins.
        sqlx::query(
            r"
            INSERT INTO task_progress (user_id, level, task_idx, completed, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, level, task_idx) DO UPDATE SET
                completed = excluded.completed,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id_to_i64(progress.user_id)?)
        .bind(level_to_i64(progress.level))
        .bind(task_idx_to_i64(progress.task_idx)?)
        .bind(progress.completed)
        .bind(progress.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        level: LevelId,
        task_idx: usize,
    ) -> Result<Option<TaskProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, level, task_idx, completed, updated_at
            FROM task_progress
            WHERE user_id = ?1 AND level = ?2 AND task_idx = ?3
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(level_to_i64(level))
        .bind(task_idx_to_i64(task_idx)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn progress_for_user(&self, user_id: UserId) -> Result<Vec<TaskProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, level, task_idx, completed, updated_at
            FROM task_progress
            WHERE user_id = ?1
            ORDER BY level ASC, task_idx ASC
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn progress_for_level(
        &self,
        user_id: UserId,
        level: LevelId,
    ) -> Result<Vec<TaskProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, level, task_idx, completed, updated_at
            FROM task_progress
            WHERE user_id = ?1 AND level = ?2
            ORDER BY task_idx ASC
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(level_to_i64(level))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_progress_row).collect()
    }
}
