use std::sync::Arc;

use quest_core::model::{LevelId, TaskProgress, UserId};
use storage::repository::ProgressRepository;

use crate::Clock;
use crate::error::TaskServiceError;

/// Writes grading verdicts into the progress store.
#[derive(Clone)]
pub struct ProgressRecorder {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressRecorder {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { clock, progress }
    }

    /// Upsert the verdict for `task(level, task_idx)`.
    ///
    /// Incorrect verdicts are written too: the record exists but does not
    /// count toward level completion. Repeated calls converge on the latest
    /// verdict with a single record per task.
    ///
    /// # Errors
    ///
    /// Returns `TaskServiceError::Storage` if the write fails.
    pub async fn record(
        &self,
        user_id: UserId,
        level: LevelId,
        task_idx: usize,
        completed: bool,
    ) -> Result<TaskProgress, TaskServiceError> {
        let progress = TaskProgress::new(user_id, level, task_idx, completed, self.clock.now());
        self.progress.upsert_progress(&progress).await?;
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quest_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn resubmission_overwrites_verdict() {
        let repo = InMemoryRepository::new();
        let recorder = ProgressRecorder::new(fixed_clock(), Arc::new(repo.clone()));
        let user = UserId::new(3);
        let level = LevelId::new(1);

        recorder.record(user, level, 0, true).await.unwrap();
        let latest = recorder.record(user, level, 0, false).await.unwrap();

        let rows = repo.progress_for_user(user).await.unwrap();
        assert_eq!(rows, vec![latest]);
        assert!(!rows[0].completed);
        assert_eq!(rows[0].updated_at, fixed_now());
    }
}
