use chrono::{DateTime, Utc};

use crate::model::ids::{LevelId, UserId};

//
// ─── TASK PROGRESS ─────────────────────────────────────────────────────────────
//

/// Latest grading result for one task of one user.
///
/// `(user_id, level, task_idx)` is unique: a resubmission overwrites
/// `completed` instead of adding a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub user_id: UserId,
    pub level: LevelId,
    pub task_idx: usize,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl TaskProgress {
    #[must_use]
    pub fn new(
        user_id: UserId,
        level: LevelId,
        task_idx: usize,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            level,
            task_idx,
            completed,
            updated_at,
        }
    }

    /// Composite key identifying the record.
    #[must_use]
    pub fn key(&self) -> (UserId, LevelId, usize) {
        (self.user_id, self.level, self.task_idx)
    }
}

//
// ─── TASK STATE ────────────────────────────────────────────────────────────────
//

/// Where a user stands on a single task.
///
/// Driven only by recorded verdicts; a task can be resubmitted from any
/// state, so there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Unattempted,
    AttemptedIncorrect,
    AttemptedCorrect,
}

impl TaskState {
    #[must_use]
    pub fn from_record(record: Option<&TaskProgress>) -> Self {
        match record {
            None => Self::Unattempted,
            Some(p) if p.completed => Self::AttemptedCorrect,
            Some(_) => Self::AttemptedIncorrect,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Unattempted => "unattempted",
            TaskState::AttemptedIncorrect => "attempted-incorrect",
            TaskState::AttemptedCorrect => "attempted-correct",
        }
    }
}
