use std::sync::Arc;

use quest_core::grader::{SubmissionForm, grade_form};
use quest_core::model::{Catalog, LevelId, TaskDefinition, TaskProgress, TaskState, UserId};
use quest_core::unlock::{AccessDenied, NextStep, check_access, next_step};
use storage::repository::ProgressRepository;

use crate::error::TaskServiceError;
use crate::progress_recorder::ProgressRecorder;

/// Everything the task page needs to render one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub level: LevelId,
    pub level_title: String,
    pub idx: usize,
    pub total: usize,
    pub task: TaskDefinition,
    pub state: TaskState,
}

/// Result of opening a task page.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAccess {
    Granted(TaskView),
    Locked,
    NotFound,
}

/// Result of submitting an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The answer was graded and the verdict recorded.
    Graded { correct: bool, next: NextStep },
    /// Previous level incomplete; nothing graded or written.
    Locked,
    /// No such level or task; nothing graded or written.
    NotFound,
}

/// Human-facing signal for a submission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Incorrect,
    Locked,
    NotFound,
}

impl Feedback {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Feedback::Correct => "Correct!",
            Feedback::Incorrect => "Incorrect, try again.",
            Feedback::Locked => "Complete the previous level first.",
            Feedback::NotFound => "Task not found.",
        }
    }
}

impl TaskOutcome {
    #[must_use]
    pub fn feedback(&self) -> Feedback {
        match self {
            TaskOutcome::Graded { correct: true, .. } => Feedback::Correct,
            TaskOutcome::Graded { correct: false, .. } => Feedback::Incorrect,
            TaskOutcome::Locked => Feedback::Locked,
            TaskOutcome::NotFound => Feedback::NotFound,
        }
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        matches!(self, TaskOutcome::Graded { correct: true, .. })
    }
}

impl From<AccessDenied> for TaskOutcome {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Locked => TaskOutcome::Locked,
            _ => TaskOutcome::NotFound,
        }
    }
}

impl From<AccessDenied> for TaskAccess {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Locked => TaskAccess::Locked,
            _ => TaskAccess::NotFound,
        }
    }
}

/// Guards, grades and records task submissions.
#[derive(Clone)]
pub struct TaskService {
    catalog: Arc<Catalog>,
    progress: Arc<dyn ProgressRepository>,
    recorder: ProgressRecorder,
}

impl TaskService {
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        progress: Arc<dyn ProgressRepository>,
        recorder: ProgressRecorder,
    ) -> Self {
        Self {
            catalog,
            progress,
            recorder,
        }
    }

    /// Load the records the unlock rule for `level` depends on.
    async fn gating_progress(
        &self,
        user_id: UserId,
        level: LevelId,
    ) -> Result<Vec<TaskProgress>, TaskServiceError> {
        match level.previous() {
            Some(previous) => Ok(self.progress.progress_for_level(user_id, previous).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Open `task(level, idx)` for viewing.
    ///
    /// # Errors
    ///
    /// Returns `TaskServiceError::Storage` if progress cannot be read.
    pub async fn open_task(
        &self,
        user_id: UserId,
        level: LevelId,
        idx: usize,
    ) -> Result<TaskAccess, TaskServiceError> {
        let gating = self.gating_progress(user_id, level).await?;
        let task = match check_access(&self.catalog, &gating, level, idx) {
            Ok(task) => task.clone(),
            Err(denied) => {
                tracing::debug!(user = %user_id, %level, idx, ?denied, "task access denied");
                return Ok(denied.into());
            }
        };

        let record = self.progress.get_progress(user_id, level, idx).await?;
        let (level_title, total) = self
            .catalog
            .level(level)
            .map(|l| (l.title().to_owned(), l.task_count()))
            .unwrap_or_default();

        Ok(TaskAccess::Granted(TaskView {
            level,
            level_title,
            idx,
            total,
            task,
            state: TaskState::from_record(record.as_ref()),
        }))
    }

    /// Grade a submission for `task(level, idx)` and record the verdict.
    ///
    /// The access guard is evaluated against the store on every call.
    /// Locked or missing tasks return an outcome without grading or
    /// writing anything.
    ///
    /// # Errors
    ///
    /// Returns `TaskServiceError::Storage` if progress cannot be read or
    /// written.
    pub async fn submit(
        &self,
        user_id: UserId,
        level: LevelId,
        idx: usize,
        form: &SubmissionForm,
    ) -> Result<TaskOutcome, TaskServiceError> {
        let gating = self.gating_progress(user_id, level).await?;
        let task = match check_access(&self.catalog, &gating, level, idx) {
            Ok(task) => task,
            Err(denied) => {
                tracing::info!(user = %user_id, %level, idx, ?denied, "submission rejected");
                return Ok(denied.into());
            }
        };

        let correct = grade_form(task, form);
        self.recorder.record(user_id, level, idx, correct).await?;
        let next = next_step(&self.catalog, level, idx, correct);

        tracing::info!(
            user = %user_id,
            %level,
            idx,
            kind = task.kind().type_tag(),
            correct,
            "graded submission"
        );
        if next == NextStep::LevelComplete {
            if let Some(definition) = self.catalog.level(level) {
                tracing::info!(user = %user_id, %level, title = definition.title(), "level finished");
            }
        }

        Ok(TaskOutcome::Graded { correct, next })
    }
}
