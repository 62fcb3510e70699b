//! Level completion, unlock rules and task access checks.
//!
//! Everything here is derived from progress records on each call. Nothing is
//! cached, so a fresh submission is reflected immediately.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::{Catalog, LevelId, TaskDefinition, TaskProgress};

/// One row of the level menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub id: LevelId,
    pub title: String,
    pub done: usize,
    pub total: usize,
    pub unlocked: bool,
}

impl LevelSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

/// Why a task cannot be opened or submitted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessDenied {
    #[error("task not found")]
    NotFound,
    #[error("previous level is not completed")]
    Locked,
}

/// What the user would naturally do after a graded submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Move on to the given task index in the same level.
    Advance(usize),
    /// Last task of the level solved; go back to the level list.
    LevelComplete,
    /// Incorrect; stay on the task.
    Retry,
}

/// Number of distinct tasks of `level` with a completed record.
///
/// Records pointing past the end of the level are ignored.
#[must_use]
pub fn completed_count(catalog: &Catalog, progress: &[TaskProgress], level: LevelId) -> usize {
    let Some(definition) = catalog.level(level) else {
        return 0;
    };
    let total = definition.task_count();
    progress
        .iter()
        .filter(|p| p.level == level && p.completed && p.task_idx < total)
        .map(|p| p.task_idx)
        .collect::<BTreeSet<_>>()
        .len()
}

/// True when every task of `level` has a completed record.
#[must_use]
pub fn is_level_complete(catalog: &Catalog, progress: &[TaskProgress], level: LevelId) -> bool {
    catalog.level(level).is_some_and(|definition| {
        completed_count(catalog, progress, level) == definition.task_count()
    })
}

/// Level 1 is always unlocked; any other level needs the previous one
/// fully completed.
#[must_use]
pub fn is_level_unlocked(catalog: &Catalog, progress: &[TaskProgress], level: LevelId) -> bool {
    match level.previous() {
        None => true,
        Some(previous) => is_level_complete(catalog, progress, previous),
    }
}

/// Completion counts and unlock flags for every level, ascending.
#[must_use]
pub fn summarize_levels(catalog: &Catalog, progress: &[TaskProgress]) -> Vec<LevelSummary> {
    catalog
        .levels()
        .map(|(id, definition)| LevelSummary {
            id,
            title: definition.title().to_owned(),
            done: completed_count(catalog, progress, id),
            total: definition.task_count(),
            unlocked: is_level_unlocked(catalog, progress, id),
        })
        .collect()
}

/// Gate for viewing or submitting `task(level, idx)`.
///
/// Existence is checked before the unlock rule, so a missing task is
/// reported as `NotFound` even inside a locked level.
///
/// # Errors
///
/// Returns `AccessDenied::NotFound` if the level or index does not exist,
/// `AccessDenied::Locked` if the previous level is incomplete.
pub fn check_access<'a>(
    catalog: &'a Catalog,
    progress: &[TaskProgress],
    level: LevelId,
    idx: usize,
) -> Result<&'a TaskDefinition, AccessDenied> {
    let task = catalog.task(level, idx).ok_or(AccessDenied::NotFound)?;
    if !is_level_unlocked(catalog, progress, level) {
        return Err(AccessDenied::Locked);
    }
    Ok(task)
}

/// Navigation hint after grading `task(level, idx)`.
#[must_use]
pub fn next_step(catalog: &Catalog, level: LevelId, idx: usize, correct: bool) -> NextStep {
    if !correct {
        return NextStep::Retry;
    }
    let next = idx + 1;
    match catalog.level(level) {
        Some(definition) if next < definition.task_count() => NextStep::Advance(next),
        _ => NextStep::LevelComplete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use crate::time::fixed_now;

    fn catalog() -> Catalog {
        Catalog::from_json_str(
            r#"{
                "1": {"title": "One", "tasks": [
                    {"type": "mcq", "payload": {"choices": ["a", "b"], "correct": 0}},
                    {"type": "mcq", "payload": {"choices": ["a", "b"], "correct": 1}}
                ]},
                "2": {"title": "Two", "tasks": [
                    {"type": "fill", "payload": {"answer_regex": "x"}}
                ]},
                "3": {"title": "Three", "tasks": [
                    {"type": "fill", "payload": {"answer_regex": "y"}}
                ]}
            }"#,
        )
        .unwrap()
    }

    fn record(level: u32, idx: usize, completed: bool) -> TaskProgress {
        TaskProgress::new(UserId::new(1), LevelId::new(level), idx, completed, fixed_now())
    }

    #[test]
    fn first_level_unlocked_without_progress() {
        let summaries = summarize_levels(&catalog(), &[]);
        assert_eq!(summaries.len(), 3);
        assert!(summaries[0].unlocked);
        assert!(!summaries[1].unlocked);
        assert!(!summaries[2].unlocked);
        assert_eq!(summaries[0].done, 0);
        assert_eq!(summaries[0].total, 2);
    }

    #[test]
    fn partial_level_keeps_next_locked() {
        let progress = vec![record(1, 0, true), record(1, 1, false)];
        let summaries = summarize_levels(&catalog(), &progress);
        assert_eq!(summaries[0].done, 1);
        assert_eq!(summaries[0].total, 2);
        assert!(!summaries[1].unlocked);
    }

    #[test]
    fn completing_a_level_unlocks_only_the_next() {
        let progress = vec![record(1, 0, true), record(1, 1, true)];
        let summaries = summarize_levels(&catalog(), &progress);
        assert!(summaries[0].is_complete());
        assert!(summaries[1].unlocked);
        assert!(!summaries[2].unlocked);
    }

    #[test]
    fn out_of_range_and_duplicate_records_do_not_count() {
        let progress = vec![record(1, 0, true), record(1, 0, true), record(1, 7, true)];
        assert_eq!(completed_count(&catalog(), &progress, LevelId::new(1)), 1);
        assert!(!is_level_complete(&catalog(), &progress, LevelId::new(1)));
    }

    #[test]
    fn access_reports_not_found_before_locked() {
        let catalog = catalog();
        assert_eq!(
            check_access(&catalog, &[], LevelId::new(2), 5).unwrap_err(),
            AccessDenied::NotFound
        );
        assert_eq!(
            check_access(&catalog, &[], LevelId::new(9), 0).unwrap_err(),
            AccessDenied::NotFound
        );
        assert_eq!(
            check_access(&catalog, &[], LevelId::new(2), 0).unwrap_err(),
            AccessDenied::Locked
        );
        assert!(check_access(&catalog, &[], LevelId::new(1), 1).is_ok());
    }

    #[test]
    fn access_granted_once_previous_level_done() {
        let catalog = catalog();
        let progress = vec![record(1, 0, true), record(1, 1, true)];
        let task = check_access(&catalog, &progress, LevelId::new(2), 0).unwrap();
        assert_eq!(task.kind().type_tag(), "fill");
    }

    #[test]
    fn next_step_hints() {
        let catalog = catalog();
        let one = LevelId::new(1);
        assert_eq!(next_step(&catalog, one, 0, true), NextStep::Advance(1));
        assert_eq!(next_step(&catalog, one, 1, true), NextStep::LevelComplete);
        assert_eq!(next_step(&catalog, one, 0, false), NextStep::Retry);
    }
}
