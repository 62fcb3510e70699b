//! Grading of raw task submissions.
//!
//! Grading never fails: a submission that cannot be read for the task's type
//! is simply incorrect.

use serde::Deserialize;

use crate::model::{TaskDefinition, TaskKind};

/// Separator between block labels in an ordering submission.
pub const BLOCK_DELIMITER: &str = "||";

/// Raw form fields as posted by the task page.
///
/// Which field matters depends on the task type: `choice` for `mcq`,
/// `block` for `ordering`, `fillin` for `fill`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmissionForm {
    #[serde(default)]
    pub choice: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub fillin: Option<String>,
}

impl SubmissionForm {
    #[must_use]
    pub fn with_choice(choice: impl Into<String>) -> Self {
        Self {
            choice: Some(choice.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_blocks(joined: impl Into<String>) -> Self {
        Self {
            block: Some(joined.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_fillin(text: impl Into<String>) -> Self {
        Self {
            fillin: Some(text.into()),
            ..Self::default()
        }
    }
}

/// A submission interpreted for a specific task type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Selected choice index; `None` when missing or unparsable.
    Choice(Option<usize>),
    /// Block labels in the order the user placed them.
    Blocks(Vec<String>),
    /// Free text, already trimmed.
    Text(String),
    /// The task type has no known answer shape.
    Unsupported,
}

impl Answer {
    /// Read the form field relevant to `kind`.
    #[must_use]
    pub fn from_form(kind: &TaskKind, form: &SubmissionForm) -> Self {
        match kind {
            TaskKind::Mcq { .. } => Answer::Choice(
                form.choice
                    .as_deref()
                    .and_then(|raw| raw.trim().parse::<usize>().ok()),
            ),
            TaskKind::Ordering { .. } => Answer::Blocks(
                form.block
                    .as_deref()
                    .unwrap_or_default()
                    .split(BLOCK_DELIMITER)
                    .map(str::to_owned)
                    .collect(),
            ),
            TaskKind::Fill { .. } => {
                Answer::Text(form.fillin.as_deref().unwrap_or_default().trim().to_owned())
            }
            TaskKind::Unsupported { .. } => Answer::Unsupported,
        }
    }
}

/// Decide whether `answer` solves `task`.
#[must_use]
pub fn grade(task: &TaskDefinition, answer: &Answer) -> bool {
    match (task.kind(), answer) {
        (TaskKind::Mcq { correct, .. }, Answer::Choice(selected)) => *selected == Some(*correct),
        (TaskKind::Ordering { .. }, Answer::Blocks(submitted)) => {
            match task.kind().expected_order() {
                Some(expected) => submitted.iter().map(String::as_str).eq(expected),
                None => false,
            }
        }
        (TaskKind::Fill { pattern }, Answer::Text(text)) => pattern.is_full_match(text),
        _ => false,
    }
}

/// Parse `form` for the task's type and grade it.
#[must_use]
pub fn grade_form(task: &TaskDefinition, form: &SubmissionForm) -> bool {
    grade(task, &Answer::from_form(task.kind(), form))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq() -> TaskDefinition {
        TaskDefinition::new(TaskKind::mcq(vec!["a", "b", "c"], 2), None)
    }

    fn ordering() -> TaskDefinition {
        TaskDefinition::new(TaskKind::ordering(vec!["A", "B", "C"], vec![2, 0, 1]), None)
    }

    fn fill() -> TaskDefinition {
        TaskDefinition::new(TaskKind::fill(r"\d{3}").unwrap(), None)
    }

    #[test]
    fn mcq_matches_correct_index_only() {
        assert!(grade_form(&mcq(), &SubmissionForm::with_choice("2")));
        assert!(grade_form(&mcq(), &SubmissionForm::with_choice(" 2 ")));
        assert!(!grade_form(&mcq(), &SubmissionForm::with_choice("1")));
    }

    #[test]
    fn mcq_unparsable_choice_is_no_selection() {
        for raw in ["", "two", "-1", "2.0"] {
            let form = SubmissionForm::with_choice(raw);
            assert_eq!(Answer::from_form(mcq().kind(), &form), Answer::Choice(None));
            assert!(!grade_form(&mcq(), &form), "{raw:?}");
        }
        assert!(!grade_form(&mcq(), &SubmissionForm::default()));
    }

    #[test]
    fn ordering_requires_exact_sequence() {
        assert!(grade_form(&ordering(), &SubmissionForm::with_blocks("C||A||B")));
        assert!(!grade_form(&ordering(), &SubmissionForm::with_blocks("A||B||C")));
        assert!(!grade_form(&ordering(), &SubmissionForm::with_blocks("C||A")));
        assert!(!grade_form(&ordering(), &SubmissionForm::with_blocks("C||A||B||B")));
        assert!(!grade_form(&ordering(), &SubmissionForm::with_blocks("C || A || B")));
    }

    #[test]
    fn ordering_missing_field_is_single_empty_label() {
        let answer = Answer::from_form(ordering().kind(), &SubmissionForm::default());
        assert_eq!(answer, Answer::Blocks(vec![String::new()]));
        assert!(!grade(&ordering(), &answer));
    }

    #[test]
    fn fill_trims_and_matches_whole_string() {
        assert!(grade_form(&fill(), &SubmissionForm::with_fillin(" 123 ")));
        assert!(!grade_form(&fill(), &SubmissionForm::with_fillin("12")));
        assert!(!grade_form(&fill(), &SubmissionForm::with_fillin("1234")));
        assert!(!grade_form(&fill(), &SubmissionForm::default()));
    }

    #[test]
    fn mismatched_answer_shape_is_incorrect() {
        assert!(!grade(&mcq(), &Answer::Text("2".into())));
        assert!(!grade(&fill(), &Answer::Choice(Some(123))));
    }

    #[test]
    fn form_decodes_with_missing_fields() {
        let form: SubmissionForm = serde_json::from_str(r#"{"fillin": " 123 "}"#).unwrap();
        assert_eq!(form, SubmissionForm::with_fillin(" 123 "));
        assert!(grade_form(&fill(), &form));

        let empty: SubmissionForm = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SubmissionForm::default());
        assert!(!grade_form(&mcq(), &empty));
    }

    #[test]
    fn unsupported_type_is_never_correct() {
        let task = TaskDefinition::new(
            TaskKind::Unsupported {
                kind: "drawing".into(),
            },
            None,
        );
        let form = SubmissionForm {
            choice: Some("0".into()),
            block: Some("A".into()),
            fillin: Some("x".into()),
        };
        assert_eq!(Answer::from_form(task.kind(), &form), Answer::Unsupported);
        assert!(!grade_form(&task, &form));
    }
}
