use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::LevelId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Problems found while loading the task catalog.
///
/// All of these are fatal at startup: a catalog that fails validation is
/// never served.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid level key {0:?}: expected a positive integer")]
    InvalidLevelKey(String),

    #[error("level {0} appears more than once")]
    DuplicateLevel(LevelId),

    #[error("level numbers must be contiguous from 1; level {0} is missing")]
    MissingLevel(LevelId),

    #[error("level {level} task {idx}: invalid {kind} payload: {source}")]
    InvalidPayload {
        level: LevelId,
        idx: usize,
        kind: String,
        source: serde_json::Error,
    },

    #[error("level {level} task {idx}: correct choice {correct} is out of range ({choices} choices)")]
    ChoiceOutOfRange {
        level: LevelId,
        idx: usize,
        correct: usize,
        choices: usize,
    },

    #[error("level {level} task {idx}: invalid block index {key:?}")]
    InvalidBlockKey {
        level: LevelId,
        idx: usize,
        key: String,
    },

    #[error("level {level} task {idx}: correct_order references missing block {block}")]
    MissingBlock {
        level: LevelId,
        idx: usize,
        block: usize,
    },

    #[error("level {level} task {idx}: invalid answer_regex: {source}")]
    InvalidPattern {
        level: LevelId,
        idx: usize,
        source: regex::Error,
    },
}

//
// ─── ANSWER PATTERN ────────────────────────────────────────────────────────────
//

/// A `fill` answer regex compiled for whole-string matching.
#[derive(Clone)]
pub struct AnswerPattern {
    source: String,
    anchored: Regex,
}

impl AnswerPattern {
    /// Compile `source` so that it only matches an entire input.
    ///
    /// The pattern must compile on its own before it is wrapped in anchors,
    /// so unbalanced groups are rejected instead of being absorbed by the
    /// wrapper.
    ///
    /// # Errors
    ///
    /// Returns `regex::Error` if the pattern does not compile.
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        Regex::new(&source)?;
        let anchored = match Regex::new(&format!(r"\A(?:{source})\z")) {
            Ok(anchored) => anchored,
            // A trailing `#` comment under `(?x)` runs to end of line and
            // swallows the closing group; the newline ends the comment and
            // is ignored as verbose-mode whitespace.
            Err(_) => Regex::new(&format!("\\A(?:{source}\n)\\z"))?,
        };
        Ok(Self { source, anchored })
    }

    /// The pattern as written in the catalog.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_full_match(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }
}

impl fmt::Debug for AnswerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnswerPattern({:?})", self.source)
    }
}

impl PartialEq for AnswerPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

//
// ─── TASKS ─────────────────────────────────────────────────────────────────────
//

/// Grading data for a task, one variant per task type.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    /// Multiple choice: `correct` indexes into `choices`.
    Mcq { choices: Vec<String>, correct: usize },
    /// Block ordering: the expected sequence is `correct_order` resolved
    /// against `blocks`.
    Ordering {
        blocks: BTreeMap<usize, String>,
        correct_order: Vec<usize>,
    },
    /// Free text checked against a whole-string regex.
    Fill { pattern: AnswerPattern },
    /// A `type` tag this build does not know. Never graded correct.
    Unsupported { kind: String },
}

impl TaskKind {
    /// Build a fill task kind from a raw regex.
    ///
    /// # Errors
    ///
    /// Returns `regex::Error` if the pattern does not compile.
    pub fn fill(answer_regex: &str) -> Result<Self, regex::Error> {
        Ok(Self::Fill {
            pattern: AnswerPattern::new(answer_regex)?,
        })
    }

    /// Build an ordering task kind from block labels listed by index.
    #[must_use]
    pub fn ordering<S: Into<String>>(blocks: Vec<S>, correct_order: Vec<usize>) -> Self {
        Self::Ordering {
            blocks: blocks.into_iter().map(Into::into).enumerate().collect(),
            correct_order,
        }
    }

    #[must_use]
    pub fn mcq<S: Into<String>>(choices: Vec<S>, correct: usize) -> Self {
        Self::Mcq {
            choices: choices.into_iter().map(Into::into).collect(),
            correct,
        }
    }

    /// The catalog `type` tag.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        match self {
            TaskKind::Mcq { .. } => "mcq",
            TaskKind::Ordering { .. } => "ordering",
            TaskKind::Fill { .. } => "fill",
            TaskKind::Unsupported { kind } => kind.as_str(),
        }
    }

    /// Expected label sequence for an ordering task.
    ///
    /// Returns `None` for other kinds, or if an index has no block (which a
    /// validated catalog rules out).
    #[must_use]
    pub fn expected_order(&self) -> Option<Vec<&str>> {
        match self {
            TaskKind::Ordering {
                blocks,
                correct_order,
            } => correct_order
                .iter()
                .map(|i| blocks.get(i).map(String::as_str))
                .collect(),
            _ => None,
        }
    }
}

/// A single exercise in a level.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    kind: TaskKind,
    video: Option<String>,
}

impl TaskDefinition {
    #[must_use]
    pub fn new(kind: TaskKind, video: Option<String>) -> Self {
        Self { kind, video }
    }

    #[must_use]
    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Video reference shown with the task. Opaque to grading.
    #[must_use]
    pub fn video(&self) -> Option<&str> {
        self.video.as_deref()
    }
}

/// An ordered group of tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDefinition {
    title: String,
    tasks: Vec<TaskDefinition>,
}

impl LevelDefinition {
    #[must_use]
    pub fn new(title: impl Into<String>, tasks: Vec<TaskDefinition>) -> Self {
        Self {
            title: title.into(),
            tasks,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn task(&self, idx: usize) -> Option<&TaskDefinition> {
        self.tasks.get(idx)
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Immutable mapping from level number to level definition.
///
/// Level numbers are contiguous starting at 1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    levels: BTreeMap<LevelId, LevelDefinition>,
}

impl Catalog {
    /// Parse and validate a catalog from its JSON source.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for malformed JSON, bad level keys, gaps in
    /// the level numbering, or task payloads that do not fit their type.
    pub fn from_json_str(source: &str) -> Result<Self, CatalogError> {
        let raw: BTreeMap<String, RawLevel> = serde_json::from_str(source)?;

        let mut levels = BTreeMap::new();
        for (key, raw_level) in raw {
            let level = parse_level_key(&key)?;
            let tasks = raw_level
                .tasks
                .into_iter()
                .enumerate()
                .map(|(idx, task)| task.into_definition(level, idx))
                .collect::<Result<Vec<_>, _>>()?;
            let definition = LevelDefinition::new(raw_level.title, tasks);
            if levels.insert(level, definition).is_some() {
                return Err(CatalogError::DuplicateLevel(level));
            }
        }

        Self::from_levels(levels)
    }

    /// Build a catalog from already-typed levels.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if numbering has gaps or a task payload is
    /// internally inconsistent.
    pub fn from_levels(levels: BTreeMap<LevelId, LevelDefinition>) -> Result<Self, CatalogError> {
        for (expected, (level, definition)) in (1_u32..).zip(&levels) {
            if level.value() != expected {
                return Err(CatalogError::MissingLevel(LevelId::new(expected)));
            }
            for (idx, task) in definition.tasks().iter().enumerate() {
                check_task(*level, idx, task.kind())?;
            }
        }
        Ok(Self { levels })
    }

    #[must_use]
    pub fn level(&self, id: LevelId) -> Option<&LevelDefinition> {
        self.levels.get(&id)
    }

    #[must_use]
    pub fn task(&self, level: LevelId, idx: usize) -> Option<&TaskDefinition> {
        self.level(level).and_then(|l| l.task(idx))
    }

    /// Levels in ascending order.
    pub fn levels(&self) -> impl Iterator<Item = (LevelId, &LevelDefinition)> {
        self.levels.iter().map(|(id, level)| (*id, level))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[must_use]
    pub fn total_tasks(&self) -> usize {
        self.levels.values().map(LevelDefinition::task_count).sum()
    }
}

fn parse_level_key(key: &str) -> Result<LevelId, CatalogError> {
    match key.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(LevelId::new(n)),
        _ => Err(CatalogError::InvalidLevelKey(key.to_owned())),
    }
}

fn check_task(level: LevelId, idx: usize, kind: &TaskKind) -> Result<(), CatalogError> {
    match kind {
        TaskKind::Mcq { choices, correct } if *correct >= choices.len() => {
            Err(CatalogError::ChoiceOutOfRange {
                level,
                idx,
                correct: *correct,
                choices: choices.len(),
            })
        }
        TaskKind::Ordering {
            blocks,
            correct_order,
        } => match correct_order.iter().find(|i| !blocks.contains_key(i)) {
            Some(missing) => Err(CatalogError::MissingBlock {
                level,
                idx,
                block: *missing,
            }),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

//
// ─── JSON SHAPE ────────────────────────────────────────────────────────────────
//

#[derive(Deserialize)]
struct RawLevel {
    title: String,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Deserialize)]
struct RawTask {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    video: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct RawMcq {
    #[serde(default)]
    choices: Vec<String>,
    correct: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBlocks {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

#[derive(Deserialize)]
struct RawOrdering {
    blocks: RawBlocks,
    correct_order: Vec<usize>,
}

#[derive(Deserialize)]
struct RawFill {
    answer_regex: String,
}

impl RawTask {
    fn into_definition(self, level: LevelId, idx: usize) -> Result<TaskDefinition, CatalogError> {
        let payload_err = |kind: &str, source| CatalogError::InvalidPayload {
            level,
            idx,
            kind: kind.to_owned(),
            source,
        };

        let kind = match self.kind.as_str() {
            "mcq" => {
                let raw: RawMcq =
                    serde_json::from_value(self.payload).map_err(|e| payload_err("mcq", e))?;
                TaskKind::Mcq {
                    choices: raw.choices,
                    correct: raw.correct,
                }
            }
            "ordering" => {
                let raw: RawOrdering = serde_json::from_value(self.payload)
                    .map_err(|e| payload_err("ordering", e))?;
                let blocks = match raw.blocks {
                    RawBlocks::List(list) => list.into_iter().enumerate().collect(),
                    RawBlocks::Map(map) => map
                        .into_iter()
                        .map(|(key, text)| match key.trim().parse::<usize>() {
                            Ok(i) => Ok((i, text)),
                            Err(_) => Err(CatalogError::InvalidBlockKey { level, idx, key }),
                        })
                        .collect::<Result<BTreeMap<_, _>, _>>()?,
                };
                TaskKind::Ordering {
                    blocks,
                    correct_order: raw.correct_order,
                }
            }
            "fill" => {
                let raw: RawFill =
                    serde_json::from_value(self.payload).map_err(|e| payload_err("fill", e))?;
                let pattern = AnswerPattern::new(raw.answer_regex)
                    .map_err(|source| CatalogError::InvalidPattern { level, idx, source })?;
                TaskKind::Fill { pattern }
            }
            other => TaskKind::Unsupported {
                kind: other.to_owned(),
            },
        };

        Ok(TaskDefinition::new(kind, self.video))
    }
}
