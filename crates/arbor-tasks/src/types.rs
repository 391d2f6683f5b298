//! Domain types shared by the repositories, the relocator, and the tree
//! assembler.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Store-assigned, monotonically increasing task identifier.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Wrap a raw row id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw row id.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl ToSql for TaskId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for TaskId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self)
    }
}

/// Kind of task. A lane is an abstract grouping node (like a project) that
/// is not itself completed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Plain task that can be done.
    #[default]
    Task,
    /// Grouping node.
    Lane,
}

impl TaskType {
    /// Value stored in the `tasks.type` column.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Lane => "lane",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for TaskType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "lane" => Ok(Self::Lane),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// A task row. Carries no tree information; see [`crate::tree::TaskNode`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task ID.
    pub id: TaskId,
    /// Non-empty title.
    pub title: String,
    /// Plain task or lane.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// When the task was completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Start of the activation window.
    pub starts_at: Option<DateTime<Utc>>,
    /// End of the activation window.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// One row of the closure table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRelation {
    /// Ancestor side of the pair.
    pub ancestor_id: TaskId,
    /// Descendant side of the pair.
    pub descendant_id: TaskId,
    /// Edge count plus one; 1 is the self-relation.
    pub path_length: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Single-field update applied by [`crate::TaskStore::update_task_field`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskField {
    /// Set `completed_at`.
    CompletedAt(DateTime<Utc>),
    /// Replace the title.
    Title(String),
    /// Change the task type.
    Type(TaskType),
    /// Set or clear `starts_at`.
    StartsAt(Option<DateTime<Utc>>),
    /// Set or clear `expires_at`.
    ExpiresAt(Option<DateTime<Utc>>),
}

impl TaskField {
    /// Column this update writes.
    pub fn column(&self) -> &'static str {
        match self {
            Self::CompletedAt(_) => "completed_at",
            Self::Title(_) => "title",
            Self::Type(_) => "type",
            Self::StartsAt(_) => "starts_at",
            Self::ExpiresAt(_) => "expires_at",
        }
    }
}
