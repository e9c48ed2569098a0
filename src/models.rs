use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Represents a single task in the task manager.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique identifier for the task.
    pub id: u64,
    /// What needs doing.
    pub description: String,
    /// Project the task belongs to, if any.
    #[serde(default)]
    pub project_id: Option<u64>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Date-only due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Due date with a time of day, in the local time zone.
    #[serde(default)]
    pub due_datetime: Option<NaiveDateTime>,
    /// Recurrence expression (e.g. "daily", "mon,wed,fri", "15", "25 dec").
    /// Empty means the task does not repeat.
    #[serde(default)]
    pub recurrence: String,
    /// When the task was closed. Always `None` for recurring tasks.
    #[serde(default)]
    pub completed_at: Option<DateTime<Local>>,
    /// Timestamp when the task was created.
    pub created_at: DateTime<Local>,
    /// Bumped on every update.
    #[serde(default)]
    pub revision: u64,
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        !self.recurrence.trim().is_empty()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// The instant the task is due: `due_datetime` if set, otherwise the
    /// start of `due_date`.
    pub fn due_anchor(&self) -> Option<NaiveDateTime> {
        self.due_datetime
            .or_else(|| self.due_date.and_then(|d| d.and_hms_opt(0, 0, 0)))
    }
}

/// Fields for a task that has not been stored yet.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct NewTask {
    pub description: String,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_datetime: Option<NaiveDateTime>,
    #[serde(default)]
    pub recurrence: String,
}

/// Partial update of a task. Only `Some` fields are written; the nullable
/// columns use a nested `Option` so they can be cleared.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TaskPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "double_option")]
    pub project_id: Option<Option<u64>>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default, with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, with = "double_option")]
    pub due_datetime: Option<Option<NaiveDateTime>>,
    #[serde(default)]
    pub recurrence: Option<String>,
    #[serde(default, with = "double_option")]
    pub completed_at: Option<Option<DateTime<Local>>>,
    /// Reject the update unless the stored revision still matches.
    #[serde(skip)]
    pub expected_revision: Option<u64>,
}

impl TaskPatch {
    /// Writes the patch over `task`. Does not touch `revision`.
    pub fn apply(&self, task: &mut Task) {
        if let Some(d) = &self.description { task.description = d.clone(); }
        if let Some(p) = self.project_id { task.project_id = p; }
        if let Some(l) = &self.labels { task.labels = l.clone(); }
        if let Some(d) = self.due_date { task.due_date = d; }
        if let Some(d) = self.due_datetime { task.due_datetime = d; }
        if let Some(r) = &self.recurrence { task.recurrence = r.clone(); }
        if let Some(c) = self.completed_at { task.completed_at = c; }
    }
}

/// A project groups tasks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

/// A free-text note, optionally attached to a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Note {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub task_id: Option<u64>,
    pub created_at: DateTime<Local>,
}

/// Filter for listing tasks.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TaskFilter {
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub include_completed: bool,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if !self.include_completed && task.is_completed() {
            return false;
        }
        if self.project_id.is_some() && task.project_id != self.project_id {
            return false;
        }
        match &self.label {
            Some(label) => task.labels.iter().any(|l| l.eq_ignore_ascii_case(label)),
            None => true,
        }
    }
}

/// Distinguishes a missing JSON field (`None`) from an explicit `null`
/// (`Some(None)`).
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
