//! The "mark complete" state transition.
//!
//! A task without a recurrence is closed: `completed_at` is stamped and the
//! task leaves the active list. A recurring task is re-armed instead: its due
//! field moves to the next occurrence and `completed_at` is reset to `None`
//! in the same write. A recurring task therefore never shows up as
//! completed; it keeps its id and only its due date moves.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::clock::Clock;
use crate::error::{StoreError, TaskError};
use crate::models::{Task, TaskPatch};
use crate::recurrence::{next_due, RecurrenceError};
use crate::storage::TaskStore;

/// How many times a completion is recomputed after losing a race with
/// another writer of the same task.
const MAX_ATTEMPTS: usize = 3;

/// Outcome of [`complete_task`].
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Non-recurring task, now closed.
    Closed { task: Task, completed_at: DateTime<Local> },
    /// Recurring task moved to its next occurrence, `completed_at` cleared.
    Rearmed { task: Task, next: NextDue },
}

/// The due field a re-armed task was advanced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextDue {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Marks task `id` complete.
///
/// Writes exactly one update on success and nothing on failure. The update
/// is conditional on the revision that was read, so two concurrent
/// completions of the same recurring task advance it twice rather than
/// overwriting each other.
pub fn complete_task<S>(store: &S, clock: &dyn Clock, id: u64) -> Result<Completion, TaskError>
where
    S: TaskStore + ?Sized,
{
    let mut attempt = 1;
    loop {
        let task = store.get_task(id)?;
        let (patch, outcome) = plan(&task, clock.now())?;
        match store.update_task(id, &patch) {
            Ok(updated) => {
                let completion = match outcome {
                    Outcome::Closed(completed_at) => {
                        tracing::info!(task_id = id, "task completed");
                        Completion::Closed { task: updated, completed_at }
                    }
                    Outcome::Rearmed(next) => {
                        tracing::info!(
                            task_id = id,
                            next = ?next,
                            recurrence = %updated.recurrence,
                            "recurring task re-armed"
                        );
                        Completion::Rearmed { task: updated, next }
                    }
                };
                return Ok(completion);
            }
            Err(StoreError::Conflict(_)) if attempt < MAX_ATTEMPTS => {
                tracing::debug!(task_id = id, attempt, "completion raced another update, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

enum Outcome {
    Closed(DateTime<Local>),
    Rearmed(NextDue),
}

/// Works out the single update for completing `task` at `now`.
fn plan(task: &Task, now: DateTime<Local>) -> Result<(TaskPatch, Outcome), TaskError> {
    let mut patch = TaskPatch {
        expected_revision: Some(task.revision),
        ..Default::default()
    };

    if !task.is_recurring() {
        patch.completed_at = Some(Some(now));
        return Ok((patch, Outcome::Closed(now)));
    }

    let anchor = task.due_anchor().ok_or(RecurrenceError::MissingDue)?;
    let next = next_due(&task.recurrence, Some(anchor), now.naive_local())?
        .ok_or(RecurrenceError::MissingDue)?;

    let next = if task.due_datetime.is_some() {
        patch.due_datetime = Some(Some(next));
        NextDue::DateTime(next)
    } else {
        patch.due_date = Some(Some(next.date()));
        NextDue::Date(next.date())
    };
    // Re-arming: the task stays open.
    patch.completed_at = Some(None);
    Ok((patch, Outcome::Rearmed(next)))
}
