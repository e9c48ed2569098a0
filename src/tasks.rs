//! Validated task creation and editing.
//!
//! Both the CLI and the HTTP API go through here so that a task can never be
//! stored with a recurrence it cannot advance.

use crate::clock::Clock;
use crate::error::TaskError;
use crate::models::{NewTask, Task, TaskPatch};
use crate::recurrence::validate_task_recurrence;
use crate::storage::{JsonStore, TaskStore};

pub fn create_task(
    store: &JsonStore,
    clock: &dyn Clock,
    mut new: NewTask,
) -> Result<Task, TaskError> {
    new.description = new.description.trim().to_string();
    new.recurrence = new.recurrence.trim().to_string();
    if new.description.is_empty() {
        return Err(TaskError::Invalid("description must not be empty".into()));
    }
    if let Some(project_id) = new.project_id {
        require_project(store, project_id)?;
    }
    let now = clock.now();
    validate_task_recurrence(&new.recurrence, new.due_date, new.due_datetime, now.naive_local())?;

    let task = store.create_task(new, now)?;
    tracing::info!(task_id = task.id, recurrence = %task.recurrence, "task created");
    Ok(task)
}

/// Applies a partial edit. The merged task is validated as a whole, so
/// clearing the only due field of a recurring task is rejected.
///
/// A task that ends up recurring never keeps a completion mark, whether it
/// was closed before the edit or the patch tries to set one.
pub fn edit_task(
    store: &JsonStore,
    clock: &dyn Clock,
    id: u64,
    mut patch: TaskPatch,
) -> Result<Task, TaskError> {
    let current = store.get_task(id)?;

    if let Some(d) = &mut patch.description {
        *d = d.trim().to_string();
        if d.is_empty() {
            return Err(TaskError::Invalid("description must not be empty".into()));
        }
    }
    if let Some(r) = &mut patch.recurrence {
        *r = r.trim().to_string();
    }
    if let Some(Some(project_id)) = patch.project_id {
        require_project(store, project_id)?;
    }

    let mut merged = current.clone();
    patch.apply(&mut merged);
    validate_task_recurrence(
        &merged.recurrence,
        merged.due_date,
        merged.due_datetime,
        clock.now().naive_local(),
    )?;
    if merged.is_recurring() && merged.completed_at.is_some() {
        patch.completed_at = Some(None);
    }

    patch.expected_revision = Some(current.revision);
    let task = store.update_task(id, &patch)?;
    tracing::info!(task_id = id, "task updated");
    Ok(task)
}

fn require_project(store: &JsonStore, id: u64) -> Result<(), TaskError> {
    store
        .get_project(id)
        .map(|_| ())
        .map_err(|_| TaskError::Invalid(format!("project {id} does not exist")))
}
