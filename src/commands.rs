use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::clock::Clock;
use crate::completion::{complete_task, Completion, NextDue};
use crate::error::TaskError;
use crate::models::{NewTask, Task, TaskFilter, TaskPatch};
use crate::recurrence::{next_due, Recurrence};
use crate::storage::JsonStore;
use crate::tasks::{create_task, edit_task};

/// Adds a new task to the database and returns its id.
///
/// `due` is a date (`YYYY-MM-DD`); `at` is a date and time
/// (`YYYY-MM-DD HH:MM`). A recurring task needs one of them.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    store: &JsonStore,
    clock: &dyn Clock,
    description: String,
    project: Option<u64>,
    labels: Vec<String>,
    due: Option<String>,
    at: Option<String>,
    recur: Option<String>,
    silent: bool,
) -> Result<u64, TaskError> {
    let new = NewTask {
        description,
        project_id: project,
        labels,
        due_date: due.as_deref().map(parse_date).transpose()?,
        due_datetime: at.as_deref().map(parse_datetime).transpose()?,
        recurrence: recur.unwrap_or_default(),
    };
    let task = create_task(store, clock, new)?;
    if !silent { println!("Task added (id = {})", task.id); }
    Ok(task.id)
}

/// Marks a task as complete by ID.
///
/// A recurring task is not closed: it stays open with its due date moved to
/// the next occurrence.
pub fn cmd_complete(
    store: &JsonStore,
    clock: &dyn Clock,
    id: u64,
    silent: bool,
) -> Result<(), TaskError> {
    match complete_task(store, clock, id)? {
        Completion::Closed { .. } => {
            if !silent { println!("Task {} marked as complete.", id); }
        }
        Completion::Rearmed { next, .. } => {
            if !silent {
                println!("Task {} is recurring, next due on {}", id, format_next(next));
            }
        }
    }
    Ok(())
}

/// Removes a task from the database by ID.
pub fn cmd_remove(store: &JsonStore, id: u64, silent: bool) -> Result<(), TaskError> {
    store.delete_task(id)?;
    tracing::info!(task_id = id, "task deleted");
    if !silent { println!("Task {} removed.", id); }
    Ok(())
}

/// Edits an existing task's details.
///
/// `project`, `due` and `at` accept `none` to clear the field.
#[allow(clippy::too_many_arguments)]
pub fn cmd_edit(
    store: &JsonStore,
    clock: &dyn Clock,
    id: u64,
    description: Option<String>,
    project: Option<String>,
    labels: Option<Vec<String>>,
    due: Option<String>,
    at: Option<String>,
    recur: Option<String>,
    silent: bool,
) -> Result<(), TaskError> {
    let patch = TaskPatch {
        description,
        project_id: project.as_deref().map(parse_optional(parse_id)).transpose()?,
        labels,
        due_date: due.as_deref().map(parse_optional(parse_date)).transpose()?,
        due_datetime: at.as_deref().map(parse_optional(parse_datetime)).transpose()?,
        recurrence: recur,
        ..Default::default()
    };
    edit_task(store, clock, id, patch)?;
    if !silent { println!("Task {} updated.", id); }
    Ok(())
}

/// Shows how an expression is read and when it next falls due after `from`
/// (default: now).
pub fn cmd_next(
    clock: &dyn Clock,
    expression: &str,
    from: Option<String>,
) -> Result<(), TaskError> {
    let anchor = match from.as_deref() {
        Some(s) => match parse_datetime(s) {
            Ok(dt) => dt,
            Err(_) => parse_date(s)?.and_time(NaiveTime::MIN),
        },
        None => clock.now().naive_local(),
    };
    let Some(next) = next_due(expression, Some(anchor), anchor)? else {
        println!("No recurrence.");
        return Ok(());
    };
    let rule = Recurrence::parse(expression)?;
    println!("{} -> {}", rule, next.format("%Y-%m-%d %H:%M (%a)"));
    Ok(())
}

/// Lists tasks in a formatted table, soonest due first.
///
/// By default, hides completed tasks unless `all` is true.
pub fn cmd_list(
    store: &JsonStore,
    clock: &dyn Clock,
    all: bool,
    project: Option<u64>,
    label: Option<String>,
) {
    let filter = TaskFilter { project_id: project, label, include_completed: all };
    let tasks = store.list_tasks(&filter);
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    let projects = store.list_projects();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Description").add_attribute(Attribute::Bold),
            Cell::new("Project").add_attribute(Attribute::Bold),
            Cell::new("Labels").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Time Left").add_attribute(Attribute::Bold),
            Cell::new("Repeats").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    let today = clock.now().date_naive();

    for t in tasks {
        let project_name = t
            .project_id
            .and_then(|id| projects.iter().find(|p| p.id == id))
            .map(|p| p.name.clone())
            .unwrap_or_default();

        let (time_left_str, overdue) = match t.due_anchor() {
            Some(due) => {
                let days_left = (due.date() - today).num_days();
                let s = if days_left < 0 {
                    format!("{}d overdue", days_left.abs())
                } else if days_left == 0 {
                    "Today".to_string()
                } else {
                    format!("{}d", days_left)
                };
                (s, days_left < 0)
            }
            None => ("-".to_string(), false),
        };

        let status = if t.is_completed() { "Done" } else { "Pending" };
        let status_color = if t.is_completed() { Color::Green } else { Color::Yellow };
        let time_left_color = if overdue && !t.is_completed() { Color::Red } else { Color::Reset };

        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.description),
            Cell::new(project_name),
            Cell::new(t.labels.join(", ")),
            Cell::new(format_due(&t)),
            Cell::new(time_left_str).fg(time_left_color),
            Cell::new(if t.is_recurring() { t.recurrence.as_str() } else { "-" }),
            Cell::new(status).fg(status_color),
        ]);
    }

    println!("{table}");
}

/// Adds a new project.
pub fn cmd_project_add(store: &JsonStore, name: String, silent: bool) -> Result<u64, TaskError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(TaskError::Invalid("project name must not be empty".into()));
    }
    let project = store.create_project(name)?;
    tracing::info!(project_id = project.id, "project created");
    if !silent { println!("Project '{}' added (id = {})", project.name, project.id); }
    Ok(project.id)
}

/// Lists all projects.
pub fn cmd_project_list(store: &JsonStore) {
    let projects = store.list_projects();
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL)
        .set_header(vec!["ID", "Name"]);
    for p in projects {
        table.add_row(vec![p.id.to_string(), p.name]);
    }
    println!("{table}");
}

pub fn cmd_project_rename(
    store: &JsonStore,
    id: u64,
    name: String,
    silent: bool,
) -> Result<(), TaskError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(TaskError::Invalid("project name must not be empty".into()));
    }
    store.rename_project(id, name)?;
    if !silent { println!("Project {} renamed.", id); }
    Ok(())
}

/// Removes a project. Tasks in it are kept without a project.
pub fn cmd_project_remove(store: &JsonStore, id: u64, silent: bool) -> Result<(), TaskError> {
    store.delete_project(id)?;
    tracing::info!(project_id = id, "project deleted");
    if !silent { println!("Project {} removed.", id); }
    Ok(())
}

pub fn cmd_note_add(
    store: &JsonStore,
    clock: &dyn Clock,
    content: String,
    task: Option<u64>,
    silent: bool,
) -> Result<u64, TaskError> {
    if content.trim().is_empty() {
        return Err(TaskError::Invalid("note content must not be empty".into()));
    }
    let note = store.create_note(content, task, clock.now())?;
    if !silent { println!("Note added (id = {})", note.id); }
    Ok(note.id)
}

/// Lists notes, optionally only those attached to one task.
pub fn cmd_note_list(store: &JsonStore, task: Option<u64>) {
    let notes = store.list_notes(task);
    if notes.is_empty() {
        println!("No notes found.");
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Task", "Created", "Content"]);
    for n in notes {
        table.add_row(vec![
            n.id.to_string(),
            n.task_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            n.created_at.format("%Y-%m-%d %H:%M").to_string(),
            n.content,
        ]);
    }
    println!("{table}");
}

pub fn cmd_note_edit(
    store: &JsonStore,
    id: u64,
    content: String,
    silent: bool,
) -> Result<(), TaskError> {
    if content.trim().is_empty() {
        return Err(TaskError::Invalid("note content must not be empty".into()));
    }
    store.update_note(id, content)?;
    if !silent { println!("Note {} updated.", id); }
    Ok(())
}

pub fn cmd_note_remove(store: &JsonStore, id: u64, silent: bool) -> Result<(), TaskError> {
    store.delete_note(id)?;
    if !silent { println!("Note {} removed.", id); }
    Ok(())
}

fn format_due(task: &Task) -> String {
    match (task.due_datetime, task.due_date) {
        (Some(dt), _) => dt.format("%Y-%m-%d %H:%M").to_string(),
        (None, Some(d)) => d.to_string(),
        (None, None) => "-".to_string(),
    }
}

fn format_next(next: NextDue) -> String {
    match next {
        NextDue::Date(d) => d.to_string(),
        NextDue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, TaskError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
        TaskError::Invalid(format!("Invalid due date '{}': {}. Use YYYY-MM-DD.", s, e))
    })
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, TaskError> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| {
            TaskError::Invalid(format!("Invalid due time '{}'. Use \"YYYY-MM-DD HH:MM\".", s))
        })
}

fn parse_id(s: &str) -> Result<u64, TaskError> {
    s.trim()
        .parse()
        .map_err(|_| TaskError::Invalid(format!("Invalid id '{}'.", s)))
}

/// Wraps a field parser so that `none` clears the field.
fn parse_optional<T>(
    parse: fn(&str) -> Result<T, TaskError>,
) -> impl Fn(&str) -> Result<Option<T>, TaskError> {
    move |s: &str| {
        if s.trim().eq_ignore_ascii_case("none") {
            Ok(None)
        } else {
            parse(s).map(Some)
        }
    }
}
