use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::models::{NewTask, Note, Project, Task, TaskFilter, TaskPatch};

/// What the completion logic needs from persistence.
pub trait TaskStore {
    /// Loads a single task by its ID.
    fn get_task(&self, id: u64) -> Result<Task, StoreError>;

    /// Applies `patch` to the stored task and returns the result.
    ///
    /// Fails with [`StoreError::Conflict`] if `patch.expected_revision` is set
    /// and no longer matches.
    fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, StoreError>;
}

#[derive(Clone, Default)]
struct Tables {
    tasks: Vec<Task>,
    projects: Vec<Project>,
    notes: Vec<Note>,
}

/// JSON-file database: `tasks.json`, with `projects.json` and `notes.json`
/// in the same directory.
///
/// Tables are held in memory and every mutation rewrites the changed files
/// before it becomes visible.
pub struct JsonStore {
    tasks_path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonStore {
    /// Opens the database rooted at `tasks_path`, creating its directory if
    /// needed. Missing files are empty tables.
    pub fn open(tasks_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let tasks_path = tasks_path.into();
        if let Some(dir) = tasks_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let tables = Tables {
            tasks: load_table(&tasks_path)?,
            projects: load_table(&sibling(&tasks_path, "projects.json"))?,
            notes: load_table(&sibling(&tasks_path, "notes.json"))?,
        };
        tracing::debug!(
            path = %tasks_path.display(),
            tasks = tables.tasks.len(),
            projects = tables.projects.len(),
            notes = tables.notes.len(),
            "opened database"
        );
        Ok(Self { tasks_path, tables: Mutex::new(tables) })
    }

    pub fn path(&self) -> &Path {
        &self.tasks_path
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `f` on a copy of the tables and commits the copy only if `f`
    /// succeeds and every changed file was written.
    ///
    /// Only tables that `f` changed are written. Each is staged to a `.tmp`
    /// file and renamed into place once all of them are staged.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;

        let mut staged = Vec::new();
        if let Err(e) = self.stage_changes(&guard, &next, &mut staged) {
            discard(&staged);
            return Err(e);
        }
        for (i, (tmp, path)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(tmp, path) {
                discard(&staged[i..]);
                return Err(e.into());
            }
        }
        *guard = next;
        tracing::debug!(
            path = %self.tasks_path.display(),
            files = staged.len(),
            "saved database"
        );
        Ok(out)
    }

    fn stage_changes(
        &self,
        current: &Tables,
        next: &Tables,
        staged: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<(), StoreError> {
        if next.tasks != current.tasks {
            staged.push(stage_table(self.tasks_path.clone(), &next.tasks)?);
        }
        if next.projects != current.projects {
            let path = sibling(&self.tasks_path, "projects.json");
            staged.push(stage_table(path, &next.projects)?);
        }
        if next.notes != current.notes {
            let path = sibling(&self.tasks_path, "notes.json");
            staged.push(stage_table(path, &next.notes)?);
        }
        Ok(())
    }

    /// Tasks matching `filter`, soonest due first; undated tasks last.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .lock()
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| match (a.due_anchor(), b.due_anchor()) {
            (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });
        tasks
    }

    pub fn create_task(
        &self,
        new: NewTask,
        created_at: DateTime<Local>,
    ) -> Result<Task, StoreError> {
        self.mutate(|t| {
            let id = t.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
            let task = Task {
                id,
                description: new.description,
                project_id: new.project_id,
                labels: new.labels,
                due_date: new.due_date,
                due_datetime: new.due_datetime,
                recurrence: new.recurrence,
                completed_at: None,
                created_at,
                revision: 0,
            };
            t.tasks.push(task.clone());
            Ok(task)
        })
    }

    /// Removes a task. Notes that pointed at it are detached.
    pub fn delete_task(&self, id: u64) -> Result<(), StoreError> {
        self.mutate(|t| {
            let len_before = t.tasks.len();
            t.tasks.retain(|task| task.id != id);
            if t.tasks.len() == len_before {
                return Err(StoreError::NotFound { kind: "task", id });
            }
            for note in t.notes.iter_mut().filter(|n| n.task_id == Some(id)) {
                note.task_id = None;
            }
            Ok(())
        })
    }

    /// Projects ordered by name.
    pub fn list_projects(&self) -> Vec<Project> {
        let mut projects = self.lock().projects.clone();
        projects.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        projects
    }

    pub fn get_project(&self, id: u64) -> Result<Project, StoreError> {
        self.lock()
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "project", id })
    }

    pub fn create_project(&self, name: String) -> Result<Project, StoreError> {
        self.mutate(|t| {
            let id = t.projects.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            let project = Project { id, name };
            t.projects.push(project.clone());
            Ok(project)
        })
    }

    pub fn rename_project(&self, id: u64, name: String) -> Result<Project, StoreError> {
        self.mutate(|t| {
            let project = t
                .projects
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or(StoreError::NotFound { kind: "project", id })?;
            project.name = name;
            Ok(project.clone())
        })
    }

    /// Removes a project. Its tasks stay, without a project.
    pub fn delete_project(&self, id: u64) -> Result<(), StoreError> {
        self.mutate(|t| {
            let len_before = t.projects.len();
            t.projects.retain(|p| p.id != id);
            if t.projects.len() == len_before {
                return Err(StoreError::NotFound { kind: "project", id });
            }
            for task in t.tasks.iter_mut().filter(|task| task.project_id == Some(id)) {
                task.project_id = None;
                task.revision += 1;
            }
            Ok(())
        })
    }

    /// Notes in creation order, optionally only those attached to `task_id`.
    pub fn list_notes(&self, task_id: Option<u64>) -> Vec<Note> {
        self.lock()
            .notes
            .iter()
            .filter(|n| task_id.is_none() || n.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn create_note(
        &self,
        content: String,
        task_id: Option<u64>,
        created_at: DateTime<Local>,
    ) -> Result<Note, StoreError> {
        self.mutate(|t| {
            if let Some(task_id) = task_id {
                if !t.tasks.iter().any(|task| task.id == task_id) {
                    return Err(StoreError::NotFound { kind: "task", id: task_id });
                }
            }
            let id = t.notes.iter().map(|n| n.id).max().unwrap_or(0) + 1;
            let note = Note { id, content, task_id, created_at };
            t.notes.push(note.clone());
            Ok(note)
        })
    }

    pub fn update_note(&self, id: u64, content: String) -> Result<Note, StoreError> {
        self.mutate(|t| {
            let note = t
                .notes
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or(StoreError::NotFound { kind: "note", id })?;
            note.content = content;
            Ok(note.clone())
        })
    }

    pub fn delete_note(&self, id: u64) -> Result<(), StoreError> {
        self.mutate(|t| {
            let len_before = t.notes.len();
            t.notes.retain(|n| n.id != id);
            if t.notes.len() == len_before {
                return Err(StoreError::NotFound { kind: "note", id });
            }
            Ok(())
        })
    }
}

impl TaskStore for JsonStore {
    fn get_task(&self, id: u64) -> Result<Task, StoreError> {
        self.lock()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "task", id })
    }

    fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, StoreError> {
        self.mutate(|t| {
            let task = t
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(StoreError::NotFound { kind: "task", id })?;
            if let Some(expected) = patch.expected_revision {
                if task.revision != expected {
                    return Err(StoreError::Conflict(id));
                }
            }
            patch.apply(task);
            task.revision += 1;
            Ok(task.clone())
        })
    }
}

/// Returns the path of another table file next to `tasks_path`.
fn sibling(tasks_path: &Path, file_name: &str) -> PathBuf {
    let mut p = tasks_path.to_path_buf();
    p.pop();
    p.push(file_name);
    p
}

/// Loads a table from a JSON file. A missing file is an empty table.
fn load_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let mut f = match OpenOptions::new().read(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&s)?)
}

/// Writes a table to `<path>.tmp` and returns the `(tmp, path)` pair to
/// rename once every table is staged.
fn stage_table<T: Serialize>(
    path: PathBuf,
    rows: &[T],
) -> Result<(PathBuf, PathBuf), StoreError> {
    let s = serde_json::to_string_pretty(rows)?;
    let mut tmp = path.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    f.write_all(s.as_bytes())?;
    Ok((tmp, path))
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}
