use std::cell::Cell;
use std::env;
use std::fs;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use taskroll::clock::FixedClock;
use taskroll::completion::{complete_task, Completion, NextDue};
use taskroll::error::{StoreError, TaskError};
use taskroll::models::{NewTask, Task, TaskPatch};
use taskroll::recurrence::RecurrenceError;
use taskroll::storage::{JsonStore, TaskStore};

fn with_test_db<F>(test_name: &str, f: F)
where
    F: FnOnce(&JsonStore),
{
    let mut dir = env::temp_dir();
    dir.push(format!("taskroll_completion_{}_{}", test_name, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    let store = JsonStore::open(dir.join("tasks.json")).unwrap();

    f(&store);

    drop(store);
    fs::remove_dir_all(&dir).unwrap();
}

fn clock() -> FixedClock {
    FixedClock(Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

fn add(store: &JsonStore, new: NewTask) -> Task {
    store.create_task(new, clock().0).unwrap()
}

/// Writes straight to the store, skipping validation.
fn force(store: &JsonStore, id: u64, patch: TaskPatch) {
    store.update_task(id, &patch).unwrap();
}

#[test]
fn test_complete_closes_non_recurring_task() {
    with_test_db("closes", |store| {
        let task = add(store, NewTask {
            description: "File taxes".into(),
            due_date: Some(date(2024, 6, 10)),
            ..Default::default()
        });

        let result = complete_task(store, &clock(), task.id).unwrap();

        let stored = store.get_task(task.id).unwrap();
        assert_eq!(stored.completed_at, Some(clock().0));
        assert_eq!(stored.due_date, Some(date(2024, 6, 10)));
        assert_eq!(stored.due_datetime, None);
        assert_eq!(stored.revision, task.revision + 1);
        assert_eq!(result, Completion::Closed { task: stored, completed_at: clock().0 });
    });
}

#[test]
fn test_complete_rearms_weekly_task() {
    with_test_db("rearm_weekly", |store| {
        // 2024-06-01 is a Saturday
        let task = add(store, NewTask {
            description: "Water plants".into(),
            due_date: Some(date(2024, 6, 1)),
            recurrence: "mon".into(),
            ..Default::default()
        });

        let result = complete_task(store, &clock(), task.id).unwrap();

        let stored = store.get_task(task.id).unwrap();
        assert_eq!(stored.due_date, Some(date(2024, 6, 3)));
        assert_eq!(stored.completed_at, None);
        assert_eq!(stored.due_datetime, None);
        assert_eq!(
            result,
            Completion::Rearmed { task: stored, next: NextDue::Date(date(2024, 6, 3)) },
        );
        assert_eq!(store.list_tasks(&Default::default()).len(), 1);
    });
}

#[test]
fn test_complete_rearms_timed_task() {
    with_test_db("rearm_timed", |store| {
        let task = add(store, NewTask {
            description: "Standup".into(),
            due_datetime: Some(datetime(2024, 6, 1, 9, 0)),
            recurrence: "daily".into(),
            ..Default::default()
        });

        complete_task(store, &clock(), task.id).unwrap();

        let stored = store.get_task(task.id).unwrap();
        assert_eq!(stored.due_datetime, Some(datetime(2024, 6, 2, 9, 0)));
        assert_eq!(stored.due_date, None);
        assert_eq!(stored.completed_at, None);
    });
}

#[test]
fn test_complete_prefers_due_datetime() {
    with_test_db("prefers_datetime", |store| {
        let task = add(store, NewTask {
            description: "Rent".into(),
            due_date: Some(date(2024, 5, 1)),
            due_datetime: Some(datetime(2024, 6, 1, 18, 30)),
            recurrence: "1".into(),
            ..Default::default()
        });

        let result = complete_task(store, &clock(), task.id).unwrap();

        let stored = store.get_task(task.id).unwrap();
        assert_eq!(stored.due_datetime, Some(datetime(2024, 7, 1, 18, 30)));
        assert_eq!(stored.due_date, Some(date(2024, 5, 1)));
        assert!(matches!(result, Completion::Rearmed { next: NextDue::DateTime(_), .. }));
    });
}

#[test]
fn test_complete_truncates_to_date_for_date_only_task() {
    with_test_db("date_only", |store| {
        let task = add(store, NewTask {
            description: "Pay card".into(),
            due_date: Some(date(2024, 1, 20)),
            recurrence: "15".into(),
            ..Default::default()
        });

        complete_task(store, &clock(), task.id).unwrap();
        assert_eq!(store.get_task(task.id).unwrap().due_date, Some(date(2024, 2, 15)));

        complete_task(store, &clock(), task.id).unwrap();
        assert_eq!(store.get_task(task.id).unwrap().due_date, Some(date(2024, 3, 15)));
    });
}

#[test]
fn test_complete_clears_stale_completion_mark() {
    with_test_db("clears_mark", |store| {
        let task = add(store, NewTask {
            description: "Review budget".into(),
            due_date: Some(date(2024, 3, 1)),
            recurrence: "25 dec".into(),
            ..Default::default()
        });
        force(
            store,
            task.id,
            TaskPatch { completed_at: Some(Some(clock().0)), ..Default::default() },
        );

        complete_task(store, &clock(), task.id).unwrap();

        let stored = store.get_task(task.id).unwrap();
        assert_eq!(stored.completed_at, None);
        assert_eq!(stored.due_date, Some(date(2024, 12, 25)));
    });
}

#[test]
fn test_complete_with_bad_recurrence_changes_nothing() {
    with_test_db("bad_recurrence", |store| {
        let task = add(store, NewTask {
            description: "Broken".into(),
            due_date: Some(date(2024, 6, 1)),
            ..Default::default()
        });
        force(
            store,
            task.id,
            TaskPatch { recurrence: Some("every other tuesday".into()), ..Default::default() },
        );
        let before = store.get_task(task.id).unwrap();

        let err = complete_task(store, &clock(), task.id).unwrap_err();

        assert!(matches!(err, TaskError::InvalidRecurrence(RecurrenceError::Unsupported(_))));
        assert_eq!(store.get_task(task.id).unwrap(), before);
    });
}

#[test]
fn test_complete_recurring_without_due_changes_nothing() {
    with_test_db("missing_due", |store| {
        let task = add(store, NewTask {
            description: "Undated".into(),
            due_date: Some(date(2024, 6, 1)),
            recurrence: "daily".into(),
            ..Default::default()
        });
        force(store, task.id, TaskPatch { due_date: Some(None), ..Default::default() });
        let before = store.get_task(task.id).unwrap();

        let err = complete_task(store, &clock(), task.id).unwrap_err();

        assert!(matches!(err, TaskError::InvalidRecurrence(RecurrenceError::MissingDue)));
        assert_eq!(store.get_task(task.id).unwrap(), before);
    });
}

#[test]
fn test_complete_missing_task() {
    with_test_db("missing_task", |store| {
        let err = complete_task(store, &clock(), 42).unwrap_err();
        assert!(matches!(err, TaskError::NotFound(42)));
    });
}

/// Lets another writer touch the task between the driver's read and write.
struct RacingStore<'a> {
    inner: &'a JsonStore,
    raced: Cell<bool>,
    updates: Cell<usize>,
    always: bool,
}

impl TaskStore for RacingStore<'_> {
    fn get_task(&self, id: u64) -> Result<Task, StoreError> {
        self.inner.get_task(id)
    }

    fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, StoreError> {
        self.updates.set(self.updates.get() + 1);
        if self.always || !self.raced.get() {
            self.raced.set(true);
            let current = self.inner.get_task(id)?;
            let mut labels = current.labels.clone();
            labels.push("touched".into());
            self.inner.update_task(id, &TaskPatch { labels: Some(labels), ..Default::default() })?;
        }
        self.inner.update_task(id, patch)
    }
}

#[test]
fn test_complete_retries_after_concurrent_update() {
    with_test_db("retry", |store| {
        let task = add(store, NewTask {
            description: "Gym".into(),
            due_date: Some(date(2024, 6, 1)),
            recurrence: "mon,wed,fri".into(),
            ..Default::default()
        });
        let racing = RacingStore {
            inner: store,
            raced: Cell::new(false),
            updates: Cell::new(0),
            always: false,
        };

        complete_task(&racing, &clock(), task.id).unwrap();

        let stored = store.get_task(task.id).unwrap();
        assert_eq!(racing.updates.get(), 2);
        assert_eq!(stored.labels, vec!["touched".to_string()]);
        // advanced exactly once
        assert_eq!(stored.due_date, Some(date(2024, 6, 3)));
    });
}

#[test]
fn test_complete_gives_up_after_repeated_conflicts() {
    with_test_db("gives_up", |store| {
        let task = add(store, NewTask {
            description: "Contended".into(),
            due_date: Some(date(2024, 6, 1)),
            recurrence: "daily".into(),
            ..Default::default()
        });
        let racing = RacingStore {
            inner: store,
            raced: Cell::new(false),
            updates: Cell::new(0),
            always: true,
        };

        let err = complete_task(&racing, &clock(), task.id).unwrap_err();

        assert!(matches!(err, TaskError::Store(StoreError::Conflict(id)) if id == task.id));
        assert_eq!(racing.updates.get(), 3);
        assert_eq!(store.get_task(task.id).unwrap().due_date, Some(date(2024, 6, 1)));
    });
}

#[test]
fn test_complete_ignores_unwritable_untouched_table() {
    with_test_db("untouched_table", |store| {
        let task = add(store, NewTask {
            description: "Water plants".into(),
            due_date: Some(date(2024, 6, 1)),
            recurrence: "mon".into(),
            ..Default::default()
        });
        let projects = store.path().with_file_name("projects.json");
        let _ = fs::remove_file(&projects);
        fs::create_dir(&projects).unwrap();

        complete_task(store, &clock(), task.id).unwrap();
        assert_eq!(store.get_task(task.id).unwrap().due_date, Some(date(2024, 6, 3)));

        fs::remove_dir(&projects).unwrap();
        let reopened = JsonStore::open(store.path()).unwrap();
        assert_eq!(reopened.get_task(task.id).unwrap().due_date, Some(date(2024, 6, 3)));
    });
}

#[test]
fn test_failed_write_leaves_memory_and_disk_unchanged() {
    with_test_db("failed_write", |store| {
        let task = add(store, NewTask {
            description: "Water plants".into(),
            due_date: Some(date(2024, 6, 1)),
            recurrence: "mon".into(),
            ..Default::default()
        });
        let before = store.get_task(task.id).unwrap();
        let staging = store.path().with_file_name("tasks.json.tmp");
        fs::create_dir(&staging).unwrap();

        let err = complete_task(store, &clock(), task.id).unwrap_err();

        assert!(matches!(err, TaskError::Store(StoreError::Io(_))));
        assert_eq!(store.get_task(task.id).unwrap(), before);
        let reopened = JsonStore::open(store.path()).unwrap();
        assert_eq!(reopened.get_task(task.id).unwrap(), before);
        assert!(!store.path().with_file_name("projects.json.tmp").exists());
    });
}
