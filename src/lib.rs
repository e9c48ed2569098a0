//! # taskroll
//!
//! A personal task and project manager with a CLI and a JSON REST API.
//!
//! Tasks can repeat. A recurrence is a short expression stored on the task:
//!
//! ```text
//! daily | every day      every day
//! mon,wed,fri            on any of these weekdays
//! tue                    every Tuesday
//! 15                     the 15th of every month
//! 25 dec                 every 25 December
//! ```
//!
//! Completing a recurring task does not close it. Its due date moves to the
//! next occurrence and it stays in the active list; see [`completion`].
//!
//! ## Data Storage
//!
//! Tasks, projects and notes are JSON files in your local data directory
//! (`~/.local/share/taskroll/` on Linux). Override the location with the
//! `TASKS_DB` environment variable.

pub mod api;
pub mod clock;
pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod recurrence;
pub mod storage;
pub mod tasks;
