use std::path::PathBuf;

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of `tasks.json`; the other tables live next to it.
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    pub bind_addr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Reads:
    /// - `TASKS_DB` - database file (default: `<data dir>/taskroll/tasks.json`)
    /// - `LOG_LEVEL` - `debug`, `info`, `warn` or `error` (default `info`)
    /// - `LOG_FORMAT` - `json` or `text` (default `text`)
    /// - `BIND_ADDR` - HTTP listen address (default `0.0.0.0:3000`)
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("TASKS_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_db_path()),
            log_level: normalize_level(&env_or_default("LOG_LEVEL", "info")),
            log_format: match env_or_default("LOG_FORMAT", "text").to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            },
            bind_addr: env_or_default("BIND_ADDR", "0.0.0.0:3000"),
        }
    }
}

/// `~/.local/share/taskroll/tasks.json` on Linux, `./tasks.json` if there is
/// no data directory.
fn default_db_path() -> PathBuf {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("taskroll");
    p.push("tasks.json");
    p
}

fn env_or_default(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn normalize_level(level: &str) -> String {
    match level.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
    .to_string()
}
