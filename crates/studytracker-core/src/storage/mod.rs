pub mod database;
pub mod migrations;
mod config;
mod reset;
mod snapshot;
mod todo;

pub use config::{Config, PomodoroConfig, TimerConfig};
pub use database::{DailyTotal, SessionRecord, SessionSource, SessionStore, StudyStats};
pub use reset::{reset_data, DataResetOptions, DataResetSummary};
pub use snapshot::{PomodoroSnapshot, SnapshotFile};
pub use todo::{TodoItem, TodoStore};

use std::path::PathBuf;

pub const DB_FILE: &str = "study.db";
pub const SNAPSHOT_FILE: &str = "pomodoro_state.json";
pub const TODO_FILE: &str = "todos.json";
pub const CONFIG_FILE: &str = "config.toml";

/// Returns the per-user data directory, creating it if needed.
///
/// `STUDYTRACKER_DATA_DIR` overrides the location outright. Otherwise the
/// platform local data dir is used, with `STUDYTRACKER_ENV=dev` selecting a
/// separate development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("STUDYTRACKER_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base = dirs::data_local_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."));
            let env =
                std::env::var("STUDYTRACKER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base.join("StudyTracker-dev")
            } else {
                base.join("StudyTracker")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
