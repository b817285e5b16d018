//! Wipe persisted study data.
//!
//! Removes files from the data directory; it never touches a running
//! engine's in-memory state. The next store operation recreates an empty log.

use std::path::Path;

use super::{DB_FILE, SNAPSHOT_FILE, TODO_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataResetOptions {
    pub sessions: bool,
    pub todos: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataResetSummary {
    pub removed_session_log: bool,
    pub removed_snapshot: bool,
    pub removed_todos: bool,
}

/// Delete the selected files under `dir`. Missing files are not an error.
///
/// Removing the session log also removes the Pomodoro snapshot, which would
/// otherwise describe sessions that no longer exist.
///
/// # Errors
/// Returns an error if an existing file cannot be removed.
pub fn reset_data(dir: &Path, options: DataResetOptions) -> std::io::Result<DataResetSummary> {
    let mut summary = DataResetSummary::default();
    if options.sessions {
        summary.removed_session_log = remove_if_present(&dir.join(DB_FILE))?;
        for suffix in ["-wal", "-shm", "-journal"] {
            remove_if_present(&dir.join(format!("{DB_FILE}{suffix}")))?;
        }
        summary.removed_snapshot = remove_if_present(&dir.join(SNAPSHOT_FILE))?;
    }
    if options.todos {
        summary.removed_todos = remove_if_present(&dir.join(TODO_FILE))?;
    }
    Ok(summary)
}

fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
