//! Pomodoro display snapshot kept beside the session log.
//!
//! Written once on shutdown and consumed once on the next launch. It only
//! tells the user where they left off; it never reopens a session.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{data_dir, SNAPSHOT_FILE};
use crate::error::CoreError;
use crate::pomodoro::Phase;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSnapshot {
    pub phase: Phase,
    #[serde(default)]
    pub elapsed: u64,
    #[serde(default)]
    pub cycle_count: u32,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub target: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/pomodoro_state.json`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn open_default() -> std::io::Result<Self> {
        Ok(Self::new(data_dir()?.join(SNAPSHOT_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    /// Returns an error if the snapshot cannot be serialized or written.
    pub fn save(&self, snapshot: &PomodoroSnapshot) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(snapshot)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "pomodoro snapshot saved");
        Ok(())
    }

    /// Read the snapshot and delete the file.
    ///
    /// A missing or unreadable snapshot is `None`; the file is removed either way.
    pub fn take(&self) -> Option<PomodoroSnapshot> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "pomodoro snapshot unreadable");
                self.discard();
                return None;
            }
        };
        let snapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed pomodoro snapshot");
                None
            }
        };
        self.discard();
        snapshot
    }

    fn discard(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "could not remove pomodoro snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> PomodoroSnapshot {
        PomodoroSnapshot {
            phase: Phase::Break,
            elapsed: 42,
            cycle_count: 3,
            running: true,
            session_id: None,
            target: Some(300),
        }
    }

    #[test]
    fn take_consumes_the_file() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join(SNAPSHOT_FILE));
        file.save(&sample()).unwrap();

        assert_eq!(file.take(), Some(sample()));
        assert!(!file.path().exists());
        assert_eq!(file.take(), None);
    }

    #[test]
    fn missing_file_is_no_snapshot() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join(SNAPSHOT_FILE));
        assert_eq!(file.take(), None);
    }

    #[test]
    fn corrupt_file_is_no_snapshot_and_removed() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join(SNAPSHOT_FILE));
        std::fs::write(file.path(), "{not json").unwrap();
        assert_eq!(file.take(), None);
        assert!(!file.path().exists());
    }

    #[test]
    fn sparse_snapshot_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join(SNAPSHOT_FILE));
        std::fs::write(file.path(), r#"{"phase":"study"}"#).unwrap();
        let snap = file.take().unwrap();
        assert_eq!(snap.phase, Phase::Study);
        assert_eq!(snap.cycle_count, 0);
        assert_eq!(snap.target, None);
    }
}
