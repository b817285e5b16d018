//! Flat-file to-do list.
//!
//! Independent of the session log: a JSON array of `{text, checked}` pairs
//! rewritten whole on every save.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{data_dir, TODO_FILE};
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone)]
pub struct TodoStore {
    path: PathBuf,
    items: Vec<TodoItem>,
}

impl TodoStore {
    /// Load the list at `<data_dir>/todos.json`.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open_default() -> Result<Self, CoreError> {
        Self::load(data_dir()?.join(TODO_FILE))
    }

    /// A missing file is an empty list.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn add(&mut self, text: impl Into<String>) -> usize {
        self.items.push(TodoItem {
            text: text.into(),
            checked: false,
        });
        self.items.len() - 1
    }

    /// Flip the checked flag. Returns the new state, or `None` for a bad index.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let item = self.items.get_mut(index)?;
        item.checked = !item.checked;
        Some(item.checked)
    }

    pub fn remove(&mut self, index: usize) -> Option<TodoItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// # Errors
    /// Returns an error if the list cannot be written.
    pub fn save(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.items)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
