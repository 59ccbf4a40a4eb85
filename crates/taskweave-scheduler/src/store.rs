//! JSON persistence for task entry configuration.
//!
//! Saved on every mutation, loaded once at startup. A missing or corrupt
//! file yields an empty entry set rather than an error; the runtime trigger
//! state is transient anyway and every tree is re-armed after load.

use std::path::{Path, PathBuf};

use taskweave_core::{Result, SchedulerConfig, TaskweaveError};

use crate::entry::TaskEntry;

pub struct EntryStore {
    path: PathBuf,
}

impl EntryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location (~/.taskweave/entries.json).
    pub fn default_location() -> Self {
        Self::new(SchedulerConfig::home_dir().join("entries.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Vec<TaskEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read entry store");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt entry store, starting empty");
                Vec::new()
            }
        }
    }

    pub fn save(&self, entries: &[TaskEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| TaskweaveError::Store(format!("failed to serialize entries: {e}")))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
