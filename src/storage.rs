//! Storage layer for planbook
//!
//! All durable state lives in a single data directory:
//!
//! ```text
//! <data-dir>/
//!   tasks.json      # Task collection snapshot
//!   stories.json    # Story collection snapshot
//!   planbook.lock   # Cross-process write lock
//! ```
//!
//! Writes go through an atomic write-temp-then-rename path so readers never
//! see a partial snapshot. Persisted derived fields (task state, story
//! progress) are treated as a cache: stores re-run the rules on load and
//! silently correct anything stale.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// File name of the task collection snapshot
pub const TASKS_FILE: &str = "tasks.json";

/// File name of the story collection snapshot
pub const STORIES_FILE: &str = "stories.json";

/// File name of the cross-process lock
pub const LOCK_FILE: &str = "planbook.lock";

/// Storage manager for planbook state
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create a storage manager rooted at the given data directory
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Path to the data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the task collection snapshot
    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir.join(TASKS_FILE)
    }

    /// Path to the story collection snapshot
    pub fn stories_file(&self) -> PathBuf {
        self.data_dir.join(STORIES_FILE)
    }

    /// Path to the write lock file
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE)
    }

    /// Create the data directory if it does not exist yet
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Write JSON data atomically (write to temp, then rename)
    ///
    /// Ensures that concurrent readers never see partial writes.
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Read JSON data, falling back to a default when the file is missing
    ///
    /// A present-but-unparseable file is still an error: silently resetting
    /// it would destroy user data.
    pub fn read_json_or<T: DeserializeOwned>(
        &self,
        path: &Path,
        default: impl FnOnce() -> T,
    ) -> Result<T> {
        if !path.exists() {
            return Ok(default());
        }
        self.read_json(path)
    }

    /// Write data atomically using temp file + rename
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&temp_path, path).map_err(Error::Io)?;

        Ok(())
    }
}
