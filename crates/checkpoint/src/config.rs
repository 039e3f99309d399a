//! Checkpoint settings.

use std::path::PathBuf;

/// Directory used when `--checkpoint-dir` is not given.
pub const DEFAULT_CHECKPOINT_DIR: &str = ".binlog2sql-checkpoints";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointStorage {
    Disabled,
    Filesystem { dir: PathBuf },
}

/// Whether checkpoints are written, and where they are read from.
///
/// Reading works whenever storage is configured; `emit` only gates writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointConfig {
    pub emit: bool,
    pub storage: CheckpointStorage,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self::reading(DEFAULT_CHECKPOINT_DIR)
    }
}

impl CheckpointConfig {
    /// Write and read checkpoints in `dir`.
    pub fn emitting(dir: impl Into<PathBuf>) -> Self {
        Self {
            emit: true,
            storage: CheckpointStorage::Filesystem { dir: dir.into() },
        }
    }

    /// Only read checkpoints from `dir`.
    pub fn reading(dir: impl Into<PathBuf>) -> Self {
        Self {
            emit: false,
            storage: CheckpointStorage::Filesystem { dir: dir.into() },
        }
    }

    pub fn should_emit(&self) -> bool {
        self.emit && self.storage != CheckpointStorage::Disabled
    }
}
