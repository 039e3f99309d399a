//! Checkpoint files in a local directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::store::CheckpointStore;
use crate::{CheckpointFile, StreamPhase};

/// Writes one JSON file per checkpoint, named
/// `{phase}-{kind}-{unix millis}.json`.
///
/// Files are written under a temporary name and renamed into place, so a
/// reader never sees a half-written checkpoint.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn prefix(kind: &str, phase: &StreamPhase) -> String {
        format!("{}-{kind}-", phase.as_str())
    }
}

#[async_trait]
impl CheckpointStore for FilesystemStore {
    async fn save(&self, file: &CheckpointFile) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let name = format!(
            "{}{}.json",
            Self::prefix(&file.kind, &file.phase),
            file.written_at.timestamp_millis()
        );
        let path = self.dir.join(&name);
        let partial = self.dir.join(format!(".{name}.partial"));

        std::fs::write(&partial, serde_json::to_vec_pretty(file)?)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        std::fs::rename(&partial, &path)
            .with_context(|| format!("Failed to move checkpoint into {}", path.display()))?;
        info!("Wrote checkpoint {}", path.display());
        Ok(())
    }

    async fn latest(&self, kind: &str, phase: &StreamPhase) -> Result<Option<CheckpointFile>> {
        if !self.dir.exists() {
            return Ok(None);
        }

        let prefix = Self::prefix(kind, phase);
        let mut latest: Option<CheckpointFile> = None;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".json"));
            if !matches {
                continue;
            }

            let content = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file: CheckpointFile = serde_json::from_slice(&content)
                .with_context(|| format!("Corrupt checkpoint file {}", path.display()))?;
            debug!("Found checkpoint {} written at {}", path.display(), file.written_at);
            if file.kind == kind
                && latest
                    .as_ref()
                    .is_none_or(|current| file.written_at > current.written_at)
            {
                latest = Some(file);
            }
        }
        Ok(latest)
    }
}
