//! Storage backends for checkpoint files.

use anyhow::Result;
use async_trait::async_trait;

use crate::{CheckpointFile, StreamPhase};

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist `file`; earlier files are kept.
    async fn save(&self, file: &CheckpointFile) -> Result<()>;

    /// Most recently written file of `kind` for `phase`, if any.
    async fn latest(&self, kind: &str, phase: &StreamPhase) -> Result<Option<CheckpointFile>>;
}
