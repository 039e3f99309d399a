//! Typed checkpoint emission and lookup.

use anyhow::{anyhow, Result};
use tracing::info;

use crate::store::CheckpointStore;
use crate::{Checkpoint, CheckpointConfig, CheckpointFile, CheckpointStorage, FilesystemStore, StreamPhase};

/// Emits and reads checkpoints of any [`Checkpoint`] type.
///
/// ```rust,ignore
/// let manager = CheckpointManager::new(CheckpointConfig::emitting(".binlog2sql-checkpoints"));
/// manager.emit_checkpoint(&checkpoint, StreamPhase::StreamEnd).await?;
/// let resume_from: BinlogCheckpoint = manager.read_checkpoint(StreamPhase::StreamEnd).await?;
/// ```
pub struct CheckpointManager {
    config: CheckpointConfig,
    store: Option<Box<dyn CheckpointStore>>,
}

impl CheckpointManager {
    pub fn new(config: CheckpointConfig) -> Self {
        let store: Option<Box<dyn CheckpointStore>> = match &config.storage {
            CheckpointStorage::Disabled => None,
            CheckpointStorage::Filesystem { dir } => Some(Box::new(FilesystemStore::new(dir))),
        };
        Self { config, store }
    }

    pub fn with_store(config: CheckpointConfig, store: Box<dyn CheckpointStore>) -> Self {
        Self {
            config,
            store: Some(store),
        }
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Record `checkpoint` for `phase`; does nothing unless emission is on.
    pub async fn emit_checkpoint<C: Checkpoint>(&self, checkpoint: &C, phase: StreamPhase) -> Result<()> {
        if !self.config.emit {
            return Ok(());
        }
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| anyhow!("Checkpoint emission is on but no checkpoint storage is configured"))?;

        let file = CheckpointFile::new(checkpoint, phase)?;
        store.save(&file).await?;
        info!("Emitted {} checkpoint {}", file.phase, checkpoint.to_cli_string());
        Ok(())
    }

    /// The latest `phase` checkpoint of type `C`.
    pub async fn read_checkpoint<C: Checkpoint>(&self, phase: StreamPhase) -> Result<C> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| anyhow!("No checkpoint storage configured"))?;
        let file = store
            .latest(C::KIND, &phase)
            .await?
            .ok_or_else(|| anyhow!("No {phase} checkpoint of kind '{}' found", C::KIND))?;
        file.parse()
    }
}
