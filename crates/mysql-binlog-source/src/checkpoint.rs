//! Binlog position checkpoints.

use anyhow::Result;
use binlog_core::StreamPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resumable `(file, position)` pair with the time it was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinlogCheckpoint {
    pub file: String,
    pub position: u64,
    /// Timestamp when checkpoint was created
    pub timestamp: DateTime<Utc>,
}

impl BinlogCheckpoint {
    pub fn new(position: &StreamPosition) -> Self {
        Self {
            file: position.file.clone(),
            position: position.offset,
            timestamp: Utc::now(),
        }
    }

    pub fn stream_position(&self) -> StreamPosition {
        StreamPosition::new(self.file.clone(), self.position)
    }
}

impl ::checkpoint::Checkpoint for BinlogCheckpoint {
    const KIND: &'static str = "mysql-binlog";

    fn to_cli_string(&self) -> String {
        format!("{}:{}", self.file, self.position)
    }

    fn from_cli_string(s: &str) -> Result<Self> {
        let (file, position) = s.rsplit_once(':').ok_or_else(|| {
            anyhow::anyhow!("Invalid binlog checkpoint: expected 'file:position', got '{s}'")
        })?;
        if file.is_empty() {
            anyhow::bail!("Invalid binlog checkpoint: empty file name in '{s}'");
        }
        let position = position.parse::<u64>().map_err(|e| {
            anyhow::anyhow!("Invalid binlog checkpoint: bad position in '{s}': {e}")
        })?;

        Ok(Self {
            file: file.to_string(),
            position,
            timestamp: Utc::now(),
        })
    }
}
