//! The unit a store persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Checkpoint, StreamPhase};

/// A checkpoint as written to storage.
///
/// ```json
/// {
///     "kind": "mysql-binlog",
///     "phase": "StreamEnd",
///     "checkpoint": { "file": "mysql-bin.000003", "position": 1234, "timestamp": "..." },
///     "written_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointFile {
    pub kind: String,
    pub phase: StreamPhase,
    pub checkpoint: serde_json::Value,
    pub written_at: DateTime<Utc>,
}

impl CheckpointFile {
    pub fn new<C: Checkpoint>(checkpoint: &C, phase: StreamPhase) -> anyhow::Result<Self> {
        Ok(Self {
            kind: C::KIND.to_string(),
            phase,
            checkpoint: serde_json::to_value(checkpoint)?,
            written_at: Utc::now(),
        })
    }

    /// Deserialize the payload, refusing files written for another kind.
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.kind != C::KIND {
            anyhow::bail!(
                "Checkpoint kind mismatch: expected '{}', found '{}'",
                C::KIND,
                self.kind
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }
}
