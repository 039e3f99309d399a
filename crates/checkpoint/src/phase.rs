//! Points in a run where checkpoints are taken.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamPhase {
    /// Requested start file and position, written before streaming
    StreamStart,
    /// Last annotated position, written after the driver stops
    StreamEnd,
}

impl StreamPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamPhase::StreamStart => "stream_start",
            StreamPhase::StreamEnd => "stream_end",
        }
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "stream_start" => Ok(StreamPhase::StreamStart),
            "stream_end" => Ok(StreamPhase::StreamEnd),
            other => anyhow::bail!("Unknown stream phase: {other}"),
        }
    }
}
