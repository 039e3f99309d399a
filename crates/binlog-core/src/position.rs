//! Stream positions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset of the first event in every binlog file, right after the magic header.
pub const FIRST_EVENT_OFFSET: u64 = 4;

/// A `(file name, end offset)` pair.
///
/// Offsets are only comparable within the same file; every file restarts
/// numbering at [`FIRST_EVENT_OFFSET`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamPosition {
    pub file: String,
    pub offset: u64,
}

impl StreamPosition {
    pub fn new(file: impl Into<String>, offset: u64) -> Self {
        Self {
            file: file.into(),
            offset,
        }
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.offset)
    }
}
