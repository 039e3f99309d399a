//! Resume points for binlog2sql runs.
//!
//! A run can record where it started and where it stopped so a later run
//! picks up from there (`--emit-checkpoints` / `--resume`).
//!
//! - [`Checkpoint`]: implemented by each source's position type
//! - [`CheckpointFile`]: a checkpoint tagged with its kind, phase and write time
//! - [`CheckpointStore`]: where files live ([`FilesystemStore`] writes JSON)
//! - [`CheckpointManager`]: typed emit/read on top of a store

mod config;
mod file;
mod filesystem;
mod manager;
mod phase;
pub mod store;

#[cfg(test)]
mod tests;

pub use config::{CheckpointConfig, CheckpointStorage, DEFAULT_CHECKPOINT_DIR};
pub use file::CheckpointFile;
pub use filesystem::FilesystemStore;
pub use manager::CheckpointManager;
pub use phase::StreamPhase;
pub use store::CheckpointStore;

/// A source position that can be written out and read back.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct OffsetCheckpoint {
///     pub offset: u64,
/// }
///
/// impl Checkpoint for OffsetCheckpoint {
///     const KIND: &'static str = "offset";
///
///     fn to_cli_string(&self) -> String {
///         self.offset.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { offset: s.parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Tag stored next to the serialized checkpoint; reads only match files
    /// carrying the same tag.
    const KIND: &'static str;

    /// Short form shown in logs and accepted back by [`Checkpoint::from_cli_string`].
    fn to_cli_string(&self) -> String;

    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}
