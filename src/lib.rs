//! binlog2sql library
//!
//! Reconstructs SQL statements, or the statements that undo them
//! (flashback), from a MySQL ROW-format binlog, either streamed from a
//! server or read from a local file.
//!
//! # Pipeline
//!
//! ```text
//! EventSource ─► PositionTracker ─► TableMetadataCache (TABLE_MAP)
//!                                 └► filter ─► decode_rows ─► synthesize ─► output line
//! ```
//!
//! - [`driver::StreamDriver`] - Orchestrates the pipeline and its stop conditions
//! - [`position::PositionTracker`] - Active file and the last two end offsets
//! - [`filter`] - Time, position and kind filtering
//! - [`metadata::TableMetadataCache`] - Table descriptors by table id
//! - [`synth`] - Forward and flashback SQL
//!
//! # CLI Usage
//!
//! ```bash
//! # Audit a window of a server's binlog
//! binlog2sql --host 127.0.0.1 --user repl --password secret \
//!   --start-file mysql-bin.000003 --start-datetime "2024-03-01 10:00:00" \
//!   --stop-datetime "2024-03-01 11:00:00"
//!
//! # Undo the deletes recorded in a local binlog file
//! binlog2sql --local --local-file /var/lib/mysql/mysql-bin.000003 --only-dml --flashback
//! ```

pub mod cli;
pub mod config;
pub mod driver;
pub mod filter;
pub mod metadata;
pub mod output;
pub mod position;
pub mod synth;

pub use cli::Cli;
pub use config::{FilterConfig, RunConfig};
pub use driver::{DriverState, Outcome, RunReport, StopReason, StreamDriver, StreamSetup};
pub use metadata::TableMetadataCache;
pub use position::PositionTracker;
