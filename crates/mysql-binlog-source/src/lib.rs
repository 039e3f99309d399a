//! MySQL binlog event source for binlog2sql.
//!
//! This crate turns a MySQL server's replication stream, or a binlog file
//! on disk, into [`binlog_core::ChangeEvent`]s:
//!
//! - [`codec`]: event header and payload framing
//! - [`LocalBinlogSource`] / [`LiveBinlogSource`]: the two [`binlog_core::EventSource`]s
//! - [`server`]: precondition checks and the `SHOW BINARY LOGS` catalog
//! - [`catalog`]: column names from `INFORMATION_SCHEMA`
//! - [`BinlogCheckpoint`]: `file:position` checkpoints for resuming

pub mod catalog;
pub mod checkpoint;
pub mod client;
pub mod codec;
pub mod server;
pub mod source;

pub use catalog::{CatalogColumn, ColumnCatalog, MySqlColumnCatalog};
pub use checkpoint::BinlogCheckpoint;
pub use client::{new_mysql_pool, ConnectionOpts};
pub use codec::{BinlogCodec, CodecError};
pub use server::{
    fetch_server_variables, in_range_files, list_binlog_files, BinlogFile, ServerVariables,
};
pub use source::{random_server_id, LiveBinlogSource, LocalBinlogSource};
