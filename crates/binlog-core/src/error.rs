//! Fatal startup errors shared by the sources and the driver.

use thiserror::Error;

/// A precondition that must hold before streaming begins.
///
/// Any of these aborts the run before the first event is pulled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("missing server_id on {0}")]
    MissingServerId(String),
    #[error("binlog is disabled on {0}")]
    BinlogDisabled(String),
    #[error("binlog_format is '{format}' on {server}, expected 'ROW'")]
    NotRowFormat { server: String, format: String },
    #[error("binlog_row_image is '{image}' on {server}, expected 'FULL'")]
    NotFullRowImage { server: String, image: String },
    #[error("file header of {0} does not match the binlog magic, file may be damaged")]
    BadFileHeader(String),
    #[error("start file {0} is not in the server's binary log list")]
    StartFileNotFound(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
