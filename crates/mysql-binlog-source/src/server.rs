//! Server-side preconditions and the binary log catalog.

use anyhow::{anyhow, Context, Result};
use binlog_core::PreconditionError;
use mysql_async::prelude::*;
use mysql_async::{Conn, Row, Value};
use tracing::{debug, info};

/// Replication-relevant server variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVariables {
    pub server_id: u64,
    pub log_bin: bool,
    pub binlog_format: String,
    pub binlog_row_image: String,
}

impl ServerVariables {
    /// Check that the server writes full row images; `server` names it in errors.
    pub fn validate(&self, server: &str) -> Result<(), PreconditionError> {
        if self.server_id == 0 {
            return Err(PreconditionError::MissingServerId(server.to_string()));
        }
        if !self.log_bin {
            return Err(PreconditionError::BinlogDisabled(server.to_string()));
        }
        if !self.binlog_format.eq_ignore_ascii_case("ROW") {
            return Err(PreconditionError::NotRowFormat {
                server: server.to_string(),
                format: self.binlog_format.clone(),
            });
        }
        if !self.binlog_row_image.eq_ignore_ascii_case("FULL") {
            return Err(PreconditionError::NotFullRowImage {
                server: server.to_string(),
                image: self.binlog_row_image.clone(),
            });
        }
        Ok(())
    }
}

/// Read `@@server_id`, `@@log_bin`, `@@binlog_format` and `@@binlog_row_image`.
pub async fn fetch_server_variables(conn: &mut Conn) -> Result<ServerVariables> {
    let row: Row = conn
        .query_first(
            "SELECT @@server_id, @@log_bin, @@binlog_format, @@binlog_row_image",
        )
        .await
        .context("Failed to read server variables")?
        .ok_or_else(|| anyhow!("Server variables query returned no rows"))?;

    let server_id = value_to_string(row.as_ref(0).unwrap_or(&Value::NULL));
    let log_bin = value_to_string(row.as_ref(1).unwrap_or(&Value::NULL));
    let variables = ServerVariables {
        server_id: server_id
            .parse()
            .with_context(|| format!("Invalid @@server_id '{server_id}'"))?,
        log_bin: matches!(log_bin.to_ascii_uppercase().as_str(), "1" | "ON"),
        binlog_format: value_to_string(row.as_ref(2).unwrap_or(&Value::NULL)),
        binlog_row_image: value_to_string(row.as_ref(3).unwrap_or(&Value::NULL)),
    };
    debug!(?variables, "Fetched server variables");
    Ok(variables)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::NULL => String::new(),
        Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        other => format!("{other:?}"),
    }
}

/// One row of `SHOW BINARY LOGS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogFile {
    pub name: String,
    pub size: u64,
    pub encrypted: bool,
}

impl BinlogFile {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            encrypted: false,
        }
    }
}

/// List the server's binary logs.
///
/// Older servers return `(Log_name, File_size)`, 8.0 adds `Encrypted`.
pub async fn list_binlog_files(conn: &mut Conn) -> Result<Vec<BinlogFile>> {
    let rows: Vec<Row> = conn
        .query("SHOW BINARY LOGS")
        .await
        .context("Failed to list binary logs")?;

    let mut files = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row
            .get(0)
            .ok_or_else(|| anyhow!("Missing Log_name in SHOW BINARY LOGS"))?;
        let size: u64 = row
            .get(1)
            .ok_or_else(|| anyhow!("Missing File_size in SHOW BINARY LOGS"))?;
        let encrypted = if row.len() > 2 {
            row.get::<String, _>(2)
                .is_some_and(|v| v.eq_ignore_ascii_case("yes"))
        } else {
            false
        };
        files.push(BinlogFile {
            name,
            size,
            encrypted,
        });
    }
    info!("Server has {} binary log files", files.len());
    Ok(files)
}

/// Numeric suffix of a binlog file name (`mysql-bin.000042` → 42).
pub fn binlog_file_suffix(name: &str) -> Option<u64> {
    name.rsplit_once('.')
        .and_then(|(_, suffix)| suffix.parse().ok())
}

/// Files to stream, in server order.
///
/// Starts at `start` and keeps every later file whose numeric suffix lies
/// between the start and stop suffixes. Without `stop` there is no upper
/// bound.
pub fn in_range_files(
    files: &[BinlogFile],
    start: &str,
    stop: Option<&str>,
) -> Result<Vec<String>, PreconditionError> {
    let start_id = binlog_file_suffix(start).unwrap_or(0);
    let stop_id = stop.and_then(binlog_file_suffix);

    let mut found = false;
    let mut selected = Vec::new();
    for file in files {
        if file.name == start {
            found = true;
        }
        if !found {
            continue;
        }
        let Some(id) = binlog_file_suffix(&file.name) else {
            continue;
        };
        if id >= start_id && stop_id.is_none_or(|stop_id| id <= stop_id) {
            selected.push(file.name.clone());
        }
    }

    if !found {
        return Err(PreconditionError::StartFileNotFound(start.to_string()));
    }
    Ok(selected)
}
