//! Command-line flags.

use crate::config::{parse_datetime, parse_idle_timeout, parse_time_zone, FilterConfig, RunConfig};
use binlog_core::position::FIRST_EVENT_OFFSET;
use binlog_core::PreconditionError;
use checkpoint::DEFAULT_CHECKPOINT_DIR;
use clap::Parser;
use mysql_binlog_source::ConnectionOpts;
use std::path::PathBuf;

/// Reconstruct SQL (or its inverse) from a MySQL binlog.
#[derive(Parser, Debug, Clone)]
#[command(name = "binlog2sql")]
#[command(about = "Reconstruct SQL statements, or their flashback, from MySQL binlogs")]
pub struct Cli {
    /// MySQL host
    #[arg(long, env = "MYSQL_HOST")]
    pub host: Option<String>,

    /// MySQL port
    #[arg(long, default_value = "3306", env = "MYSQL_PORT")]
    pub port: u16,

    /// MySQL user
    #[arg(long, default_value = "root", env = "MYSQL_USER")]
    pub user: String,

    /// MySQL password
    #[arg(long, default_value = "", env = "MYSQL_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Read a local binlog file instead of streaming from the server
    #[arg(long)]
    pub local: bool,

    /// Path of the local binlog file
    #[arg(long)]
    pub local_file: Option<PathBuf>,

    /// Binlog file to start from (e.g. mysql-bin.000003)
    #[arg(long)]
    pub start_file: Option<String>,

    /// Position in the start file to start from
    #[arg(long)]
    pub start_position: Option<u64>,

    /// Last binlog file to read
    #[arg(long)]
    pub stop_file: Option<String>,

    /// Position in the stop file to stop at (0 = end of file)
    #[arg(long, default_value = "0")]
    pub stop_position: u64,

    /// Skip events before this time (YYYY-MM-DD HH:MM:SS)
    #[arg(long)]
    pub start_datetime: Option<String>,

    /// Skip events after this time (YYYY-MM-DD HH:MM:SS)
    #[arg(long)]
    pub stop_datetime: Option<String>,

    /// Only emit INSERT/UPDATE/DELETE
    #[arg(long)]
    pub only_dml: bool,

    /// Emit the statements that undo each change
    #[arg(long)]
    pub flashback: bool,

    /// Keep tailing the binlog instead of stopping at the end
    #[arg(long)]
    pub stop_never: bool,

    /// Stop after this long without events (e.g. 3, 3s, 1m)
    #[arg(long, default_value = "3")]
    pub idle_timeout: String,

    /// Offset for datetime flags, annotations and TIMESTAMP columns (default: local)
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<String>,

    /// Emit checkpoint files at stream start and end
    #[arg(long)]
    pub emit_checkpoints: bool,

    /// Checkpoint directory
    #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
    pub checkpoint_dir: PathBuf,

    /// Start from the latest stream_end checkpoint
    #[arg(long)]
    pub resume: bool,
}

impl Cli {
    /// Connection settings; `None` when no host was given.
    pub fn connection(&self) -> Option<ConnectionOpts> {
        self.host.as_ref().map(|host| ConnectionOpts {
            host: host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
        })
    }

    /// Connection settings, defaulting to localhost.
    pub fn connection_or_default(&self) -> ConnectionOpts {
        self.connection().unwrap_or_else(|| ConnectionOpts {
            host: "127.0.0.1".to_string(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
        })
    }

    /// Validate the flags into an immutable run configuration.
    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        if self.local && self.local_file.is_none() {
            return Err(PreconditionError::InvalidConfig(
                "--local requires --local-file".to_string(),
            )
            .into());
        }
        if !self.local && !self.resume && self.start_file.is_none() {
            return Err(PreconditionError::InvalidConfig(
                "--start-file is required unless --local or --resume is given".to_string(),
            )
            .into());
        }

        let time_zone = parse_time_zone(self.utc_offset.as_deref())?;
        let start_datetime = self
            .start_datetime
            .as_deref()
            .map(|s| parse_datetime(s, &time_zone))
            .transpose()?;
        let stop_datetime = self
            .stop_datetime
            .as_deref()
            .map(|s| parse_datetime(s, &time_zone))
            .transpose()?;

        let filter = FilterConfig {
            start_file: self.start_file.clone(),
            start_position: self.start_position.unwrap_or(FIRST_EVENT_OFFSET),
            stop_file: self.stop_file.clone(),
            stop_position: self.stop_position,
            start_datetime,
            stop_datetime,
            only_dml: self.only_dml,
            flashback: self.flashback,
            stop_never: self.stop_never,
        };
        filter.validate()?;

        Ok(RunConfig {
            filter,
            idle_timeout: parse_idle_timeout(&self.idle_timeout)?,
            time_zone,
        })
    }
}
