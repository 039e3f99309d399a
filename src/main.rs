//! Command-line interface for binlog2sql
//!
//! # Usage Examples
//!
//! ```bash
//! # Stream from a server, stopping 3s after the last event
//! binlog2sql --host 127.0.0.1 --user root --password root \
//!   --start-file mysql-bin.000003 --start-position 4 \
//!   --stop-file mysql-bin.000004
//!
//! # Flashback of a local binlog file, as seen from UTC+8
//! binlog2sql --local --local-file ./mysql-bin.000003 --flashback --utc-offset +08:00
//!
//! # Tail forever and record where we stopped
//! binlog2sql --start-file mysql-bin.000010 --stop-never --emit-checkpoints
//!
//! # Continue from the last recorded position
//! binlog2sql --resume --checkpoint-dir .binlog2sql-checkpoints
//! ```
//!
//! ## Checkpoint Format
//! - `mysql-bin.000003:1234` (binlog file and end offset)

use anyhow::Context;
use binlog2sql::driver::{RunReport, StreamDriver, StreamSetup};
use binlog2sql::{Cli, RunConfig, TableMetadataCache};
use binlog_core::position::FIRST_EVENT_OFFSET;
use binlog_core::{EventSource, StreamPosition};
use checkpoint::{Checkpoint, CheckpointConfig, CheckpointManager, CheckpointStorage, StreamPhase};
use clap::Parser;
use mysql_async::Pool;
use mysql_binlog_source::{
    fetch_server_variables, in_range_files, list_binlog_files, new_mysql_pool, random_server_id,
    BinlogCheckpoint, LiveBinlogSource, LocalBinlogSource, MySqlColumnCatalog,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for SQL
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = cli.run_config()?;

    let checkpoints = CheckpointManager::new(CheckpointConfig {
        emit: cli.emit_checkpoints,
        storage: CheckpointStorage::Filesystem {
            dir: cli.checkpoint_dir.clone(),
        },
    });
    if cli.resume {
        let resume_from: BinlogCheckpoint = checkpoints
            .read_checkpoint(StreamPhase::StreamEnd)
            .await
            .with_context(|| format!("Failed to resume from {}", cli.checkpoint_dir.display()))?;
        info!("Resuming from checkpoint {}", resume_from.to_cli_string());
        config.filter.start_file = Some(resume_from.file);
        config.filter.start_position = resume_from.position;
    }

    // Pools connect lazily, so building one does not touch the server yet
    let pool = if cli.local {
        cli.connection().map(|opts| new_mysql_pool(&opts)).transpose()?
    } else {
        Some(new_mysql_pool(&cli.connection_or_default())?)
    };
    let metadata = match &pool {
        Some(pool) => TableMetadataCache::with_catalog(Box::new(MySqlColumnCatalog::new(pool.clone()))),
        None => TableMetadataCache::new(),
    };

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping");
            ctrl_c_cancel.cancel();
        }
    });

    let mut driver = StreamDriver::new(config.clone(), metadata, cancel);
    let report = match open_source(&cli, &config, pool.as_ref()).await {
        Ok((mut source, setup)) => {
            let start = StreamPosition::new(setup.start_file.clone(), setup.start_position);
            checkpoints
                .emit_checkpoint(&BinlogCheckpoint::new(&start), StreamPhase::StreamStart)
                .await?;

            let mut stdout = std::io::stdout();
            let report = driver.run(source.as_mut(), setup, &mut stdout).await;
            if let Some(position) = &report.last_position {
                checkpoints
                    .emit_checkpoint(&BinlogCheckpoint::new(position), StreamPhase::StreamEnd)
                    .await?;
            }
            report
        }
        Err(e) => driver.abort(format!("{e:#}")),
    };
    report.log();

    if let Some(pool) = pool {
        if let Err(e) = pool.disconnect().await {
            warn!("Failed to close MySQL pool: {e}");
        }
    }
    finish(report)
}

fn finish(report: RunReport) -> anyhow::Result<()> {
    if report.is_ok() {
        return Ok(());
    }
    Err(anyhow::anyhow!(
        "{}",
        report
            .last_error
            .unwrap_or_else(|| report.reason.to_string())
    ))
}

/// Check preconditions and open the event source.
async fn open_source(
    cli: &Cli,
    config: &RunConfig,
    pool: Option<&Pool>,
) -> anyhow::Result<(Box<dyn EventSource>, StreamSetup)> {
    if let Some(pool) = pool {
        let server = cli.connection_or_default().server_name();
        check_server(pool, &server).await?;
    }

    if cli.local {
        let path = cli
            .local_file
            .as_ref()
            .context("--local requires --local-file")?;
        let source = LocalBinlogSource::open(path).await?;
        let file_name = source.file_name();
        let setup = StreamSetup {
            start_file: file_name.clone(),
            start_position: FIRST_EVENT_OFFSET,
            in_range_files: vec![file_name],
        };
        return Ok((Box::new(source), setup));
    }

    let pool = pool.context("No MySQL connection configured")?;
    let start_file = config
        .filter
        .start_file
        .clone()
        .context("--start-file is required")?;

    let mut conn = pool.get_conn().await.context("Failed to connect to MySQL")?;
    let files = list_binlog_files(&mut conn).await?;
    drop(conn);
    let in_range = in_range_files(&files, &start_file, config.filter.stop_file.as_deref())?;
    info!("Binlog files in range: {}", in_range.join(", "));

    let source = LiveBinlogSource::connect(
        pool,
        random_server_id(),
        &start_file,
        config.filter.start_position,
    )
    .await
    .with_context(|| format!("Failed to start binlog dump from {start_file}"))?;
    let setup = StreamSetup {
        start_file,
        start_position: config.filter.start_position,
        in_range_files: in_range,
    };
    Ok((Box::new(source), setup))
}

async fn check_server(pool: &Pool, server: &str) -> anyhow::Result<()> {
    let mut conn = pool
        .get_conn()
        .await
        .with_context(|| format!("Failed to connect to {server}"))?;
    let variables = fetch_server_variables(&mut conn).await?;
    variables.validate(server)?;
    info!(
        "{server}: server_id={}, binlog_format={}, binlog_row_image={}",
        variables.server_id, variables.binlog_format, variables.binlog_row_image
    );
    Ok(())
}

