//! The stream driver.
//!
//! Owns the position tracker and the table metadata cache and moves every
//! event through filter → decoder → synthesizer → output, strictly in
//! order, until one of the stop conditions fires:
//!
//! - bounded mode: the idle timeout passes without an event
//! - the source reports end of stream or fails
//! - bounded mode: a rotation names a file outside the requested range
//! - bounded mode: the stop file's stop position is reached
//! - the cancellation token fires

use crate::config::RunConfig;
use crate::filter;
use crate::metadata::{is_schema_change, TableMetadataCache};
use crate::output::OutputStatement;
use crate::position::PositionTracker;
use crate::synth::{synthesize, synthesize_query};
use binlog_core::{ChangeEvent, EventPayload, EventSource, Pulled, RowsEvent, StreamPosition};
use mysql_types::{decode_rows, DecodeOptions};
use std::fmt;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Init,
    Streaming,
    Stopped(Outcome),
}

/// Why the driver stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A precondition failed before streaming
    Precondition,
    IdleTimeout,
    EndOfStream,
    StopPosition,
    RotateOutOfRange(String),
    Cancelled,
    SourceError,
    OutputError,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Precondition => write!(f, "precondition failed"),
            StopReason::IdleTimeout => write!(f, "idle timeout"),
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::StopPosition => write!(f, "stop position reached"),
            StopReason::RotateOutOfRange(file) => write!(f, "rotated to {file}, outside the requested files"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::SourceError => write!(f, "source error"),
            StopReason::OutputError => write!(f, "output error"),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: Outcome,
    pub reason: StopReason,
    pub last_error: Option<String>,
    pub statements_emitted: u64,
    pub events_seen: u64,
    /// Rows events skipped because they could not be decoded
    pub decode_skips: u64,
    /// Where to resume: end of the last event with a real offset
    pub last_position: Option<StreamPosition>,
}

impl RunReport {
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    pub fn log(&self) {
        let position = self
            .last_position
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        info!(
            "Stopped ({:?}): {}; {} statements from {} events, {} skipped, last position {}",
            self.outcome,
            self.reason,
            self.statements_emitted,
            self.events_seen,
            self.decode_skips,
            position
        );
        if let Some(e) = &self.last_error {
            error!("Last error: {e}");
        }
    }
}

/// Where streaming starts and which files it may rotate into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSetup {
    pub start_file: String,
    /// Offset streaming starts from in `start_file`
    pub start_position: u64,
    /// Ignored in never-stop mode
    pub in_range_files: Vec<String>,
}

enum Flow {
    Continue,
    Stop(StopReason),
}

#[derive(Debug, Default)]
struct Counters {
    statements_emitted: u64,
    events_seen: u64,
    decode_skips: u64,
}

pub struct StreamDriver {
    config: RunConfig,
    metadata: TableMetadataCache,
    decode_options: DecodeOptions,
    cancel: CancellationToken,
    state: DriverState,
}

impl StreamDriver {
    pub fn new(config: RunConfig, metadata: TableMetadataCache, cancel: CancellationToken) -> Self {
        let decode_options = DecodeOptions::with_timestamp_zone(config.time_zone);
        Self {
            config,
            metadata,
            decode_options,
            cancel,
            state: DriverState::Init,
        }
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn metadata(&self) -> &TableMetadataCache {
        &self.metadata
    }

    /// Stop before streaming because a precondition failed.
    pub fn abort(&mut self, error: impl fmt::Display) -> RunReport {
        self.state = DriverState::Stopped(Outcome::Error);
        RunReport {
            outcome: Outcome::Error,
            reason: StopReason::Precondition,
            last_error: Some(error.to_string()),
            statements_emitted: 0,
            events_seen: 0,
            decode_skips: 0,
            last_position: None,
        }
    }

    /// Stream `source` until a stop condition, writing one line per statement to `out`.
    pub async fn run<W: Write>(
        &mut self,
        source: &mut dyn EventSource,
        setup: StreamSetup,
        out: &mut W,
    ) -> RunReport {
        self.state = DriverState::Streaming;
        let mut tracker = PositionTracker::new(setup.start_file, setup.start_position);
        let mut counters = Counters::default();
        let deadline = self.config.pull_deadline();
        info!(
            source = source.source_type(),
            "Streaming from {} (flashback: {}, stop never: {})",
            tracker.current_file(),
            self.config.filter.flashback,
            self.config.filter.stop_never
        );

        let (outcome, reason, last_error) = loop {
            let pulled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                pulled = source.pull(deadline) => Some(pulled),
            };
            let Some(pulled) = pulled else {
                break (Outcome::Ok, StopReason::Cancelled, None);
            };

            let event = match pulled {
                Ok(Pulled::Event(event)) => event,
                Ok(Pulled::Timeout) => break (Outcome::Ok, StopReason::IdleTimeout, None),
                Ok(Pulled::EndOfStream) => break (Outcome::Ok, StopReason::EndOfStream, None),
                Err(e) => {
                    error!("Event source failed: {e}");
                    break (Outcome::Error, StopReason::SourceError, Some(e.to_string()));
                }
            };

            match self
                .handle_event(event, &mut tracker, &setup.in_range_files, &mut counters, out)
                .await
            {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop(reason)) => break (Outcome::Ok, reason, None),
                Err(e) => {
                    error!("Failed to write output: {e}");
                    break (Outcome::Error, StopReason::OutputError, Some(e.to_string()));
                }
            }
        };

        self.state = DriverState::Stopped(outcome);
        RunReport {
            outcome,
            reason,
            last_error,
            statements_emitted: counters.statements_emitted,
            events_seen: counters.events_seen,
            decode_skips: counters.decode_skips,
            last_position: tracker.last_position(),
        }
    }

    async fn handle_event<W: Write>(
        &mut self,
        event: ChangeEvent,
        tracker: &mut PositionTracker,
        in_range_files: &[String],
        counters: &mut Counters,
        out: &mut W,
    ) -> std::io::Result<Flow> {
        counters.events_seen += 1;
        let (start, end) = tracker.observe(event.end_log_position());
        debug!(
            event_type = ?event.header.event_type,
            end_log_position = end,
            "Event"
        );

        match &event.payload {
            EventPayload::Rotate(rotate) => {
                let in_range = in_range_files.iter().any(|f| *f == rotate.next_file);
                if !self.config.filter.stop_never && !in_range {
                    return Ok(Flow::Stop(StopReason::RotateOutOfRange(
                        rotate.next_file.clone(),
                    )));
                }
                tracker.on_rotate(rotate.next_file.clone());
                info!("Rotate to {}", rotate.next_file);
            }
            EventPayload::TableMap(table_map) => {
                self.metadata.on_table_map(table_map).await;
            }
            EventPayload::Query(query) if is_schema_change(&query.query) => {
                self.metadata.invalidate_catalog();
            }
            _ => {}
        }

        if filter::accept(&event, tracker.current_file(), &self.config.filter) {
            let statements = self.statements(&event, counters);
            for sql in statements {
                let line = OutputStatement::new(
                    sql,
                    start,
                    end,
                    event.timestamp(),
                    &self.config.time_zone,
                );
                writeln!(out, "{line}")?;
                counters.statements_emitted += 1;
            }
            out.flush()?;
        }

        let filter = &self.config.filter;
        if !filter.stop_never
            && filter.stop_position != 0
            && filter.is_stop_file(tracker.current_file())
            && end >= filter.stop_position
        {
            return Ok(Flow::Stop(StopReason::StopPosition));
        }
        Ok(Flow::Continue)
    }

    fn statements(&self, event: &ChangeEvent, counters: &mut Counters) -> Vec<String> {
        let flashback = self.config.filter.flashback;
        let statements = match &event.payload {
            EventPayload::Query(query) => vec![synthesize_query(&query.query, flashback)],
            EventPayload::Rows(rows) => self.row_statements(rows, event.end_log_position(), counters),
            _ => Vec::new(),
        };
        statements.into_iter().filter(|s| !s.is_empty()).collect()
    }

    fn row_statements(&self, rows: &RowsEvent, end: u64, counters: &mut Counters) -> Vec<String> {
        let flashback = self.config.filter.flashback;
        let Some(table) = self.metadata.get(rows.table_id) else {
            warn!(
                table_id = rows.table_id,
                end_log_position = end,
                "Skipping rows event for a table id without a table map"
            );
            counters.decode_skips += 1;
            return Vec::new();
        };

        match decode_rows(rows, table, &self.decode_options) {
            Ok(changes) => changes
                .iter()
                .map(|change| synthesize(change, table, flashback))
                .collect(),
            Err(e) => {
                warn!(
                    table_id = rows.table_id,
                    end_log_position = end,
                    "Skipping rows event for {}.{}: {e}",
                    table.schema,
                    table.table
                );
                counters.decode_skips += 1;
                Vec::new()
            }
        }
    }
}
