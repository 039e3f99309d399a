//! Output line formatting.

use chrono::DateTime;
use mysql_types::DisplayZone;
use std::fmt;

/// Format of the `time` annotation.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One reconstructed statement with its position annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputStatement {
    pub sql: String,
    /// End offset of the previous event
    pub start: u64,
    /// End offset of this event
    pub end: u64,
    pub time: String,
}

impl OutputStatement {
    pub fn new(sql: String, start: u64, end: u64, timestamp: u32, zone: &DisplayZone) -> Self {
        Self {
            sql,
            start,
            end,
            time: format_event_time(timestamp, zone),
        }
    }
}

impl fmt::Display for OutputStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #start {} end {} time {}",
            self.sql, self.start, self.end, self.time
        )
    }
}

/// Render an event timestamp as wall-clock time in `zone`.
pub fn format_event_time(timestamp: u32, zone: &DisplayZone) -> String {
    DateTime::from_timestamp(i64::from(timestamp), 0)
        .map(|dt| zone.format(&dt, TIME_FORMAT))
        .unwrap_or_default()
}
