//! Per-event scope predicate.

use crate::config::FilterConfig;
use binlog_core::{ChangeEvent, EventPayload};

/// Whether `event` is in scope while `current_file` is the active file.
///
/// Rules are applied in order and the first rejection wins.
pub fn accept(event: &ChangeEvent, current_file: &str, config: &FilterConfig) -> bool {
    let is_statement = match &event.payload {
        EventPayload::Rows(_) => false,
        EventPayload::Query(_) => true,
        EventPayload::Rotate(_) | EventPayload::TableMap(_) | EventPayload::Other => return false,
    };

    if config.only_dml && is_statement {
        return false;
    }

    let timestamp = i64::from(event.timestamp());
    if config
        .start_datetime
        .is_some_and(|start| timestamp < start.timestamp())
    {
        return false;
    }
    if config
        .stop_datetime
        .is_some_and(|stop| timestamp > stop.timestamp())
    {
        return false;
    }

    let end = event.end_log_position();
    if config.is_stop_file(current_file) && config.stop_position != 0 && end > config.stop_position
    {
        return false;
    }
    if config.is_start_file(current_file) && end < config.start_position {
        return false;
    }

    true
}
