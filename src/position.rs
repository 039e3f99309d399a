//! Position tracking across the run.

use binlog_core::position::FIRST_EVENT_OFFSET;
use binlog_core::StreamPosition;

/// The active binlog file plus the end offsets of the last two events.
///
/// The window is not per file: after a rotation the first event's
/// "previous" offset still belongs to the old file.
///
/// Synthetic events a server sends at dump start carry end offset 0. They
/// take part in the window but never become a resume point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionTracker {
    file: String,
    window: Option<[u64; 2]>,
    start: StreamPosition,
    resume: Option<StreamPosition>,
}

impl PositionTracker {
    pub fn new(file: impl Into<String>, start_position: u64) -> Self {
        let file = file.into();
        Self {
            start: StreamPosition::new(file.clone(), start_position),
            file,
            window: None,
            resume: None,
        }
    }

    /// Record an event's end offset and return `(previous end, current end)`.
    pub fn observe(&mut self, end: u64) -> (u64, u64) {
        let window = match self.window {
            None => [end, end],
            Some([_, last]) => [last, end],
        };
        self.window = Some(window);
        if end >= FIRST_EVENT_OFFSET {
            self.resume = Some(StreamPosition::new(self.file.clone(), end));
        }
        (window[0], window[1])
    }

    /// Switch the active file; the offset window is kept.
    pub fn on_rotate(&mut self, next_file: impl Into<String>) {
        self.file = next_file.into();
    }

    pub fn current_file(&self) -> &str {
        &self.file
    }

    /// Position after the most recent event with a real offset, or the
    /// start position when every event so far was synthetic.
    pub fn last_position(&self) -> Option<StreamPosition> {
        self.window?;
        Some(self.resume.clone().unwrap_or_else(|| self.start.clone()))
    }
}
