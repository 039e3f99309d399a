//! The pull interface shared by every event source.

use crate::error::PreconditionError;
use crate::event::ChangeEvent;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Result of a single pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pulled {
    Event(ChangeEvent),
    /// The deadline passed without an event
    Timeout,
    /// The file ended or the server closed the stream
    EndOfStream,
}

/// Error raised by a source while streaming.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("malformed event stream: {0}")]
    Malformed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

/// A strictly ordered stream of decoded change events.
///
/// A single call shape covers both bounded scans and live tailing: with a
/// deadline the call returns [`Pulled::Timeout`] once it passes, without one
/// it blocks until an event arrives or the source fails.
#[async_trait]
pub trait EventSource: Send {
    /// Get the source type identifier
    fn source_type(&self) -> &'static str;

    /// Pull the next event
    async fn pull(&mut self, deadline: Option<Duration>) -> Result<Pulled, SourceError>;
}

/// An in-memory source that replays a fixed list of events.
///
/// Once the list is drained it reports [`Pulled::EndOfStream`], or
/// [`Pulled::Timeout`] when built with [`MemorySource::idle_after_drain`].
#[derive(Debug, Default)]
pub struct MemorySource {
    events: VecDeque<ChangeEvent>,
    idle_after_drain: bool,
}

impl MemorySource {
    pub fn new(events: impl IntoIterator<Item = ChangeEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            idle_after_drain: false,
        }
    }

    /// Report a timeout instead of end-of-stream once drained.
    pub fn idle_after_drain(mut self) -> Self {
        self.idle_after_drain = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl EventSource for MemorySource {
    fn source_type(&self) -> &'static str {
        "memory"
    }

    async fn pull(&mut self, _deadline: Option<Duration>) -> Result<Pulled, SourceError> {
        match self.events.pop_front() {
            Some(event) => Ok(Pulled::Event(event)),
            None if self.idle_after_drain => Ok(Pulled::Timeout),
            None => Ok(Pulled::EndOfStream),
        }
    }
}
