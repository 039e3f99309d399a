//! Core types for the binlog2sql pipeline.
//!
//! This crate provides the foundational types shared by the decoder, the
//! event sources and the stream driver:
//!
//! - [`ChangeEvent`] - A decoded replication event (header + closed payload variant)
//! - [`TableDescriptor`] - Column layout announced by a TABLE_MAP event
//! - [`Value`] / [`RowImage`] / [`RowChange`] - Logical row images
//! - [`EventSource`] - The pull interface every event source implements
//! - [`StreamPosition`] - A `(file, offset)` pair used for annotations and checkpoints
//!
//! # Architecture
//!
//! ```text
//! binlog-core (this crate)
//!    │
//!    ├─── mysql-types          (decodes RowsEvent buffers into RowChange, renders literals)
//!    ├─── mysql-binlog-source  (produces ChangeEvent from a server or a local file)
//!    └─── binlog2sql           (filter, tracker, synthesizer, driver)
//! ```
//!
//! # Example
//!
//! ```rust
//! use binlog_core::{RowImage, Value};
//!
//! let mut image = RowImage::new();
//! image.push("id", Value::Int(5));
//! image.push("name", Value::Text("x".to_string()));
//!
//! assert_eq!(image.len(), 2);
//! assert_eq!(image.get("id"), Some(&Value::Int(5)));
//! ```

pub mod bitmap;
pub mod error;
pub mod event;
pub mod position;
pub mod schema;
pub mod source;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use error::PreconditionError;
pub use event::{
    ChangeEvent, EventHeader, EventPayload, EventType, QueryEvent, RotateEvent, RowsEvent,
    RowsKind, TableMapEvent,
};
pub use position::StreamPosition;
pub use schema::{ColumnDescriptor, TableDescriptor};
pub use source::{EventSource, MemorySource, Pulled, SourceError};
pub use types::ColumnType;
pub use values::{RowChange, RowImage, Value};
