//! Decoded replication events.
//!
//! A [`ChangeEvent`] is a common header plus a closed payload variant. The
//! framing codec in `mysql-binlog-source` produces these; everything
//! downstream pattern-matches on [`EventPayload`].

use crate::types::ColumnType;

/// Binlog event type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    StartV3,
    Query,
    Stop,
    Rotate,
    Intvar,
    Rand,
    UserVar,
    FormatDescription,
    Xid,
    TableMap,
    WriteRowsV0,
    UpdateRowsV0,
    DeleteRowsV0,
    WriteRowsV1,
    UpdateRowsV1,
    DeleteRowsV1,
    Incident,
    Heartbeat,
    Ignorable,
    RowsQuery,
    WriteRowsV2,
    UpdateRowsV2,
    DeleteRowsV2,
    Gtid,
    AnonymousGtid,
    PreviousGtids,
    TransactionContext,
    ViewChange,
    XaPrepare,
    PartialUpdateRows,
    TransactionPayload,
    HeartbeatV2,
    Unknown(u8),
}

impl EventType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => EventType::StartV3,
            2 => EventType::Query,
            3 => EventType::Stop,
            4 => EventType::Rotate,
            5 => EventType::Intvar,
            13 => EventType::Rand,
            14 => EventType::UserVar,
            15 => EventType::FormatDescription,
            16 => EventType::Xid,
            19 => EventType::TableMap,
            20 => EventType::WriteRowsV0,
            21 => EventType::UpdateRowsV0,
            22 => EventType::DeleteRowsV0,
            23 => EventType::WriteRowsV1,
            24 => EventType::UpdateRowsV1,
            25 => EventType::DeleteRowsV1,
            26 => EventType::Incident,
            27 => EventType::Heartbeat,
            28 => EventType::Ignorable,
            29 => EventType::RowsQuery,
            30 => EventType::WriteRowsV2,
            31 => EventType::UpdateRowsV2,
            32 => EventType::DeleteRowsV2,
            33 => EventType::Gtid,
            34 => EventType::AnonymousGtid,
            35 => EventType::PreviousGtids,
            36 => EventType::TransactionContext,
            37 => EventType::ViewChange,
            38 => EventType::XaPrepare,
            39 => EventType::PartialUpdateRows,
            40 => EventType::TransactionPayload,
            41 => EventType::HeartbeatV2,
            other => EventType::Unknown(other),
        }
    }

    /// The row-change kind carried by this event type, if any.
    pub fn rows_kind(&self) -> Option<RowsKind> {
        match self {
            EventType::WriteRowsV0 | EventType::WriteRowsV1 | EventType::WriteRowsV2 => {
                Some(RowsKind::Insert)
            }
            EventType::UpdateRowsV0 | EventType::UpdateRowsV1 | EventType::UpdateRowsV2 => {
                Some(RowsKind::Update)
            }
            EventType::DeleteRowsV0 | EventType::DeleteRowsV1 | EventType::DeleteRowsV2 => {
                Some(RowsKind::Delete)
            }
            _ => None,
        }
    }

    /// Version 2 rows events carry an extra-data block after the flags.
    pub fn has_rows_extra_data(&self) -> bool {
        matches!(
            self,
            EventType::WriteRowsV2 | EventType::UpdateRowsV2 | EventType::DeleteRowsV2
        )
    }
}

/// Fields common to every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    /// Seconds since the epoch, server clock
    pub timestamp: u32,
    pub event_type: EventType,
    pub server_id: u32,
    pub event_length: u32,
    /// Offset immediately after this event in the current file
    pub end_log_position: u64,
    pub flags: u16,
}

impl EventHeader {
    /// Size of a v4 event header on the wire.
    pub const SIZE: usize = 19;
}

/// Row-change kind of a rows event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowsKind {
    Insert,
    Update,
    Delete,
}

/// A WRITE/UPDATE/DELETE_ROWS event with its row buffer still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowsEvent {
    pub kind: RowsKind,
    pub table_id: u64,
    pub flags: u16,
    pub column_count: usize,
    /// Columns present in the before image (or the only image for INSERT/DELETE)
    pub columns_present: Vec<u8>,
    /// Columns present in the after image, UPDATE only
    pub columns_present_after: Option<Vec<u8>>,
    /// Raw row images, decoded against the table descriptor
    pub rows_data: Vec<u8>,
}

/// A statement event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    pub thread_id: u32,
    pub exec_time: u32,
    pub error_code: u16,
    pub schema: String,
    pub query: String,
}

/// Announces that the stream moves to another file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateEvent {
    pub position: u64,
    pub next_file: String,
}

/// Schema-description event: maps a table id to its column layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapEvent {
    pub table_id: u64,
    pub schema: String,
    pub table: String,
    pub column_types: Vec<ColumnType>,
    pub column_meta: Vec<u16>,
    pub null_bitmap: Vec<u8>,
    /// Per-column signedness from the SIGNEDNESS optional metadata field
    pub signedness: Option<Vec<bool>>,
    /// Column names from the COLUMN_NAME optional metadata field
    pub column_names: Option<Vec<String>>,
    /// ENUM/SET labels from optional metadata, indexed by column
    pub labels: Option<Vec<Option<Vec<String>>>>,
}

/// Payload of a decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Rows(RowsEvent),
    Query(QueryEvent),
    Rotate(RotateEvent),
    TableMap(TableMapEvent),
    /// Any event the pipeline does not interpret
    Other,
}

/// A decoded replication event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub header: EventHeader,
    pub payload: EventPayload,
}

impl ChangeEvent {
    pub fn new(header: EventHeader, payload: EventPayload) -> Self {
        Self { header, payload }
    }

    pub fn end_log_position(&self) -> u64 {
        self.header.end_log_position
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn is_row_change(&self) -> bool {
        matches!(self.payload, EventPayload::Rows(_))
    }

    pub fn is_statement(&self) -> bool {
        matches!(self.payload, EventPayload::Query(_))
    }
}
