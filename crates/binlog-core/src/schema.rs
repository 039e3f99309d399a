//! Table descriptors built from TABLE_MAP events.

use crate::event::TableMapEvent;
use crate::types::ColumnType;
use serde::{Deserialize, Serialize};

/// One column of a table descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    /// Type metadata from the TABLE_MAP event (lengths, precision, fsp)
    pub meta: u16,
    pub nullable: bool,
    pub unsigned: bool,
    /// ENUM/SET labels in declaration order, when known
    pub labels: Option<Vec<String>>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            meta: 0,
            nullable: true,
            unsigned: false,
            labels: None,
        }
    }

    pub fn with_meta(mut self, meta: u16) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = unsigned;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }
}

/// Column layout of a table, keyed by the table id the server assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_id: u64,
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(
        table_id: u64,
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        Self {
            table_id,
            schema: schema.into(),
            table: table.into(),
            columns,
        }
    }

    /// Build a descriptor from a TABLE_MAP event.
    ///
    /// `names` and `unsigned` override what the event carries; when neither
    /// source knows a column name it becomes positional (`@1`, `@2`, ...).
    pub fn from_table_map(
        event: &TableMapEvent,
        names: Option<&[String]>,
        unsigned: Option<&[bool]>,
        labels: Option<&[Option<Vec<String>>]>,
    ) -> Self {
        let names = names.or(event.column_names.as_deref());
        let unsigned = unsigned.or(event.signedness.as_deref());
        let labels = labels.or(event.labels.as_deref());

        let columns = event
            .column_types
            .iter()
            .enumerate()
            .map(|(idx, column_type)| ColumnDescriptor {
                name: names
                    .and_then(|n| n.get(idx))
                    .cloned()
                    .unwrap_or_else(|| format!("@{}", idx + 1)),
                column_type: *column_type,
                meta: event.column_meta.get(idx).copied().unwrap_or(0),
                nullable: crate::bitmap::is_bit_set(&event.null_bitmap, idx),
                unsigned: unsigned
                    .and_then(|u| u.get(idx))
                    .copied()
                    .unwrap_or(false),
                labels: labels.and_then(|l| l.get(idx)).cloned().flatten(),
            })
            .collect();

        Self {
            table_id: event.table_id,
            schema: event.schema.clone(),
            table: event.table.clone(),
            columns,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
