//! Logical row images produced by the row image decoder.
//!
//! Values here are logical, not SQL text: a string is stored unescaped and
//! quoting/escaping is the synthesizer's job.

use serde::{Deserialize, Serialize};

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,

    /// Signed integer (TINYINT..BIGINT, YEAR)
    Int(i64),

    /// Unsigned integer (UNSIGNED columns, BIT, ENUM index, SET bitmask)
    UInt(u64),

    /// FLOAT or DOUBLE
    Float(f64),

    /// Exact decimal kept as its textual representation
    Decimal(String),

    /// Character data that decoded as valid UTF-8
    Text(String),

    /// Binary data or character data in another encoding
    Bytes(Vec<u8>),

    /// DATE / TIME / DATETIME / TIMESTAMP in canonical textual form
    Temporal(String),

    /// JSON document serialized as compact text
    Json(String),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Build a string-ish value from raw bytes, keeping the bytes when they are not UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => Self::Text(s),
            Err(e) => Self::Bytes(e.into_bytes()),
        }
    }
}

/// Ordered mapping from column name to value.
///
/// Order follows the table descriptor's declared column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowImage {
    columns: Vec<(String, Value)>,
}

impl RowImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push((name.into(), value));
    }

    /// Look up a value by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for RowImage {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// One affected row of a rows event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowChange {
    Insert { after: RowImage },
    Update { before: RowImage, after: RowImage },
    Delete { before: RowImage },
}

impl RowChange {
    pub fn kind_str(&self) -> &'static str {
        match self {
            RowChange::Insert { .. } => "INSERT",
            RowChange::Update { .. } => "UPDATE",
            RowChange::Delete { .. } => "DELETE",
        }
    }
}
