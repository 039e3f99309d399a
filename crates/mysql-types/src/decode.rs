//! Row image decoding: raw rows-event buffers → [`RowChange`] lists.
//!
//! A rows event holds one or more rows back to back. Each row image is a
//! null bitmap (one bit per *present* column) followed by the non-NULL
//! values of the present columns, in declaration order, each encoded
//! according to its column type and TABLE_MAP metadata.

use crate::decimal::{decode_decimal, precision_and_scale};
use crate::json::decode_json;
use crate::reader::RowReader;
use crate::temporal;
use crate::zone::DisplayZone;
use binlog_core::bitmap::{byte_len, count_set_bits, is_bit_set};
use binlog_core::{
    ColumnDescriptor, ColumnType, RowChange, RowImage, RowsEvent, RowsKind, TableDescriptor,
    Value,
};
use thiserror::Error;
use tracing::trace;

/// Error while decoding a rows event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("truncated row buffer: needed {needed} bytes at offset {offset}, {remaining} left")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("unsupported column type {column_type:?} for column {column}")]
    UnsupportedType {
        column: String,
        column_type: ColumnType,
    },
    #[error("rows event has {event} columns but table {table} has {descriptor}")]
    ColumnCountMismatch {
        table: String,
        descriptor: usize,
        event: usize,
    },
    #[error("invalid {what}: {detail}")]
    Invalid { what: &'static str, detail: String },
    #[error("invalid binary JSON: {0}")]
    Json(String),
}

/// Settings that affect how values are rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Zone TIMESTAMP columns are rendered in
    pub timestamp_zone: DisplayZone,
}

impl DecodeOptions {
    pub fn with_timestamp_zone(timestamp_zone: DisplayZone) -> Self {
        Self { timestamp_zone }
    }
}

/// Decode every row of `event` against `table`.
///
/// Rows come out in buffer order. An UPDATE row is a before image followed
/// by an after image; INSERT and DELETE rows have a single image.
pub fn decode_rows(
    event: &RowsEvent,
    table: &TableDescriptor,
    options: &DecodeOptions,
) -> Result<Vec<RowChange>, DecodeError> {
    if event.column_count != table.column_count() {
        return Err(DecodeError::ColumnCountMismatch {
            table: format!("{}.{}", table.schema, table.table),
            descriptor: table.column_count(),
            event: event.column_count,
        });
    }

    let after_present = event
        .columns_present_after
        .as_deref()
        .unwrap_or(&event.columns_present);

    let mut reader = RowReader::new(&event.rows_data);
    let mut changes = Vec::new();
    while !reader.is_empty() {
        let row_start = reader.position();
        let change = match event.kind {
            RowsKind::Insert => RowChange::Insert {
                after: read_image(&mut reader, table, &event.columns_present, options)?,
            },
            RowsKind::Delete => RowChange::Delete {
                before: read_image(&mut reader, table, &event.columns_present, options)?,
            },
            RowsKind::Update => {
                let before = read_image(&mut reader, table, &event.columns_present, options)?;
                let after = read_image(&mut reader, table, after_present, options)?;
                RowChange::Update { before, after }
            }
        };
        if reader.position() == row_start {
            return Err(DecodeError::Invalid {
                what: "rows event",
                detail: format!("{} trailing bytes with no columns present", reader.remaining()),
            });
        }
        changes.push(change);
    }

    trace!(
        table_id = event.table_id,
        table = %table.table,
        rows = changes.len(),
        "Decoded rows event"
    );
    Ok(changes)
}

fn read_image(
    reader: &mut RowReader<'_>,
    table: &TableDescriptor,
    present: &[u8],
    options: &DecodeOptions,
) -> Result<RowImage, DecodeError> {
    let present_count = count_set_bits(present, table.column_count());
    let null_bitmap = reader.take(byte_len(present_count))?;

    let mut image = RowImage::with_capacity(present_count);
    let mut null_idx = 0;
    for (idx, column) in table.columns.iter().enumerate() {
        if !is_bit_set(present, idx) {
            continue;
        }
        let value = if is_bit_set(null_bitmap, null_idx) {
            Value::Null
        } else {
            decode_value(reader, column, options)?
        };
        null_idx += 1;
        image.push(column.name.clone(), value);
    }
    Ok(image)
}

/// Decode a single non-NULL column value.
pub fn decode_value(
    reader: &mut RowReader<'_>,
    column: &ColumnDescriptor,
    options: &DecodeOptions,
) -> Result<Value, DecodeError> {
    let meta = column.meta;
    let value = match column.column_type {
        ColumnType::Tiny => integer(reader, 1, column.unsigned)?,
        ColumnType::Short => integer(reader, 2, column.unsigned)?,
        ColumnType::Int24 => integer(reader, 3, column.unsigned)?,
        ColumnType::Long => integer(reader, 4, column.unsigned)?,
        ColumnType::LongLong => integer(reader, 8, column.unsigned)?,
        ColumnType::Float => {
            let f = f32::from_bits(reader.u32_le()?);
            // Go through the shortest f32 representation so 1.1 stays 1.1
            Value::Float(f.to_string().parse::<f64>().unwrap_or(f64::from(f)))
        }
        ColumnType::Double => Value::Float(f64::from_bits(reader.uint_le(8)?)),
        ColumnType::NewDecimal => {
            let (precision, scale) = precision_and_scale(meta);
            Value::Decimal(decode_decimal(reader, precision, scale)?)
        }
        ColumnType::Year => match reader.u8()? {
            0 => Value::Int(0),
            y => Value::Int(1900 + i64::from(y)),
        },
        ColumnType::Date | ColumnType::NewDate => Value::Temporal(temporal::decode_date(reader)?),
        ColumnType::Time => Value::Temporal(temporal::decode_time(reader)?),
        ColumnType::Time2 => Value::Temporal(temporal::decode_time2(reader, meta as u8)?),
        ColumnType::DateTime => Value::Temporal(temporal::decode_datetime(reader)?),
        ColumnType::DateTime2 => {
            Value::Temporal(temporal::decode_datetime2(reader, meta as u8)?)
        }
        ColumnType::Timestamp => Value::Temporal(temporal::decode_timestamp(
            reader,
            &options.timestamp_zone,
        )?),
        ColumnType::Timestamp2 => Value::Temporal(temporal::decode_timestamp2(
            reader,
            meta as u8,
            &options.timestamp_zone,
        )?),
        ColumnType::Varchar | ColumnType::VarString => {
            let prefix = if meta < 256 { 1 } else { 2 };
            Value::from_bytes(reader.length_prefixed(prefix)?.to_vec())
        }
        ColumnType::String => {
            let (real_type, length) = string_real_type(meta);
            match real_type {
                ColumnType::Enum => enum_value(reader, column, (length & 0xff) as usize)?,
                ColumnType::Set => set_value(reader, column, (length & 0xff) as usize)?,
                _ => {
                    let prefix = if length < 256 { 1 } else { 2 };
                    Value::from_bytes(reader.length_prefixed(prefix)?.to_vec())
                }
            }
        }
        ColumnType::Enum => enum_value(reader, column, (meta & 0xff) as usize)?,
        ColumnType::Set => set_value(reader, column, (meta & 0xff) as usize)?,
        ColumnType::Blob
        | ColumnType::TinyBlob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob => {
            Value::from_bytes(reader.length_prefixed(blob_prefix(column)?)?.to_vec())
        }
        ColumnType::Geometry | ColumnType::Vector => {
            Value::Bytes(reader.length_prefixed(blob_prefix(column)?)?.to_vec())
        }
        ColumnType::Json => {
            let doc = reader.length_prefixed(blob_prefix(column)?)?;
            Value::Json(decode_json(doc)?)
        }
        ColumnType::Bit => {
            let bits = usize::from(meta >> 8) * 8 + usize::from(meta & 0xff);
            Value::UInt(reader.uint_be(byte_len(bits).min(8))?)
        }
        ColumnType::Null => Value::Null,
        ColumnType::Decimal | ColumnType::TypedArray | ColumnType::Unknown(_) => {
            return Err(DecodeError::UnsupportedType {
                column: column.name.clone(),
                column_type: column.column_type,
            })
        }
    };
    Ok(value)
}

fn integer(reader: &mut RowReader<'_>, width: usize, unsigned: bool) -> Result<Value, DecodeError> {
    Ok(if unsigned {
        Value::UInt(reader.uint_le(width)?)
    } else {
        Value::Int(reader.int_le(width)?)
    })
}

/// Split STRING metadata into the real column type and the maximum byte length.
///
/// CHAR columns longer than 255 bytes borrow two bits of the type byte for
/// the length.
pub fn string_real_type(meta: u16) -> (ColumnType, u16) {
    if meta < 256 {
        return (ColumnType::String, meta);
    }
    let type_byte = (meta >> 8) as u8;
    let low = meta & 0xff;
    if type_byte & 0x30 != 0x30 {
        let length = low | (u16::from((type_byte & 0x30) ^ 0x30) << 4);
        (ColumnType::from_code(type_byte | 0x30), length)
    } else {
        (ColumnType::from_code(type_byte), low)
    }
}

fn blob_prefix(column: &ColumnDescriptor) -> Result<usize, DecodeError> {
    match column.meta {
        1..=4 => Ok(column.meta as usize),
        other => Err(DecodeError::Invalid {
            what: "length prefix size",
            detail: format!("{other} for column {}", column.name),
        }),
    }
}

fn enum_value(
    reader: &mut RowReader<'_>,
    column: &ColumnDescriptor,
    width: usize,
) -> Result<Value, DecodeError> {
    let index = reader.uint_le(width.clamp(1, 2))?;
    let Some(labels) = &column.labels else {
        return Ok(Value::UInt(index));
    };
    Ok(match index {
        0 => Value::Text(String::new()),
        i => labels
            .get(i as usize - 1)
            .map(|label| Value::Text(label.clone()))
            .unwrap_or(Value::UInt(i)),
    })
}

fn set_value(
    reader: &mut RowReader<'_>,
    column: &ColumnDescriptor,
    width: usize,
) -> Result<Value, DecodeError> {
    let mask = reader.uint_le(width.clamp(1, 8))?;
    let Some(labels) = &column.labels else {
        return Ok(Value::UInt(mask));
    };
    if labels.len() < 64 && mask >> labels.len() != 0 {
        return Ok(Value::UInt(mask));
    }
    let members: Vec<&str> = labels
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1u64 << bit) != 0)
        .map(|(_, label)| label.as_str())
        .collect();
    Ok(Value::Text(members.join(",")))
}
