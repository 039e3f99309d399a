//! Binlog event framing: header and body bytes → [`ChangeEvent`].
//!
//! Only the events the pipeline interprets get a structured payload
//! (QUERY, ROTATE, TABLE_MAP and the rows events); everything else decodes
//! to [`EventPayload::Other`]. The FORMAT_DESCRIPTION event is inspected
//! for the checksum algorithm and table id width but otherwise ignored.

use binlog_core::bitmap::byte_len;
use binlog_core::{
    ChangeEvent, ColumnType, EventHeader, EventPayload, EventType, QueryEvent, RotateEvent,
    RowsEvent, RowsKind, TableMapEvent,
};
use mysql_types::decode::string_real_type;
use mysql_types::{DecodeError, RowReader};
use thiserror::Error;
use tracing::{debug, trace};

/// Magic bytes at the start of every binlog file.
pub const BINLOG_MAGIC: [u8; 4] = [0xfe, b'b', b'i', b'n'];

const CHECKSUM_LEN: usize = 4;
const CHECKSUM_ALG_CRC32: u8 = 1;
const QUERY_POST_HEADER_LEN: usize = 13;
const FDE_SERVER_VERSION_LEN: usize = 50;
const TABLE_MAP_POST_HEADER_INDEX: usize = 18;

// TABLE_MAP optional metadata field types
const META_SIGNEDNESS: u8 = 1;
const META_COLUMN_NAME: u8 = 4;
const META_SET_STR_VALUE: u8 = 5;
const META_ENUM_STR_VALUE: u8 = 6;

/// Error while framing or parsing an event.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("event {event_type:?} at {end_log_position}: {source}")]
    Payload {
        event_type: EventType,
        end_log_position: u64,
        #[source]
        source: DecodeError,
    },
    #[error("malformed event header: {0}")]
    Header(String),
}

/// Whether event bodies still carry their trailing CRC32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Detect from the FORMAT_DESCRIPTION event and strip (binlog files)
    Detect,
    /// The transport already removed checksums (replication stream)
    Stripped,
}

/// Stateful event decoder.
///
/// State learnt from the FORMAT_DESCRIPTION event (checksum presence and
/// table id width) applies to every later event.
#[derive(Debug, Clone)]
pub struct BinlogCodec {
    mode: ChecksumMode,
    checksum_len: usize,
    table_id_len: usize,
}

impl BinlogCodec {
    pub fn new(mode: ChecksumMode) -> Self {
        Self {
            mode,
            checksum_len: 0,
            table_id_len: 6,
        }
    }

    /// Codec for reading binlog files from disk.
    pub fn for_file() -> Self {
        Self::new(ChecksumMode::Detect)
    }

    /// Codec for bodies delivered by a replication client.
    pub fn for_stream() -> Self {
        Self::new(ChecksumMode::Stripped)
    }

    pub fn checksum_len(&self) -> usize {
        self.checksum_len
    }

    /// Parse a v4 event header.
    pub fn decode_header(bytes: &[u8]) -> Result<EventHeader, CodecError> {
        if bytes.len() < EventHeader::SIZE {
            return Err(CodecError::Header(format!(
                "expected {} bytes, got {}",
                EventHeader::SIZE,
                bytes.len()
            )));
        }
        let header =
            read_header(&mut RowReader::new(bytes)).map_err(|e| CodecError::Header(e.to_string()))?;

        if (header.event_length as usize) < EventHeader::SIZE {
            return Err(CodecError::Header(format!(
                "event length {} is shorter than the header",
                header.event_length
            )));
        }
        Ok(header)
    }

    /// Decode the body that follows `header`.
    pub fn decode_event(
        &mut self,
        header: EventHeader,
        body: &[u8],
    ) -> Result<ChangeEvent, CodecError> {
        let event_type = header.event_type;
        let end_log_position = header.end_log_position;
        let wrap = |source: DecodeError| CodecError::Payload {
            event_type,
            end_log_position,
            source,
        };

        if event_type == EventType::FormatDescription {
            self.observe_format_description(body).map_err(wrap)?;
            return Ok(ChangeEvent::new(header, EventPayload::Other));
        }

        let body = &body[..body.len().saturating_sub(self.checksum_len)];
        let payload = match event_type {
            EventType::Query => EventPayload::Query(parse_query(body).map_err(wrap)?),
            EventType::Rotate => EventPayload::Rotate(parse_rotate(body).map_err(wrap)?),
            EventType::TableMap => {
                EventPayload::TableMap(self.parse_table_map(body).map_err(wrap)?)
            }
            t if t.rows_kind().is_some() => {
                EventPayload::Rows(self.parse_rows(t, body).map_err(wrap)?)
            }
            _ => EventPayload::Other,
        };
        trace!(?event_type, end_log_position, "Decoded event");
        Ok(ChangeEvent::new(header, payload))
    }

    fn observe_format_description(&mut self, body: &[u8]) -> Result<(), DecodeError> {
        let mut reader = RowReader::new(body);
        let _binlog_version = reader.u16_le()?;
        let version_bytes = reader.take(FDE_SERVER_VERSION_LEN)?;
        let _created = reader.u32_le()?;
        let _header_len = reader.u8()?;

        let server_version = String::from_utf8_lossy(version_bytes)
            .trim_end_matches('\0')
            .to_string();
        let has_checksum_field = supports_checksum(&server_version);

        // Post-header lengths, one per event type, then alg + CRC when supported
        let post_headers = if has_checksum_field {
            let end = body.len().saturating_sub(1 + CHECKSUM_LEN);
            body.get(reader.position()..end).unwrap_or_default()
        } else {
            reader.rest()
        };
        if let Some(len) = post_headers.get(TABLE_MAP_POST_HEADER_INDEX) {
            self.table_id_len = if *len == 6 { 4 } else { 6 };
        }

        if self.mode == ChecksumMode::Detect && has_checksum_field && body.len() > CHECKSUM_LEN {
            let alg = body[body.len() - 1 - CHECKSUM_LEN];
            self.checksum_len = if alg == CHECKSUM_ALG_CRC32 {
                CHECKSUM_LEN
            } else {
                0
            };
        }
        debug!(
            server_version = %server_version,
            checksum_len = self.checksum_len,
            table_id_len = self.table_id_len,
            "Format description"
        );
        Ok(())
    }

    fn parse_table_map(&self, body: &[u8]) -> Result<TableMapEvent, DecodeError> {
        let mut reader = RowReader::new(body);
        let table_id = reader.uint_le(self.table_id_len)?;
        let _flags = reader.u16_le()?;

        let schema = read_name(&mut reader)?;
        let table = read_name(&mut reader)?;

        let column_count = reader.packed_int()? as usize;
        let column_types: Vec<ColumnType> = reader
            .take(column_count)?
            .iter()
            .map(|code| ColumnType::from_code(*code))
            .collect();

        let meta_len = reader.packed_int()? as usize;
        let mut meta_reader = RowReader::new(reader.take(meta_len)?);
        let column_meta = column_types
            .iter()
            .map(|t| read_column_meta(&mut meta_reader, *t))
            .collect::<Result<Vec<_>, _>>()?;

        let null_bitmap = reader.take(byte_len(column_count))?.to_vec();

        let mut event = TableMapEvent {
            table_id,
            schema,
            table,
            column_types,
            column_meta,
            null_bitmap,
            signedness: None,
            column_names: None,
            labels: None,
        };

        let optional = reader.rest();
        if !optional.is_empty() {
            // Optional metadata only adds names and labels, a bad block is not fatal
            if let Err(e) = parse_optional_metadata(&mut event, optional) {
                debug!(table_id, error = %e, "Ignoring unreadable TABLE_MAP optional metadata");
                event.signedness = None;
                event.column_names = None;
                event.labels = None;
            }
        }
        Ok(event)
    }

    fn parse_rows(&self, event_type: EventType, body: &[u8]) -> Result<RowsEvent, DecodeError> {
        let kind = event_type.rows_kind().ok_or_else(|| DecodeError::Invalid {
            what: "rows event type",
            detail: format!("{event_type:?}"),
        })?;

        let mut reader = RowReader::new(body);
        let table_id = reader.uint_le(self.table_id_len)?;
        let flags = reader.u16_le()?;
        if event_type.has_rows_extra_data() {
            // Length includes its own two bytes
            let extra_len = reader.u16_le()? as usize;
            reader.skip(extra_len.saturating_sub(2))?;
        }

        let column_count = reader.packed_int()? as usize;
        let columns_present = reader.take(byte_len(column_count))?.to_vec();
        let columns_present_after = if kind == RowsKind::Update {
            Some(reader.take(byte_len(column_count))?.to_vec())
        } else {
            None
        };

        Ok(RowsEvent {
            kind,
            table_id,
            flags,
            column_count,
            columns_present,
            columns_present_after,
            rows_data: reader.rest().to_vec(),
        })
    }
}

fn read_header(reader: &mut RowReader<'_>) -> Result<EventHeader, DecodeError> {
    Ok(EventHeader {
        timestamp: reader.u32_le()?,
        event_type: EventType::from_code(reader.u8()?),
        server_id: reader.u32_le()?,
        event_length: reader.u32_le()?,
        end_log_position: u64::from(reader.u32_le()?),
        flags: reader.u16_le()?,
    })
}

fn parse_query(body: &[u8]) -> Result<QueryEvent, DecodeError> {
    let mut reader = RowReader::new(body);
    let thread_id = reader.u32_le()?;
    let exec_time = reader.u32_le()?;
    let schema_len = reader.u8()? as usize;
    let error_code = reader.u16_le()?;
    let status_vars_len = reader.u16_le()? as usize;
    debug_assert_eq!(reader.position(), QUERY_POST_HEADER_LEN);

    reader.skip(status_vars_len)?;
    let schema = String::from_utf8_lossy(reader.take(schema_len)?).into_owned();
    reader.skip(1)?;
    let query = String::from_utf8_lossy(reader.rest()).into_owned();

    Ok(QueryEvent {
        thread_id,
        exec_time,
        error_code,
        schema,
        query,
    })
}

fn parse_rotate(body: &[u8]) -> Result<RotateEvent, DecodeError> {
    let mut reader = RowReader::new(body);
    let position = reader.uint_le(8)?;
    let next_file = String::from_utf8_lossy(reader.rest()).into_owned();
    Ok(RotateEvent {
        position,
        next_file,
    })
}

/// A length-prefixed, NUL-terminated schema or table name.
fn read_name(reader: &mut RowReader<'_>) -> Result<String, DecodeError> {
    let len = reader.u8()? as usize;
    let name = String::from_utf8_lossy(reader.take(len)?).into_owned();
    reader.skip(1)?;
    Ok(name)
}

/// Read one column's TABLE_MAP metadata, normalised to the layout the row
/// decoder expects.
fn read_column_meta(reader: &mut RowReader<'_>, column_type: ColumnType) -> Result<u16, DecodeError> {
    Ok(match column_type {
        ColumnType::Float
        | ColumnType::Double
        | ColumnType::Blob
        | ColumnType::TinyBlob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob
        | ColumnType::Geometry
        | ColumnType::Json
        | ColumnType::Vector
        | ColumnType::Time2
        | ColumnType::DateTime2
        | ColumnType::Timestamp2 => u16::from(reader.u8()?),
        // Little-endian: max length, or bits-in-last-byte then whole bytes
        ColumnType::Varchar | ColumnType::VarString | ColumnType::Bit => reader.u16_le()?,
        // Big-endian: precision then scale, or real type then length
        ColumnType::NewDecimal | ColumnType::String | ColumnType::Enum | ColumnType::Set => {
            reader.uint_be(2)? as u16
        }
        _ => 0,
    })
}

fn parse_optional_metadata(event: &mut TableMapEvent, data: &[u8]) -> Result<(), DecodeError> {
    let mut reader = RowReader::new(data);
    while !reader.is_empty() {
        let field_type = reader.u8()?;
        let len = reader.packed_int()? as usize;
        let mut field = RowReader::new(reader.take(len)?);
        match field_type {
            META_SIGNEDNESS => event.signedness = Some(signedness(event, field.rest())),
            META_COLUMN_NAME => {
                let mut names = Vec::with_capacity(event.column_types.len());
                while !field.is_empty() {
                    let len = field.packed_int()? as usize;
                    names.push(String::from_utf8_lossy(field.take(len)?).into_owned());
                }
                event.column_names = Some(names);
            }
            META_SET_STR_VALUE | META_ENUM_STR_VALUE => {
                let target = if field_type == META_ENUM_STR_VALUE {
                    ColumnType::Enum
                } else {
                    ColumnType::Set
                };
                let mut label_sets = Vec::new();
                while !field.is_empty() {
                    let count = field.packed_int()? as usize;
                    let mut labels = Vec::with_capacity(count);
                    for _ in 0..count {
                        let len = field.packed_int()? as usize;
                        labels.push(String::from_utf8_lossy(field.take(len)?).into_owned());
                    }
                    label_sets.push(labels);
                }
                assign_labels(event, target, label_sets);
            }
            _ => {}
        }
    }
    Ok(())
}

/// The SIGNEDNESS bitmap has one bit per numeric column, most significant bit first.
fn signedness(event: &TableMapEvent, bitmap: &[u8]) -> Vec<bool> {
    let mut numeric_idx = 0;
    event
        .column_types
        .iter()
        .map(|t| {
            if !t.is_numeric() {
                return false;
            }
            let idx = numeric_idx;
            numeric_idx += 1;
            bitmap
                .get(idx / 8)
                .is_some_and(|b| b & (0x80 >> (idx % 8)) != 0)
        })
        .collect()
}

/// Hand label lists out to the ENUM (or SET) columns in column order.
fn assign_labels(event: &mut TableMapEvent, target: ColumnType, label_sets: Vec<Vec<String>>) {
    let count = event.column_types.len();
    let labels = event.labels.get_or_insert_with(|| vec![None; count]);
    let mut sets = label_sets.into_iter();
    for (idx, (column_type, meta)) in event
        .column_types
        .iter()
        .zip(event.column_meta.iter())
        .enumerate()
    {
        let real_type = match column_type {
            ColumnType::String => string_real_type(*meta).0,
            other => *other,
        };
        if real_type == target {
            labels[idx] = sets.next();
        }
    }
}

/// Servers from 5.6.1 on append the checksum algorithm to the FORMAT_DESCRIPTION event.
fn supports_checksum(server_version: &str) -> bool {
    let numeric: Vec<u32> = server_version
        .split(|c: char| !c.is_ascii_digit())
        .take(3)
        .map(|part| part.parse().unwrap_or(0))
        .collect();
    let version = (
        numeric.first().copied().unwrap_or(0),
        numeric.get(1).copied().unwrap_or(0),
        numeric.get(2).copied().unwrap_or(0),
    );
    version >= (5, 6, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(event_type: u8, body_len: usize, end: u32) -> Vec<u8> {
        let mut h = Vec::with_capacity(EventHeader::SIZE);
        h.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        h.push(event_type);
        h.extend_from_slice(&1u32.to_le_bytes());
        h.extend_from_slice(&((EventHeader::SIZE + body_len) as u32).to_le_bytes());
        h.extend_from_slice(&end.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes());
        h
    }

    fn decode(codec: &mut BinlogCodec, event_type: u8, body: &[u8]) -> ChangeEvent {
        let header = BinlogCodec::decode_header(&header(event_type, body.len(), 500)).unwrap();
        codec.decode_event(header, body).unwrap()
    }

    fn fde_body(version: &str, alg: u8) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&4u16.to_le_bytes());
        let mut v = version.as_bytes().to_vec();
        v.resize(FDE_SERVER_VERSION_LEN, 0);
        body.extend_from_slice(&v);
        body.extend_from_slice(&0u32.to_le_bytes());
        body.push(19);
        let mut post_headers = vec![0u8; 41];
        post_headers[TABLE_MAP_POST_HEADER_INDEX] = 8;
        body.extend_from_slice(&post_headers);
        body.push(alg);
        body.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
        body
    }

    #[test]
    fn test_decode_header() {
        let h = BinlogCodec::decode_header(&header(2, 10, 1234)).unwrap();
        assert_eq!(h.event_type, EventType::Query);
        assert_eq!(h.end_log_position, 1234);
        assert_eq!(h.event_length, 29);
        assert_eq!(h.timestamp, 1_700_000_000);

        assert!(BinlogCodec::decode_header(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_checksum_detection_from_format_description() {
        let mut codec = BinlogCodec::for_file();
        decode(&mut codec, 15, &fde_body("8.0.36", CHECKSUM_ALG_CRC32));
        assert_eq!(codec.checksum_len(), 4);

        let mut codec = BinlogCodec::for_file();
        decode(&mut codec, 15, &fde_body("8.0.36-log", 0));
        assert_eq!(codec.checksum_len(), 0);

        // Replication streams never strip
        let mut codec = BinlogCodec::for_stream();
        decode(&mut codec, 15, &fde_body("8.0.36", CHECKSUM_ALG_CRC32));
        assert_eq!(codec.checksum_len(), 0);
    }

    #[test]
    fn test_query_event_with_checksum() {
        let mut codec = BinlogCodec::for_file();
        decode(&mut codec, 15, &fde_body("8.0.36", CHECKSUM_ALG_CRC32));

        let mut body = Vec::new();
        body.extend_from_slice(&7u32.to_le_bytes()); // thread id
        body.extend_from_slice(&0u32.to_le_bytes()); // exec time
        body.push(4); // schema length
        body.extend_from_slice(&0u16.to_le_bytes()); // error code
        body.extend_from_slice(&2u16.to_le_bytes()); // status vars
        body.extend_from_slice(&[0x00, 0x00]);
        body.extend_from_slice(b"shop\0");
        body.extend_from_slice(b"ALTER TABLE t ADD COLUMN y INT");
        body.extend_from_slice(&[1, 2, 3, 4]); // crc

        let event = decode(&mut codec, 2, &body);
        let EventPayload::Query(query) = event.payload else {
            panic!("expected query");
        };
        assert_eq!(query.thread_id, 7);
        assert_eq!(query.schema, "shop");
        assert_eq!(query.query, "ALTER TABLE t ADD COLUMN y INT");
    }

    #[test]
    fn test_rotate_event() {
        let mut codec = BinlogCodec::for_stream();
        let mut body = 4u64.to_le_bytes().to_vec();
        body.extend_from_slice(b"mysql-bin.000004");
        let event = decode(&mut codec, 4, &body);
        assert_eq!(
            event.payload,
            EventPayload::Rotate(RotateEvent {
                position: 4,
                next_file: "mysql-bin.000004".to_string()
            })
        );
    }

    fn table_map_body(optional: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x2a, 0, 0, 0, 0, 0]); // table id 42
        body.extend_from_slice(&1u16.to_le_bytes());
        body.push(4);
        body.extend_from_slice(b"shop\0");
        body.push(1);
        body.extend_from_slice(b"t\0");
        body.push(4); // columns
        body.extend_from_slice(&[3, 15, 246, 254]); // LONG, VARCHAR, NEWDECIMAL, STRING(enum)
        body.push(6); // metadata length
        body.extend_from_slice(&[0x2c, 0x01]); // varchar(300)
        body.extend_from_slice(&[10, 2]); // decimal(10,2)
        body.extend_from_slice(&[247, 1]); // enum, 1 byte
        body.push(0b0000_1110); // nullable: all but id
        body.extend_from_slice(optional);
        body
    }

    #[test]
    fn test_table_map_without_optional_metadata() {
        let mut codec = BinlogCodec::for_stream();
        let event = decode(&mut codec, 19, &table_map_body(&[]));
        let EventPayload::TableMap(map) = event.payload else {
            panic!("expected table map");
        };
        assert_eq!(map.table_id, 42);
        assert_eq!(map.schema, "shop");
        assert_eq!(map.table, "t");
        assert_eq!(
            map.column_types,
            vec![
                ColumnType::Long,
                ColumnType::Varchar,
                ColumnType::NewDecimal,
                ColumnType::String
            ]
        );
        assert_eq!(map.column_meta, vec![0, 300, 0x0a02, (247 << 8) | 1]);
        assert_eq!(map.column_names, None);
    }

    #[test]
    fn test_table_map_optional_metadata() {
        let mut optional = vec![META_SIGNEDNESS, 1, 0b1000_0000];
        optional.extend_from_slice(&[META_COLUMN_NAME, 16, 2, b'i', b'd', 4, b'n', b'a', b'm', b'e']);
        optional.extend_from_slice(&[5, b'p', b'r', b'i', b'c', b'e', 1, b's']);
        optional.extend_from_slice(&[META_ENUM_STR_VALUE, 7, 2, 1, b'a', 3, b'b', b'c', b'd']);

        let mut codec = BinlogCodec::for_stream();
        let event = decode(&mut codec, 19, &table_map_body(&optional));
        let EventPayload::TableMap(map) = event.payload else {
            panic!("expected table map");
        };
        assert_eq!(
            map.column_names,
            Some(vec![
                "id".to_string(),
                "name".to_string(),
                "price".to_string(),
                "s".to_string()
            ])
        );
        // LONG is the first numeric column and flagged unsigned; the decimal is not
        assert_eq!(map.signedness, Some(vec![true, false, false, false]));
        assert_eq!(
            map.labels,
            Some(vec![
                None,
                None,
                None,
                Some(vec!["a".to_string(), "bcd".to_string()])
            ])
        );
    }

    #[test]
    fn test_update_rows_v2() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x2a, 0, 0, 0, 0, 0]);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes()); // empty extra data
        body.push(2);
        body.push(0b11);
        body.push(0b11);
        body.extend_from_slice(&[0xde, 0xad]);

        let mut codec = BinlogCodec::for_stream();
        let event = decode(&mut codec, 31, &body);
        let EventPayload::Rows(rows) = event.payload else {
            panic!("expected rows");
        };
        assert_eq!(rows.kind, RowsKind::Update);
        assert_eq!(rows.table_id, 42);
        assert_eq!(rows.column_count, 2);
        assert_eq!(rows.columns_present_after, Some(vec![0b11]));
        assert_eq!(rows.rows_data, vec![0xde, 0xad]);
    }

    #[test]
    fn test_write_rows_v1_has_no_extra_data() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x2a, 0, 0, 0, 0, 0]);
        body.extend_from_slice(&0u16.to_le_bytes());
        body.push(1);
        body.push(0b1);
        body.extend_from_slice(&[0x00, 0x05]);

        let mut codec = BinlogCodec::for_stream();
        let event = decode(&mut codec, 23, &body);
        let EventPayload::Rows(rows) = event.payload else {
            panic!("expected rows");
        };
        assert_eq!(rows.kind, RowsKind::Insert);
        assert_eq!(rows.columns_present_after, None);
        assert_eq!(rows.rows_data, vec![0x00, 0x05]);
    }

    #[test]
    fn test_uninterpreted_events_are_other() {
        let mut codec = BinlogCodec::for_stream();
        let event = decode(&mut codec, 16, &8u64.to_le_bytes());
        assert_eq!(event.payload, EventPayload::Other);
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let mut codec = BinlogCodec::for_stream();
        let header = BinlogCodec::decode_header(&header(19, 3, 500)).unwrap();
        let err = codec.decode_event(header, &[0x2a, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Payload {
                event_type: EventType::TableMap,
                ..
            }
        ));
    }

    #[test]
    fn test_supports_checksum() {
        assert!(supports_checksum("8.0.36"));
        assert!(supports_checksum("5.6.1-log"));
        assert!(!supports_checksum("5.5.62"));
        assert!(!supports_checksum("5.6.0"));
    }
}
