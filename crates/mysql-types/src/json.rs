//! MySQL binary JSON decoding.
//!
//! A JSON column value is a type byte followed by the encoded document.
//! Objects and arrays come in a small (16-bit offsets) and a large (32-bit
//! offsets) flavour; offsets are relative to the start of the container
//! body. Scalars small enough to fit an offset slot are stored inline.

use crate::decimal::decode_decimal;
use crate::decode::DecodeError;
use crate::reader::RowReader;
use base64::Engine;
use serde_json::{Map, Number, Value as JsonValue};

const SMALL_OBJECT: u8 = 0x00;
const LARGE_OBJECT: u8 = 0x01;
const SMALL_ARRAY: u8 = 0x02;
const LARGE_ARRAY: u8 = 0x03;
const LITERAL: u8 = 0x04;
const INT16: u8 = 0x05;
const UINT16: u8 = 0x06;
const INT32: u8 = 0x07;
const UINT32: u8 = 0x08;
const INT64: u8 = 0x09;
const UINT64: u8 = 0x0a;
const DOUBLE: u8 = 0x0b;
const STRING: u8 = 0x0c;
const OPAQUE: u8 = 0x0f;

const LITERAL_NULL: u8 = 0x00;
const LITERAL_TRUE: u8 = 0x01;
const LITERAL_FALSE: u8 = 0x02;

// Column type codes that may appear inside OPAQUE values
const OPAQUE_TIMESTAMP: u8 = 7;
const OPAQUE_DATE: u8 = 10;
const OPAQUE_TIME: u8 = 11;
const OPAQUE_DATETIME: u8 = 12;
const OPAQUE_NEWDECIMAL: u8 = 246;

/// Decode a binary JSON column value into compact JSON text.
pub fn decode_json(data: &[u8]) -> Result<String, DecodeError> {
    Ok(decode_json_value(data)?.to_string())
}

/// Decode a binary JSON column value into a [`serde_json::Value`].
pub fn decode_json_value(data: &[u8]) -> Result<JsonValue, DecodeError> {
    match data.split_first() {
        None => Ok(JsonValue::Null),
        Some((type_byte, body)) => parse_typed(*type_byte, body),
    }
}

fn parse_typed(type_byte: u8, data: &[u8]) -> Result<JsonValue, DecodeError> {
    match type_byte {
        SMALL_OBJECT => parse_object(data, false),
        LARGE_OBJECT => parse_object(data, true),
        SMALL_ARRAY => parse_array(data, false),
        LARGE_ARRAY => parse_array(data, true),
        LITERAL => Ok(literal(read_le(data, 0, 1)? as u8)),
        INT16 => Ok(JsonValue::from(read_le(data, 0, 2)? as u16 as i16)),
        UINT16 => Ok(JsonValue::from(read_le(data, 0, 2)? as u16)),
        INT32 => Ok(JsonValue::from(read_le(data, 0, 4)? as u32 as i32)),
        UINT32 => Ok(JsonValue::from(read_le(data, 0, 4)? as u32)),
        INT64 => Ok(JsonValue::from(read_le(data, 0, 8)? as i64)),
        UINT64 => Ok(JsonValue::from(read_le(data, 0, 8)?)),
        DOUBLE => {
            let bits = read_le(data, 0, 8)?;
            Ok(number_from_f64(f64::from_bits(bits)))
        }
        STRING => {
            let (len, prefix) = read_variable_length(data)?;
            let bytes = slice(data, prefix, len)?;
            Ok(JsonValue::String(String::from_utf8_lossy(bytes).into_owned()))
        }
        OPAQUE => parse_opaque(data),
        other => Err(DecodeError::Json(format!(
            "unknown value type 0x{other:02x}"
        ))),
    }
}

fn parse_object(data: &[u8], large: bool) -> Result<JsonValue, DecodeError> {
    let offset_size = if large { 4 } else { 2 };
    let count = read_le(data, 0, offset_size)? as usize;
    let key_entry_size = offset_size + 2;
    let value_entry_size = offset_size + 1;
    let key_entries = offset_size * 2;
    let value_entries = key_entries + count * key_entry_size;

    let mut map = Map::with_capacity(count);
    for i in 0..count {
        let entry = key_entries + i * key_entry_size;
        let key_offset = read_le(data, entry, offset_size)? as usize;
        let key_len = read_le(data, entry + offset_size, 2)? as usize;
        let key = String::from_utf8_lossy(slice(data, key_offset, key_len)?).into_owned();

        let value = resolve_entry(data, value_entries + i * value_entry_size, large)?;
        map.insert(key, value);
    }
    Ok(JsonValue::Object(map))
}

fn parse_array(data: &[u8], large: bool) -> Result<JsonValue, DecodeError> {
    let offset_size = if large { 4 } else { 2 };
    let count = read_le(data, 0, offset_size)? as usize;
    let value_entry_size = offset_size + 1;
    let value_entries = offset_size * 2;

    (0..count)
        .map(|i| resolve_entry(data, value_entries + i * value_entry_size, large))
        .collect::<Result<Vec<_>, _>>()
        .map(JsonValue::Array)
}

/// Read the value entry at `entry`: a type byte, then either an inline
/// scalar or an offset into the container body.
fn resolve_entry(data: &[u8], entry: usize, large: bool) -> Result<JsonValue, DecodeError> {
    let offset_size = if large { 4 } else { 2 };
    let type_byte = read_le(data, entry, 1)? as u8;
    let slot = entry + 1;

    match type_byte {
        LITERAL => return Ok(literal(read_le(data, slot, 1)? as u8)),
        INT16 => return Ok(JsonValue::from(read_le(data, slot, 2)? as u16 as i16)),
        UINT16 => return Ok(JsonValue::from(read_le(data, slot, 2)? as u16)),
        INT32 if large => return Ok(JsonValue::from(read_le(data, slot, 4)? as u32 as i32)),
        UINT32 if large => return Ok(JsonValue::from(read_le(data, slot, 4)? as u32)),
        _ => {}
    }

    let value_offset = read_le(data, slot, offset_size)? as usize;
    let body = data.get(value_offset..).ok_or_else(|| {
        DecodeError::Json(format!("value offset {value_offset} out of bounds"))
    })?;
    parse_typed(type_byte, body)
}

fn parse_opaque(data: &[u8]) -> Result<JsonValue, DecodeError> {
    let field_type = read_le(data, 0, 1)? as u8;
    let (len, prefix) = read_variable_length(&data[1..])?;
    let payload = slice(data, 1 + prefix, len)?;

    match field_type {
        OPAQUE_NEWDECIMAL if payload.len() >= 2 => {
            let mut reader = RowReader::new(&payload[2..]);
            let text = decode_decimal(&mut reader, payload[0], payload[1])?;
            // Number keeps the digits verbatim with arbitrary_precision
            Ok(serde_json::from_str::<Number>(&text)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::String(text)))
        }
        OPAQUE_DATE | OPAQUE_DATETIME | OPAQUE_TIMESTAMP | OPAQUE_TIME if payload.len() >= 8 => {
            let packed = read_le(payload, 0, 8)? as i64;
            Ok(JsonValue::String(packed_temporal(field_type, packed)))
        }
        _ => Ok(JsonValue::String(format!(
            "base64:type{field_type}:{}",
            base64::engine::general_purpose::STANDARD.encode(payload)
        ))),
    }
}

/// Temporal values inside JSON use the in-memory packed longlong layout.
fn packed_temporal(field_type: u8, packed: i64) -> String {
    let sign = if packed < 0 { "-" } else { "" };
    let packed = packed.unsigned_abs();
    let int_part = packed >> 24;
    let micros = packed % (1 << 24);

    if field_type == OPAQUE_TIME {
        let hour = (int_part >> 12) % (1 << 10);
        let minute = (int_part >> 6) % (1 << 6);
        let second = int_part % (1 << 6);
        return format!("{sign}{hour:02}:{minute:02}:{second:02}.{micros:06}");
    }

    let ymd = int_part >> 17;
    let ym = ymd >> 5;
    let hms = int_part % (1 << 17);
    let date = format!("{:04}-{:02}-{:02}", ym / 13, ym % 13, ymd % (1 << 5));
    if field_type == OPAQUE_DATE {
        return date;
    }
    format!(
        "{date} {:02}:{:02}:{:02}.{micros:06}",
        hms >> 12,
        (hms >> 6) % (1 << 6),
        hms % (1 << 6)
    )
}

fn literal(code: u8) -> JsonValue {
    match code {
        LITERAL_TRUE => JsonValue::Bool(true),
        LITERAL_FALSE => JsonValue::Bool(false),
        LITERAL_NULL => JsonValue::Null,
        _ => JsonValue::Null,
    }
}

fn number_from_f64(v: f64) -> JsonValue {
    Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Lengths of strings and opaque blobs: 7 bits per byte, high bit set on
/// every byte but the last, at most 5 bytes.
fn read_variable_length(data: &[u8]) -> Result<(usize, usize), DecodeError> {
    let mut length = 0usize;
    for i in 0..5 {
        let b = *data
            .get(i)
            .ok_or_else(|| DecodeError::Json("truncated variable-length integer".into()))?;
        length |= ((b & 0x7f) as usize) << (7 * i);
        if b & 0x80 == 0 {
            return Ok((length, i + 1));
        }
    }
    Err(DecodeError::Json("variable-length integer too long".into()))
}

fn slice(data: &[u8], start: usize, len: usize) -> Result<&[u8], DecodeError> {
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| {
            DecodeError::Json(format!(
                "{len} bytes at offset {start} exceed document of {} bytes",
                data.len()
            ))
        })
}

fn read_le(data: &[u8], offset: usize, n: usize) -> Result<u64, DecodeError> {
    let bytes = slice(data, offset, n)?;
    Ok(bytes
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_null() {
        assert_eq!(decode_json(&[]).unwrap(), "null");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(decode_json(&[LITERAL, LITERAL_TRUE]).unwrap(), "true");
        assert_eq!(decode_json(&[INT16, 0xff, 0xff]).unwrap(), "-1");
        assert_eq!(decode_json(&[STRING, 0x02, b'h', b'i']).unwrap(), "\"hi\"");

        let mut double = vec![DOUBLE];
        double.extend_from_slice(&1.5f64.to_le_bytes());
        assert_eq!(decode_json(&double).unwrap(), "1.5");
    }

    #[test]
    fn test_small_object() {
        // {"a": 1, "b": "x"}
        let doc: Vec<u8> = vec![
            SMALL_OBJECT,
            0x02, 0x00, // element count
            0x1a, 0x00, // total size
            0x12, 0x00, 0x01, 0x00, // key "a" at 18, len 1
            0x13, 0x00, 0x01, 0x00, // key "b" at 19, len 1
            INT16, 0x01, 0x00, // inline 1
            STRING, 0x14, 0x00, // string at 20
            b'a', b'b',
            0x01, b'x',
        ];
        assert_eq!(decode_json(&doc).unwrap(), r#"{"a":1,"b":"x"}"#);
    }

    #[test]
    fn test_small_array_with_literals() {
        // [null, false, 7]
        let doc: Vec<u8> = vec![
            SMALL_ARRAY,
            0x03, 0x00,
            0x0d, 0x00,
            LITERAL, 0x00, 0x00,
            LITERAL, 0x02, 0x00,
            UINT16, 0x07, 0x00,
        ];
        assert_eq!(decode_json(&doc).unwrap(), "[null,false,7]");
    }

    #[test]
    fn test_nested_array_in_object() {
        // {"k": [1]}
        let doc: Vec<u8> = vec![
            SMALL_OBJECT,
            0x01, 0x00,
            0x14, 0x00,
            0x0b, 0x00, 0x01, 0x00, // key at 11
            SMALL_ARRAY, 0x0c, 0x00, // array at 12
            b'k',
            0x01, 0x00, 0x07, 0x00, INT16, 0x01, 0x00,
        ];
        assert_eq!(decode_json(&doc).unwrap(), r#"{"k":[1]}"#);
    }

    #[test]
    fn test_opaque_fallback_is_base64() {
        let doc = vec![OPAQUE, 252, 0x02, 0xde, 0xad];
        assert_eq!(decode_json(&doc).unwrap(), "\"base64:type252:3q0=\"");
    }

    #[test]
    fn test_opaque_decimal_keeps_every_digit() {
        // DECIMAL(20,2) 123456789012345678.91, past what an f64 can hold
        let doc = vec![
            OPAQUE, OPAQUE_NEWDECIMAL, 11, 20, 2,
            0x87, 0x5b, 0xcd, 0x15, 0x00, 0xbc, 0x61, 0x4e, 0x5b,
        ];
        assert_eq!(decode_json(&doc).unwrap(), "123456789012345678.91");
    }

    #[test]
    fn test_opaque_decimal_inside_object() {
        // {"p": -1234.56}
        let doc: Vec<u8> = vec![
            SMALL_OBJECT,
            0x01, 0x00,
            0x15, 0x00,
            0x0b, 0x00, 0x01, 0x00, // key at 11
            OPAQUE, 0x0c, 0x00, // opaque at 12
            b'p',
            OPAQUE_NEWDECIMAL, 0x07, 10, 2, 0x7f, 0xff, 0xfb, 0x2d, 0xc7,
        ];
        assert_eq!(decode_json(&doc).unwrap(), r#"{"p":-1234.56}"#);
    }

    #[test]
    fn test_out_of_bounds_offset_is_an_error() {
        let doc: Vec<u8> = vec![SMALL_ARRAY, 0x01, 0x00, 0x07, 0x00, STRING, 0x40, 0x00];
        assert!(matches!(decode_json(&doc), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(decode_json(&[0x42]).is_err());
    }
}
