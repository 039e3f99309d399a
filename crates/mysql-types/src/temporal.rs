//! DATE, TIME, DATETIME and TIMESTAMP decoding.
//!
//! The `2` variants (TIME2, DATETIME2, TIMESTAMP2) are big-endian packed
//! integers followed by 0-3 bytes of fractional seconds, sized by the
//! column's fsp metadata. The legacy variants are little-endian.

use crate::decode::DecodeError;
use crate::reader::RowReader;
use crate::zone::DisplayZone;
use chrono::DateTime;

const DATETIMEF_INT_OFS: i64 = 0x80_0000_0000;
const TIMEF_INT_OFS: i64 = 0x80_0000;
const TIMEF_OFS: i64 = 0x8000_0000_0000;

pub const ZERO_DATE: &str = "0000-00-00";
pub const ZERO_DATETIME: &str = "0000-00-00 00:00:00";

/// Render microseconds with `fsp` digits, including the leading dot.
pub fn format_fraction(micros: u32, fsp: u8) -> String {
    if fsp == 0 {
        return String::new();
    }
    let fsp = fsp.min(6) as usize;
    let digits = format!("{micros:06}");
    format!(".{}", &digits[..fsp])
}

/// Read the fractional seconds that follow a packed TIME2/DATETIME2/TIMESTAMP2.
pub fn read_fraction(reader: &mut RowReader<'_>, fsp: u8) -> Result<u32, DecodeError> {
    let micros = match fsp {
        0 => 0,
        1 | 2 => reader.uint_be(1)? * 10_000,
        3 | 4 => reader.uint_be(2)? * 100,
        5 | 6 => reader.uint_be(3)?,
        other => {
            return Err(DecodeError::Invalid {
                what: "fractional seconds precision",
                detail: other.to_string(),
            })
        }
    };
    Ok(micros as u32)
}

/// DATE: 3 bytes little-endian, `year << 9 | month << 5 | day`.
pub fn decode_date(reader: &mut RowReader<'_>) -> Result<String, DecodeError> {
    let packed = reader.uint_le(3)?;
    if packed == 0 {
        return Ok(ZERO_DATE.to_string());
    }
    let day = packed & 0x1f;
    let month = (packed >> 5) & 0x0f;
    let year = packed >> 9;
    Ok(format!("{year:04}-{month:02}-{day:02}"))
}

/// Legacy TIME: signed 3 byte integer holding `HHMMSS` in decimal.
pub fn decode_time(reader: &mut RowReader<'_>) -> Result<String, DecodeError> {
    let raw = reader.int_le(3)?;
    let sign = if raw < 0 { "-" } else { "" };
    let v = raw.unsigned_abs();
    Ok(format!(
        "{sign}{:02}:{:02}:{:02}",
        v / 10_000,
        (v % 10_000) / 100,
        v % 100
    ))
}

/// TIME2 with `fsp` fractional digits.
pub fn decode_time2(reader: &mut RowReader<'_>, fsp: u8) -> Result<String, DecodeError> {
    let packed: i64 = match fsp {
        0 => (reader.uint_be(3)? as i64 - TIMEF_INT_OFS) << 24,
        1 | 2 => {
            let mut int_part = reader.uint_be(3)? as i64 - TIMEF_INT_OFS;
            let mut frac = reader.uint_be(1)? as i64;
            if int_part < 0 && frac > 0 {
                int_part += 1;
                frac -= 0x100;
            }
            (int_part << 24) + frac * 10_000
        }
        3 | 4 => {
            let mut int_part = reader.uint_be(3)? as i64 - TIMEF_INT_OFS;
            let mut frac = reader.uint_be(2)? as i64;
            if int_part < 0 && frac > 0 {
                int_part += 1;
                frac -= 0x10000;
            }
            (int_part << 24) + frac * 100
        }
        5 | 6 => reader.uint_be(6)? as i64 - TIMEF_OFS,
        other => {
            return Err(DecodeError::Invalid {
                what: "fractional seconds precision",
                detail: other.to_string(),
            })
        }
    };

    let sign = if packed < 0 { "-" } else { "" };
    let packed = packed.unsigned_abs();
    let hms = packed >> 24;
    let micros = (packed % (1 << 24)) as u32;
    let hour = (hms >> 12) % (1 << 10);
    let minute = (hms >> 6) % (1 << 6);
    let second = hms % (1 << 6);
    Ok(format!(
        "{sign}{hour:02}:{minute:02}:{second:02}{}",
        format_fraction(micros, fsp)
    ))
}

/// Legacy DATETIME: 8 bytes little-endian holding `YYYYMMDDhhmmss` in decimal.
pub fn decode_datetime(reader: &mut RowReader<'_>) -> Result<String, DecodeError> {
    let v = reader.uint_le(8)?;
    if v == 0 {
        return Ok(ZERO_DATETIME.to_string());
    }
    let date = v / 1_000_000;
    let time = v % 1_000_000;
    Ok(format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        date / 10_000,
        (date % 10_000) / 100,
        date % 100,
        time / 10_000,
        (time % 10_000) / 100,
        time % 100
    ))
}

/// DATETIME2 with `fsp` fractional digits.
pub fn decode_datetime2(reader: &mut RowReader<'_>, fsp: u8) -> Result<String, DecodeError> {
    let int_part = reader.uint_be(5)? as i64 - DATETIMEF_INT_OFS;
    let micros = read_fraction(reader, fsp)?;
    if int_part == 0 {
        return Ok(format!("{ZERO_DATETIME}{}", format_fraction(0, fsp)));
    }

    let ymdhms = int_part.unsigned_abs();
    let ymd = ymdhms >> 17;
    let ym = ymd >> 5;
    let hms = ymdhms % (1 << 17);

    let day = ymd % (1 << 5);
    let month = ym % 13;
    let year = ym / 13;
    let second = hms % (1 << 6);
    let minute = (hms >> 6) % (1 << 6);
    let hour = hms >> 12;
    Ok(format!(
        "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}{}",
        format_fraction(micros, fsp)
    ))
}

/// Legacy TIMESTAMP: 4 bytes little-endian seconds since the epoch.
pub fn decode_timestamp(
    reader: &mut RowReader<'_>,
    zone: &DisplayZone,
) -> Result<String, DecodeError> {
    let secs = reader.uint_le(4)?;
    format_timestamp(secs as i64, 0, 0, zone)
}

/// TIMESTAMP2: 4 bytes big-endian seconds since the epoch plus fraction.
pub fn decode_timestamp2(
    reader: &mut RowReader<'_>,
    fsp: u8,
    zone: &DisplayZone,
) -> Result<String, DecodeError> {
    let secs = reader.uint_be(4)?;
    let micros = read_fraction(reader, fsp)?;
    format_timestamp(secs as i64, micros, fsp, zone)
}

/// Render epoch seconds as wall-clock time in `zone`.
pub fn format_timestamp(
    secs: i64,
    micros: u32,
    fsp: u8,
    zone: &DisplayZone,
) -> Result<String, DecodeError> {
    if secs == 0 && micros == 0 {
        return Ok(format!("{ZERO_DATETIME}{}", format_fraction(0, fsp)));
    }
    let utc = DateTime::from_timestamp(secs, 0).ok_or_else(|| DecodeError::Invalid {
        what: "timestamp",
        detail: secs.to_string(),
    })?;
    Ok(format!(
        "{}{}",
        zone.format(&utc, "%Y-%m-%d %H:%M:%S"),
        format_fraction(micros, fsp)
    ))
}
