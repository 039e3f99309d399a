//! NEWDECIMAL packed binary decoding.
//!
//! MySQL stores a DECIMAL(p, s) as groups of nine decimal digits packed into
//! four bytes, with the leftover leading/trailing digits packed into the
//! fewest bytes that hold them. The sign lives in the top bit of the first
//! byte; negative values additionally have every byte inverted.

use crate::decode::DecodeError;
use crate::reader::RowReader;

const DIGITS_PER_GROUP: usize = 9;
const GROUP_SIZE: usize = 4;
const COMPRESSED_BYTES: [usize; 10] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];

/// Number of bytes a DECIMAL(precision, scale) occupies in a row image.
pub fn packed_len(precision: u8, scale: u8) -> usize {
    let (precision, scale) = (precision as usize, scale as usize);
    let integral = precision.saturating_sub(scale);
    (integral / DIGITS_PER_GROUP) * GROUP_SIZE
        + COMPRESSED_BYTES[integral % DIGITS_PER_GROUP]
        + (scale / DIGITS_PER_GROUP) * GROUP_SIZE
        + COMPRESSED_BYTES[scale % DIGITS_PER_GROUP]
}

/// Split NEWDECIMAL column metadata into `(precision, scale)`.
pub fn precision_and_scale(meta: u16) -> (u8, u8) {
    ((meta >> 8) as u8, (meta & 0xff) as u8)
}

/// Decode one packed decimal into its exact textual form, e.g. `-1234.56`.
pub fn decode_decimal(
    reader: &mut RowReader<'_>,
    precision: u8,
    scale: u8,
) -> Result<String, DecodeError> {
    if scale > precision || precision == 0 {
        return Err(DecodeError::Invalid {
            what: "decimal metadata",
            detail: format!("precision {precision}, scale {scale}"),
        });
    }

    let len = packed_len(precision, scale);
    let mut buf = reader.take(len)?.to_vec();
    let negative = buf[0] & 0x80 == 0;
    buf[0] ^= 0x80;
    if negative {
        for b in buf.iter_mut() {
            *b = !*b;
        }
    }

    let integral = (precision - scale) as usize;
    let scale = scale as usize;
    let mut digits = RowReader::new(&buf);

    let mut int_part = String::new();
    let leading = COMPRESSED_BYTES[integral % DIGITS_PER_GROUP];
    if leading > 0 {
        int_part.push_str(&digits.uint_be(leading)?.to_string());
    }
    for _ in 0..integral / DIGITS_PER_GROUP {
        int_part.push_str(&format!("{:09}", digits.uint_be(GROUP_SIZE)?));
    }
    let int_part = int_part.trim_start_matches('0');

    let mut frac_part = String::new();
    for _ in 0..scale / DIGITS_PER_GROUP {
        frac_part.push_str(&format!("{:09}", digits.uint_be(GROUP_SIZE)?));
    }
    let trailing_digits = scale % DIGITS_PER_GROUP;
    if trailing_digits > 0 {
        let value = digits.uint_be(COMPRESSED_BYTES[trailing_digits])?;
        frac_part.push_str(&format!("{value:0width$}", width = trailing_digits));
    }

    let mut out = String::with_capacity(precision as usize + 2);
    let is_zero = int_part.is_empty() && frac_part.bytes().all(|b| b == b'0');
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(if int_part.is_empty() { "0" } else { int_part });
    if scale > 0 {
        out.push('.');
        out.push_str(&frac_part);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8], precision: u8, scale: u8) -> String {
        let mut reader = RowReader::new(bytes);
        let value = decode_decimal(&mut reader, precision, scale).unwrap();
        assert!(reader.is_empty(), "decimal left unread bytes");
        value
    }

    #[test]
    fn test_packed_len() {
        assert_eq!(packed_len(10, 2), 5);
        assert_eq!(packed_len(20, 4), 10);
        assert_eq!(packed_len(65, 30), 30);
    }

    #[test]
    fn test_positive_and_negative() {
        assert_eq!(decode(&[0x80, 0x00, 0x04, 0xd2, 0x38], 10, 2), "1234.56");
        assert_eq!(decode(&[0x7f, 0xff, 0xfb, 0x2d, 0xc7], 10, 2), "-1234.56");
    }

    #[test]
    fn test_full_groups() {
        let bytes = [0x80, 0x00, 0x00, 0x0c, 0x14, 0x9a, 0xa4, 0x35, 0x09, 0x29];
        assert_eq!(decode(&bytes, 20, 4), "12345678901.2345");
        let bytes = [0x81, 0x07, 0x5b, 0xcd, 0x15, 0x00, 0x0c];
        assert_eq!(decode(&bytes, 14, 12), "1.123456789012");
    }

    #[test]
    fn test_zero_integral_part() {
        assert_eq!(decode(&[0x80, 0x00, 0x05], 5, 1), "0.5");
    }

    #[test]
    fn test_truncated_decimal() {
        let mut reader = RowReader::new(&[0x80, 0x00]);
        assert!(matches!(
            decode_decimal(&mut reader, 10, 2),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_meta_split() {
        assert_eq!(precision_and_scale(0x0a02), (10, 2));
    }
}
