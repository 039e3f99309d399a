//! Bounds-checked cursor over a row buffer.

use crate::decode::DecodeError;

/// Reads fixed and variable width integers from a byte slice.
///
/// Every read checks the remaining length first and fails with
/// [`DecodeError::Truncated`] instead of panicking.
#[derive(Debug, Clone)]
pub struct RowReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RowReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Borrow everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16_le(&mut self) -> Result<u16, DecodeError> {
        Ok(self.uint_le(2)? as u16)
    }

    pub fn u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(self.uint_le(4)? as u32)
    }

    /// Little-endian unsigned integer of `n` bytes (`n <= 8`).
    pub fn uint_le(&mut self, n: usize) -> Result<u64, DecodeError> {
        debug_assert!(n <= 8);
        let bytes = self.take(n)?;
        Ok(bytes
            .iter()
            .rev()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Big-endian unsigned integer of `n` bytes (`n <= 8`).
    pub fn uint_be(&mut self, n: usize) -> Result<u64, DecodeError> {
        debug_assert!(n <= 8);
        let bytes = self.take(n)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Little-endian signed integer of `n` bytes, sign-extended.
    pub fn int_le(&mut self, n: usize) -> Result<i64, DecodeError> {
        let raw = self.uint_le(n)?;
        Ok(sign_extend(raw, n))
    }

    /// Length-encoded integer as used in event bodies.
    pub fn packed_int(&mut self) -> Result<u64, DecodeError> {
        match self.u8()? {
            first @ 0..=0xfa => Ok(u64::from(first)),
            0xfc => self.uint_le(2),
            0xfd => self.uint_le(3),
            0xfe => self.uint_le(8),
            other => Err(DecodeError::Invalid {
                what: "packed integer",
                detail: format!("unexpected prefix byte 0x{other:02x}"),
            }),
        }
    }

    /// Bytes preceded by a little-endian length of `prefix` bytes.
    pub fn length_prefixed(&mut self, prefix: usize) -> Result<&'a [u8], DecodeError> {
        let len = self.uint_le(prefix)? as usize;
        self.take(len)
    }
}

fn sign_extend(raw: u64, n: usize) -> i64 {
    if n == 0 || n >= 8 {
        return raw as i64;
    }
    let shift = 64 - (n * 8) as u32;
    ((raw << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_reads() {
        let mut reader = RowReader::new(&[0x01, 0x02, 0x03, 0x04, 0xff]);
        assert_eq!(reader.uint_le(2).unwrap(), 0x0201);
        assert_eq!(reader.uint_be(2).unwrap(), 0x0304);
        assert_eq!(reader.u8().unwrap(), 0xff);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_int24_sign_extension() {
        let mut reader = RowReader::new(&[0xff, 0xff, 0xff, 0x00, 0x00, 0x80]);
        assert_eq!(reader.int_le(3).unwrap(), -1);
        assert_eq!(reader.int_le(3).unwrap(), -8_388_608);
    }

    #[test]
    fn test_packed_int() {
        let mut reader = RowReader::new(&[0x05, 0xfc, 0x10, 0x27, 0xfd, 0x01, 0x00, 0x01]);
        assert_eq!(reader.packed_int().unwrap(), 5);
        assert_eq!(reader.packed_int().unwrap(), 10_000);
        assert_eq!(reader.packed_int().unwrap(), 0x010001);
    }

    #[test]
    fn test_truncated_read_is_an_error() {
        let mut reader = RowReader::new(&[0x01]);
        let err = reader.uint_le(4).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                offset: 0,
                needed: 4,
                remaining: 1
            }
        );
        // Failed reads do not advance
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_length_prefixed() {
        let mut reader = RowReader::new(&[0x03, b'a', b'b', b'c', 0x09]);
        assert_eq!(reader.length_prefixed(1).unwrap(), b"abc");
        assert!(reader.length_prefixed(1).is_err());
    }
}
