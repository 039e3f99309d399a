//! Little-endian bit helpers for the column and null bitmaps of rows events.

/// Number of bytes needed to hold `bits` bits.
pub fn byte_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Check whether bit `idx` is set. Bits past the end of the bitmap read as unset.
pub fn is_bit_set(bitmap: &[u8], idx: usize) -> bool {
    let byte_idx = idx / 8;
    let bit_idx = idx % 8;
    byte_idx < bitmap.len() && (bitmap[byte_idx] & (1 << bit_idx)) != 0
}

/// Count the set bits in the first `bits` positions.
pub fn count_set_bits(bitmap: &[u8], bits: usize) -> usize {
    (0..bits).filter(|&idx| is_bit_set(bitmap, idx)).count()
}

/// A bitmap with the first `bits` positions set.
pub fn all_set(bits: usize) -> Vec<u8> {
    let mut bitmap = vec![0u8; byte_len(bits)];
    for idx in 0..bits {
        bitmap[idx / 8] |= 1 << (idx % 8);
    }
    bitmap
}
