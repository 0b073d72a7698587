//! Boolean bitmap packing.
//!
//! Boolean `j` (0-based, in field order) lives in byte `j / 8`, bit `j % 8`
//! (least significant bit first). `n` booleans occupy `ceil(n / 8)` bytes and
//! the unused high bits of the last byte are zero.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ChanwireError, Result};

/// Bytes needed for `n` packed booleans.
pub const fn bitmap_len(n: usize) -> usize {
    (n + 7) / 8
}

/// Append `bits` as a packed bitmap.
pub fn pack_bools(bits: &[bool], out: &mut BytesMut) {
    let n = bits.len();
    for i in 0..bitmap_len(n) {
        let mut by: u8 = 0;
        for j in (i * 8)..n.min(i * 8 + 8) {
            if bits[j] {
                by |= 1 << (j - i * 8);
            }
        }
        out.put_u8(by);
    }
}

/// Read a packed bitmap holding `n` booleans.
pub fn unpack_bools(n: usize, buf: &mut Bytes) -> Result<Vec<bool>> {
    let len = bitmap_len(n);
    if buf.remaining() < len {
        return Err(ChanwireError::truncated("boolean bitmap", len, buf.remaining()));
    }
    let mut bits = Vec::with_capacity(n);
    for i in 0..len {
        let by = buf.get_u8();
        for j in (i * 8)..n.min(i * 8 + 8) {
            bits.push(by & (1 << (j - i * 8)) != 0);
        }
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn packed(bits: &[bool]) -> Vec<u8> {
        let mut out = BytesMut::new();
        pack_bools(bits, &mut out);
        out.to_vec()
    }

    #[test]
    fn ten_flags_span_two_bytes() {
        let bits = [true, false, false, true, true, false, true, true, false, true];
        assert_eq!(packed(&bits), vec![0b1101_1001, 0b0000_0010]);
    }

    #[test]
    fn empty_run_writes_nothing() {
        assert!(packed(&[]).is_empty());
        let mut b = Bytes::new();
        assert!(unpack_bools(0, &mut b).unwrap().is_empty());
    }

    #[test]
    fn byte_boundaries() {
        assert_eq!(bitmap_len(1), 1);
        assert_eq!(bitmap_len(8), 1);
        assert_eq!(bitmap_len(9), 2);
        assert_eq!(bitmap_len(17), 3);

        let mut bits = vec![false; 17];
        bits[7] = true;
        bits[8] = true;
        bits[16] = true;
        let raw = packed(&bits);
        assert_eq!(raw, vec![0x80, 0x01, 0x01]);

        let mut b = Bytes::from(raw);
        assert_eq!(unpack_bools(17, &mut b).unwrap(), bits);
        assert!(!b.has_remaining());
    }

    #[test]
    fn truncated_bitmap_is_malformed() {
        let mut b = Bytes::from_static(&[0xFF]);
        assert!(matches!(
            unpack_bools(9, &mut b),
            Err(ChanwireError::Malformed(_))
        ));
    }
}
