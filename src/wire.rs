//! Wire-level primitive writers
//!
//! The protocol encodes all fixed-width integers in network byte order
//! (big-endian) and compact lengths as zigzag-mapped, little-endian base-128
//! varints with a continuation bit. These helpers format single values into
//! caller-provided buffers and are usable standalone, without an [`Encoder`].
//!
//! [`Encoder`]: crate::encode::Encoder

/// Maximum encoded length of a varint produced by [`put_varint`].
///
/// A zigzag-mapped `i64` occupies at most ten 7-bit groups.
pub const MAX_VARINT_LEN: usize = 10;

/// Writes `v` into `buf[0]`.
#[inline]
pub fn put_i8(buf: &mut [u8], v: i8) {
    buf[0] = v as u8;
}

/// Writes `v` into `buf[..2]` in big-endian byte order.
#[inline]
pub fn put_i16(buf: &mut [u8], v: i16) {
    buf[..2].copy_from_slice(&v.to_be_bytes());
}

/// Writes `v` into `buf[..4]` in big-endian byte order.
#[inline]
pub fn put_i32(buf: &mut [u8], v: i32) {
    buf[..4].copy_from_slice(&v.to_be_bytes());
}

/// Writes `v` into `buf[..8]` in big-endian byte order.
#[inline]
pub fn put_i64(buf: &mut [u8], v: i64) {
    buf[..8].copy_from_slice(&v.to_be_bytes());
}

/// Writes `v` as a zigzag varint into the front of `buf` and returns the
/// number of bytes written.
///
/// The value is first zigzag-mapped (`(v << 1) ^ (v >> 63)`) so that small
/// negative values stay short, then emitted low group first with the high bit
/// of each byte marking "more bytes follow". `buf` must hold at least
/// [`MAX_VARINT_LEN`] bytes.
#[inline]
pub fn put_varint(buf: &mut [u8], v: i64) -> usize {
    let mut u = ((v << 1) ^ (v >> 63)) as u64;
    let mut n = 0;

    while u >= 0x80 && n < buf.len() {
        buf[n] = (u as u8) | 0x80;
        u >>= 7;
        n += 1;
    }

    if n < buf.len() {
        buf[n] = u as u8;
        n += 1;
    }

    n
}
