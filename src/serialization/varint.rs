//! Zig-zag LEB128-64b9B variable length integers.
//!
//! This is the LEB128 little endian base 128 encoding with one twist: a 64 bit value takes at most
//! 9 bytes, not 10. The first 8 bytes carry 7 bits each with the high bit as the continuation
//! flag, and the 9th byte, when present, carries the remaining 8 bits as-is.
//!
//! Signed values are zig-zag mapped first (`0 -> 0`, `-1 -> 1`, `1 -> 2`, ...) so that small
//! magnitudes of either sign stay short.

use std::{error, fmt};

/// Longest encoding of a single value.
pub const MAX_ENCODED_LEN: usize = 9;

/// Errors that can occur while decoding a varint.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum VarintError {
    /// The input ended while the continuation flag of the last byte read was still set.
    Truncated {
        /// Number of bytes consumed before running out of input.
        bytes_read: usize,
    },
}

impl fmt::Display for VarintError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VarintError::Truncated { bytes_read } => write!(
                f,
                "Varint truncated after {} bytes with the continuation bit set",
                bytes_read
            ),
        }
    }
}

impl error::Error for VarintError {}

/// Map signed numbers to unsigned: 0 to 0, -1 to 1, 1 to 2, -2 to 3, etc
#[inline]
pub fn zig_zag_encode(num: i64) -> u64 {
    // If num < 0, num >> 63 is all 1 and vice versa.
    ((num << 1) ^ (num >> 63)) as u64
}

/// Inverse of `zig_zag_encode`.
#[inline]
pub fn zig_zag_decode(encoded: u64) -> i64 {
    ((encoded >> 1) as i64) ^ -((encoded & 1) as i64)
}

/// Write `input` into `buf`, which must have room for `MAX_ENCODED_LEN` bytes.
///
/// Returns the number of bytes written (in [1, 9]).
#[inline]
pub fn varint_write(input: u64, buf: &mut [u8]) -> usize {
    let mut rest = input;
    for (i, byte) in buf.iter_mut().enumerate().take(MAX_ENCODED_LEN - 1) {
        if rest < 0x80 {
            *byte = rest as u8;
            return i + 1;
        }
        *byte = 0x80 | (rest & 0x7F) as u8;
        rest >>= 7;
    }

    // all 8 of the remaining bits go into the last byte
    buf[MAX_ENCODED_LEN - 1] = rest as u8;
    MAX_ENCODED_LEN
}

/// Read one value from the start of `input`.
///
/// Returns the decoded number and how many bytes were consumed. Empty input decodes to `(0, 0)`.
#[inline]
pub fn varint_read_slice(input: &[u8]) -> Result<(u64, usize), VarintError> {
    if input.is_empty() {
        return Ok((0, 0));
    }

    let mut value = 0_u64;
    for i in 0..MAX_ENCODED_LEN {
        let b = match input.get(i) {
            Some(&b) => b,
            None => return Err(VarintError::Truncated { bytes_read: i }),
        };

        if i == MAX_ENCODED_LEN - 1 {
            // special case: use last byte as is
            value |= u64::from(b) << (7 * 8);
            return Ok((value, MAX_ENCODED_LEN));
        }

        value |= u64::from(b & 0x7F) << (7 * i);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Ok((value, MAX_ENCODED_LEN))
}

/// Append the zig-zag varint encoding of `value` to `out`. Returns the number of bytes appended.
pub fn encode(value: i64, out: &mut Vec<u8>) -> usize {
    let mut buf = [0_u8; MAX_ENCODED_LEN];
    let len = varint_write(zig_zag_encode(value), &mut buf);
    out.extend_from_slice(&buf[..len]);
    len
}

/// Decode one zig-zag varint from the start of `input`.
///
/// Returns the value and the number of bytes consumed. Empty input decodes to `(0, 0)`.
pub fn decode(input: &[u8]) -> Result<(i64, usize), VarintError> {
    varint_read_slice(input).map(|(zz, len)| (zig_zag_decode(zz), len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn encoded(value: i64) -> Vec<u8> {
        let mut out = Vec::new();
        let _ = encode(value, &mut out);
        out
    }

    #[test]
    fn zig_zag_small_values() {
        assert_eq!(0, zig_zag_encode(0));
        assert_eq!(1, zig_zag_encode(-1));
        assert_eq!(2, zig_zag_encode(1));
        assert_eq!(3, zig_zag_encode(-2));
        assert_eq!(u64::max_value(), zig_zag_encode(i64::min_value()));
        assert_eq!(u64::max_value() - 1, zig_zag_encode(i64::max_value()));
    }

    #[test]
    fn zig_zag_decode_inverts_encode_at_extremes() {
        for &n in &[0, 1, -1, 63, -64, i64::max_value(), i64::min_value()] {
            assert_eq!(n, zig_zag_decode(zig_zag_encode(n)));
        }
    }

    #[test]
    fn encode_known_values() {
        assert_eq!(vec![112], encoded(56));
        assert_eq!(vec![111], encoded(-56));
        assert_eq!(vec![144, 7], encoded(456));
        assert_eq!(vec![143, 7], encoded(-456));
    }

    #[test]
    fn encode_two_to_the_fiftieth_is_eight_bytes() {
        assert_eq!(
            vec![128, 128, 128, 128, 128, 128, 128, 4],
            encoded(1_i64 << 50)
        );
    }

    #[test]
    fn encode_extremes_use_nine_bytes() {
        assert_eq!(9, encoded(i64::max_value()).len());
        assert_eq!(vec![0xFF; 9], encoded(i64::min_value()));
    }

    #[test]
    fn varint_write_lengths_at_each_boundary() {
        let mut buf = [0_u8; MAX_ENCODED_LEN];
        for len in 1..=8 {
            let largest = (1_u64 << (7 * len)) - 1;
            assert_eq!(len, varint_write(largest, &mut buf));
            assert_eq!(len + 1, varint_write(largest + 1, &mut buf));
        }
        assert_eq!(9, varint_write(u64::max_value(), &mut buf));
    }

    #[test]
    fn decode_known_values() {
        assert_eq!(Ok((56, 1)), decode(&[112]));
        assert_eq!(Ok((-56, 1)), decode(&[111]));
        assert_eq!(Ok((456, 2)), decode(&[144, 7]));
        assert_eq!(Ok((-456, 2)), decode(&[143, 7]));
        assert_eq!(
            Ok((1 << 50, 8)),
            decode(&[128, 128, 128, 128, 128, 128, 128, 4])
        );
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        assert_eq!(Ok((456, 2)), decode(&[144, 7, 99, 1]));
    }

    #[test]
    fn decode_empty_is_zero() {
        assert_eq!(Ok((0, 0)), decode(&[]));
    }

    #[test]
    fn decode_truncated() {
        for n in 1..=8 {
            let input = vec![128_u8; n];
            assert_eq!(
                Err(VarintError::Truncated { bytes_read: n }),
                decode(&input)
            );
        }
    }

    #[test]
    fn ninth_byte_carries_all_bits() {
        let input = [0xFF_u8; 9];
        assert_eq!(Ok((u64::max_value(), 9)), varint_read_slice(&input));
    }

    #[test]
    fn random_values_decode_to_themselves() {
        let mut rng = rand::rngs::SmallRng::from_entropy();
        let mut buf = Vec::new();
        let mut values = Vec::new();
        for _ in 0..10_000 {
            // spread over all encoded lengths
            let bits = rng.gen_range(0..64);
            let v: i64 = rng.gen::<i64>() >> bits;
            values.push(v);
            let _ = encode(v, &mut buf);
        }

        let mut offset = 0;
        for &v in &values {
            let (decoded, len) = decode(&buf[offset..]).unwrap();
            assert_eq!(v, decoded);
            offset += len;
        }
        assert_eq!(buf.len(), offset);
    }
}
