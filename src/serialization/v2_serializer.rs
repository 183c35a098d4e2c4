use super::varint::{varint_write, zig_zag_encode, MAX_ENCODED_LEN};
use super::{EncodeError, Serializer, V2_COOKIE, V2_HEADER_SIZE};
use crate::{Counter, Histogram};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::Write;

/// Serializer for the V2 binary format.
pub struct V2Serializer {
    buf: Vec<u8>,
}

impl Default for V2Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl V2Serializer {
    /// Create a new serializer.
    pub fn new() -> V2Serializer {
        V2Serializer { buf: Vec::new() }
    }
}

impl Serializer for V2Serializer {
    type SerializeError = EncodeError;

    fn serialize<T: Counter, W: Write>(
        &mut self,
        h: &Histogram<T>,
        writer: &mut W,
    ) -> Result<usize, EncodeError> {
        self.buf.clear();
        let counts_to_encode = encoded_counts_len(h);
        let max_size = V2_HEADER_SIZE + counts_to_encode * MAX_ENCODED_LEN;
        self.buf.reserve(max_size);

        self.buf.write_u32::<BigEndian>(V2_COOKIE)?;
        // placeholder for length
        self.buf.write_u32::<BigEndian>(0)?;
        // normalizing index offset
        self.buf.write_u32::<BigEndian>(0)?;
        self.buf
            .write_u32::<BigEndian>(u32::from(h.significant_figures()))?;
        self.buf
            .write_u64::<BigEndian>(h.lowest_trackable_value() as u64)?;
        self.buf
            .write_u64::<BigEndian>(h.highest_trackable_value() as u64)?;
        // int to double conversion
        self.buf.write_f64::<BigEndian>(1.0)?;

        debug_assert_eq!(V2_HEADER_SIZE, self.buf.len());

        self.buf.resize(max_size, 0);
        let counts_len = encode_counts(
            &h.counts()[..counts_to_encode],
            &mut self.buf[V2_HEADER_SIZE..],
        )?;
        let total_len = V2_HEADER_SIZE + counts_len;

        // counts is always under 2^32 bytes
        BigEndian::write_u32(&mut self.buf[4..8], counts_len as u32);

        writer.write_all(&self.buf[0..total_len])?;
        Ok(total_len)
    }
}

/// Number of slots up to and including the last non-zero one.
fn encoded_counts_len<T: Counter>(h: &Histogram<T>) -> usize {
    h.counts()
        .iter()
        .rposition(|c| *c != T::zero())
        .map_or(0, |i| i + 1)
}

/// Encode counts into `buf`, which must have room for `MAX_ENCODED_LEN` bytes per count.
///
/// Non-negative numbers are counts for the respective slot; a negative number skips that many
/// (absolute value) empty slots. A single empty slot is written as a plain 0.
pub(crate) fn encode_counts<T: Counter>(counts: &[T], buf: &mut [u8]) -> Result<usize, EncodeError> {
    let mut index = 0;
    let mut bytes_written = 0;

    while index < counts.len() {
        let count = counts[index];
        index += 1;

        let mut zero_count = 0_i64;
        if count == T::zero() {
            zero_count = 1;
            while index < counts.len() && counts[index] == T::zero() {
                zero_count += 1;
                index += 1;
            }
        }

        let count_or_zeros: i64 = if zero_count > 1 {
            -zero_count
        } else {
            count.to_i64().ok_or(EncodeError::CountNotSerializable)?
        };

        bytes_written += varint_write(
            zig_zag_encode(count_or_zeros),
            &mut buf[bytes_written..],
        );
    }

    Ok(bytes_written)
}
