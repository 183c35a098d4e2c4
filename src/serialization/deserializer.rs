use super::varint::{varint_read_slice, zig_zag_decode, VarintError};
use super::{Cookie, V2_COMPRESSED_COOKIE_BASE, V2_COOKIE_BASE};
use crate::{Counter, Histogram, RestatState};
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use num_traits::ToPrimitive;
use std::io::{self, Read};
use std::{error, fmt};
use tracing::trace;

/// Errors that can happen during deserialization.
#[derive(Debug)]
pub enum DeserializeError {
    /// An i/o operation failed. Input that ends early shows up as an `UnexpectedEof` here.
    IoError(io::Error),
    /// The cookie (first 4 bytes) did not match that for any known format.
    InvalidCookie(u32),
    /// The cookie identifies a format that is known but not supported.
    UnsupportedCookie(Cookie),
    /// The histogram uses features that this implementation doesn't support (yet), so it cannot
    /// be deserialized correctly.
    UnsupportedFeature,
    /// A count exceeded what can be represented in the chosen counter type.
    UnsuitableCounterType,
    /// The histogram instance could not be created because the serialized parameters were invalid
    /// (e.g. lowest value, highest value, etc.)
    InvalidParameters,
    /// The encoded array is longer than it should be for the histogram's value range.
    EncodedArrayTooLong,
    /// A count in the payload is not a valid varint.
    Varint(VarintError),
    /// The text form is not valid base64.
    Base64(base64::DecodeError),
}

impl From<io::Error> for DeserializeError {
    fn from(e: io::Error) -> Self {
        DeserializeError::IoError(e)
    }
}

impl From<VarintError> for DeserializeError {
    fn from(e: VarintError) -> Self {
        DeserializeError::Varint(e)
    }
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeserializeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
            DeserializeError::InvalidCookie(c) => write!(
                f,
                "The cookie {:#010x} does not match that for any known format",
                c
            ),
            DeserializeError::UnsupportedCookie(c) => {
                write!(f, "The {} format is not supported", c)
            }
            DeserializeError::UnsupportedFeature => write!(
                f,
                "The histogram uses features that this implementation doesn't support"
            ),
            DeserializeError::UnsuitableCounterType => write!(
                f,
                "A count exceeded what can be represented in the chosen counter type"
            ),
            DeserializeError::InvalidParameters => write!(
                f,
                "The serialized parameters were invalid(e.g. lowest value, highest value, etc)"
            ),
            DeserializeError::EncodedArrayTooLong => write!(
                f,
                "The encoded array is longer than it should be for the histogram's value range"
            ),
            DeserializeError::Varint(e) => write!(f, "Corrupt counts payload: {}", e),
            DeserializeError::Base64(e) => write!(f, "Invalid base64: {}", e),
        }
    }
}

impl error::Error for DeserializeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DeserializeError::IoError(e) => Some(e),
            DeserializeError::Varint(e) => Some(e),
            DeserializeError::Base64(e) => Some(e),
            _ => None,
        }
    }
}

/// Deserializer for all supported formats.
///
/// Since the serialization formats all include some magic bytes that allow reliable identification
/// of the different formats, only one Deserializer implementation is needed.
pub struct Deserializer {
    payload_buf: Vec<u8>,
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer {
    /// Create a new deserializer.
    pub fn new() -> Deserializer {
        Deserializer {
            payload_buf: Vec::new(),
        }
    }

    /// Deserialize an encoded histogram from the provided reader.
    ///
    /// Note that `&[u8]` and `Cursor` are convenient implementations of `Read` if you have some
    /// bytes already in slice or `Vec` form.
    pub fn deserialize<T: Counter, R: Read>(
        &mut self,
        reader: &mut R,
    ) -> Result<Histogram<T>, DeserializeError> {
        let cookie = reader.read_u32::<BigEndian>()?;

        match Cookie::from_u32(cookie) {
            Some(Cookie::V2) => self.deser_v2(reader),
            Some(Cookie::V2Compressed) => self.deser_v2_compressed(reader),
            Some(c @ Cookie::LegacyV1) => Err(DeserializeError::UnsupportedCookie(c)),
            None => Err(DeserializeError::InvalidCookie(cookie)),
        }
    }

    fn deser_v2_compressed<T: Counter, R: Read>(
        &mut self,
        reader: &mut R,
    ) -> Result<Histogram<T>, DeserializeError> {
        let payload_len = reader.read_u32::<BigEndian>()?;

        let mut deflate_reader = ZlibDecoder::new(reader.take(u64::from(payload_len)));
        let inner_cookie = deflate_reader.read_u32::<BigEndian>()?;
        if inner_cookie & !super::COOKIE_FLAGS_MASK != V2_COOKIE_BASE {
            // a compressed frame must wrap a plain V2 frame
            if inner_cookie & !super::COOKIE_FLAGS_MASK == V2_COMPRESSED_COOKIE_BASE {
                return Err(DeserializeError::UnsupportedFeature);
            }
            return Err(DeserializeError::InvalidCookie(inner_cookie));
        }

        self.deser_v2(&mut deflate_reader)
    }

    #[allow(clippy::float_cmp)]
    fn deser_v2<T: Counter, R: Read>(
        &mut self,
        reader: &mut R,
    ) -> Result<Histogram<T>, DeserializeError> {
        let payload_len = reader
            .read_u32::<BigEndian>()?
            .to_usize()
            .ok_or(DeserializeError::EncodedArrayTooLong)?;
        let normalizing_offset = reader.read_u32::<BigEndian>()?;
        if normalizing_offset != 0 {
            return Err(DeserializeError::UnsupportedFeature);
        }
        let num_digits = reader
            .read_u32::<BigEndian>()?
            .to_u8()
            .ok_or(DeserializeError::InvalidParameters)?;
        let low = reader
            .read_u64::<BigEndian>()?
            .to_i64()
            .ok_or(DeserializeError::InvalidParameters)?;
        let high = reader
            .read_u64::<BigEndian>()?
            .to_i64()
            .ok_or(DeserializeError::InvalidParameters)?;
        let int_double_ratio = reader.read_f64::<BigEndian>()?;
        if int_double_ratio != 1.0 {
            return Err(DeserializeError::UnsupportedFeature);
        }

        let mut h = Histogram::new(low, high, num_digits)
            .map_err(|_| DeserializeError::InvalidParameters)?;

        // every count takes at least a byte, so a payload far longer than the counts array
        // cannot be valid
        if payload_len > h.len().saturating_mul(super::varint::MAX_ENCODED_LEN) {
            return Err(DeserializeError::EncodedArrayTooLong);
        }

        if payload_len > self.payload_buf.len() {
            self.payload_buf.resize(payload_len, 0);
        }

        let payload_slice = &mut self.payload_buf[0..payload_len];
        reader.read_exact(payload_slice)?;

        let mut payload_index: usize = 0;
        let mut restat_state = RestatState::new();
        let mut decode_state = DecodeLoopState::new();

        while payload_index < payload_len {
            let (zz_num, bytes_read) = varint_read_slice(&payload_slice[payload_index..])?;
            payload_index += bytes_read;

            let count_or_zeros = zig_zag_decode(zz_num);
            decode_state.on_decoded_num(count_or_zeros, &mut restat_state, &mut h)?;
        }

        restat_state.update_histogram(&mut h);
        trace!(
            payload_len,
            total_count = h.total_count(),
            "decoded V2 histogram"
        );

        Ok(h)
    }
}

/// Position in the counts array while replaying the run-length encoded payload.
struct DecodeLoopState {
    dest_index: usize,
}

impl DecodeLoopState {
    fn new() -> DecodeLoopState {
        DecodeLoopState { dest_index: 0 }
    }

    #[inline]
    fn on_decoded_num<T: Counter>(
        &mut self,
        count_or_zeros: i64,
        restat_state: &mut RestatState<T>,
        h: &mut Histogram<T>,
    ) -> Result<(), DeserializeError> {
        if count_or_zeros < 0 {
            // skip the zeros
            let zero_count = count_or_zeros
                .checked_neg()
                .and_then(|n| n.to_usize())
                .ok_or(DeserializeError::EncodedArrayTooLong)?;
            self.dest_index = self
                .dest_index
                .checked_add(zero_count)
                .ok_or(DeserializeError::EncodedArrayTooLong)?;
        } else {
            let count: T =
                T::from_i64(count_or_zeros).ok_or(DeserializeError::UnsuitableCounterType)?;

            if count > T::zero() {
                h.set_count_at_index(self.dest_index, count)
                    .map_err(|_| DeserializeError::EncodedArrayTooLong)?;

                restat_state.on_nonzero_count(self.dest_index, count);
            }

            self.dest_index = self
                .dest_index
                .checked_add(1)
                .ok_or(DeserializeError::EncodedArrayTooLong)?;
        }

        Ok(())
    }
}
