//! Serialization/deserialization support.
//!
//! The upstream Java project has established several different types of serialization. We have
//! currently implemented V2 and V2 + zlib compression, the same formats the other HdrHistogram
//! implementations read and write. The legacy V1 formats are recognized, but rejected.
//!
//! # Formats
//!
//! Every encoded histogram starts with a 4 byte big endian "cookie" identifying the format. The
//! cookie is followed by the length of the payload and then the payload.
//!
//! A V2 payload holds the configuration (significant figures, lowest and highest trackable value)
//! and the counts array up to the last non-zero slot. Each count is a zig-zag varint (see
//! `varint`); a run of more than one empty slot is written as a single negative number holding the
//! length of the run.
//!
//! The compressed flavor wraps a complete V2 frame into a zlib stream. It is what the interval
//! log uses, and the sensible default for anything sent over the wire.
//!
//! # Usage
//!
//! Most of the time `Histogram::encode` and `Histogram::decode` are all that's needed:
//!
//! ```
//! use hdrwindow::Histogram;
//! use hdrwindow::serialization::Cookie;
//!
//! let mut hist = Histogram::<u64>::new(1, 1000, 3).unwrap();
//! hist.record(42).unwrap();
//!
//! let text = hist.encode_base64(Cookie::V2Compressed).unwrap();
//! let decoded = Histogram::<u64>::decode(text.as_bytes()).unwrap();
//! assert_eq!(hist, decoded);
//! ```
//!
//! To reuse buffers across many histograms, keep a `V2Serializer` or `V2DeflateSerializer` and a
//! `Deserializer` around instead:
//!
//! ```
//! use hdrwindow::Histogram;
//! use hdrwindow::serialization::{Deserializer, Serializer, V2DeflateSerializer};
//!
//! let mut serializer = V2DeflateSerializer::new();
//! let mut deserializer = Deserializer::new();
//! let mut buf = Vec::new();
//!
//! for i in 1..4 {
//!     let mut h = Histogram::<u32>::new(1, 1000, 3).unwrap();
//!     h.record_n(i * 10, 5).unwrap();
//!
//!     buf.clear();
//!     serializer.serialize(&h, &mut buf).unwrap();
//!
//!     let back: Histogram<u32> = deserializer.deserialize(&mut buf.as_slice()).unwrap();
//!     assert_eq!(5, back.total_count());
//! }
//! ```
//!
//! The counter type of the decoded histogram does not have to match the one that was encoded, as
//! long as every count fits.

use std::{error, fmt, io};

use byteorder::{BigEndian, ByteOrder};

use super::{Counter, Histogram};


pub mod varint;
pub use self::varint::VarintError;

mod v2_serializer;
pub use self::v2_serializer::V2Serializer;

mod v2_deflate_serializer;
pub use self::v2_deflate_serializer::V2DeflateSerializer;

mod deserializer;
pub use self::deserializer::{DeserializeError, Deserializer};

pub mod interval_log;

const V1_COOKIE_BASE: u32 = 0x1c84_9301;
const V1_COMPRESSED_COOKIE_BASE: u32 = 0x1c84_9302;
const V2_COOKIE_BASE: u32 = 0x1c84_9303;
const V2_COMPRESSED_COOKIE_BASE: u32 = 0x1c84_9304;

// the 0x10 nibble is a word size flag in the oldest formats; it is ignored when reading
const COOKIE_FLAGS_MASK: u32 = 0xf0;

const V2_COOKIE: u32 = V2_COOKIE_BASE | 0x10;
const V2_COMPRESSED_COOKIE: u32 = V2_COMPRESSED_COOKIE_BASE | 0x10;

const V2_HEADER_SIZE: usize = 40;

/// The format an encoded histogram is in, as identified by its leading 4 byte cookie.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Cookie {
    /// The V1 formats, plain and compressed. Recognized, but never read or written.
    LegacyV1,
    /// Plain V2.
    V2,
    /// V2 wrapped in a zlib stream.
    V2Compressed,
}

impl Cookie {
    /// Identify the format of a raw cookie value, ignoring its flag nibble.
    pub fn from_u32(cookie: u32) -> Option<Cookie> {
        match cookie & !COOKIE_FLAGS_MASK {
            V1_COOKIE_BASE | V1_COMPRESSED_COOKIE_BASE => Some(Cookie::LegacyV1),
            V2_COOKIE_BASE => Some(Cookie::V2),
            V2_COMPRESSED_COOKIE_BASE => Some(Cookie::V2Compressed),
            _ => None,
        }
    }

    /// The cookie value written for this format, if it can be written.
    pub fn to_u32(self) -> Option<u32> {
        match self {
            Cookie::LegacyV1 => None,
            Cookie::V2 => Some(V2_COOKIE),
            Cookie::V2Compressed => Some(V2_COMPRESSED_COOKIE),
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cookie::LegacyV1 => write!(f, "V1"),
            Cookie::V2 => write!(f, "V2"),
            Cookie::V2Compressed => write!(f, "V2 compressed"),
        }
    }
}

/// Errors that occur during serialization.
#[derive(Debug)]
pub enum EncodeError {
    /// The requested format can only be read, not written.
    UnsupportedCookie(Cookie),
    /// A count above i64::max_value() cannot be zig-zag encoded, and therefore cannot be
    /// serialized.
    CountNotSerializable,
    /// An i/o operation failed.
    IoError(io::Error),
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        EncodeError::IoError(e)
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncodeError::UnsupportedCookie(c) => write!(f, "Cannot encode the {} format", c),
            EncodeError::CountNotSerializable => write!(
                f,
                "A count above i64::max_value() cannot be zig-zag encoded"
            ),
            EncodeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
        }
    }
}

impl error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            EncodeError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// Histogram serializer.
///
/// Different implementations serialize to different formats.
pub trait Serializer {
    /// Error type returned when serialization fails.
    type SerializeError: fmt::Debug;

    /// Serialize the histogram into the provided writer.
    /// Returns the number of bytes written, or an error.
    ///
    /// Note that `Vec<u8>` is a reasonable `Write` implementation for simple usage.
    fn serialize<T: Counter, W: io::Write>(
        &mut self,
        h: &Histogram<T>,
        writer: &mut W,
    ) -> Result<usize, Self::SerializeError>;
}

impl<T: Counter> Histogram<T> {
    /// Encode this histogram in the given format.
    ///
    /// Only the V2 formats can be written; `Cookie::LegacyV1` fails with
    /// `EncodeError::UnsupportedCookie`.
    pub fn encode(&self, cookie: Cookie) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        let _ = match cookie {
            Cookie::V2 => V2Serializer::new().serialize(self, &mut buf)?,
            Cookie::V2Compressed => V2DeflateSerializer::new().serialize(self, &mut buf)?,
            Cookie::LegacyV1 => return Err(EncodeError::UnsupportedCookie(cookie)),
        };
        Ok(buf)
    }

    /// Encode this histogram in the given format, then as standard base64 (the form used in
    /// interval logs).
    pub fn encode_base64(&self, cookie: Cookie) -> Result<String, EncodeError> {
        self.encode(cookie)
            .map(|bytes| base64::encode_config(&bytes, base64::STANDARD))
    }

    /// Decode a histogram from either its raw encoding or the base64 text of it.
    ///
    /// Input that starts with a known cookie is read as raw bytes. Anything else is taken to be
    /// base64; surrounding whitespace is ignored.
    pub fn decode(input: &[u8]) -> Result<Histogram<T>, DeserializeError> {
        let mut deserializer = Deserializer::new();
        if starts_with_cookie(input) {
            return deserializer.deserialize(&mut &input[..]);
        }

        let bytes = base64::decode_config(trim_ascii_whitespace(input), base64::STANDARD)
            .map_err(DeserializeError::Base64)?;
        deserializer.deserialize(&mut bytes.as_slice())
    }
}

fn starts_with_cookie(input: &[u8]) -> bool {
    input.len() >= 4 && Cookie::from_u32(BigEndian::read_u32(&input[0..4])).is_some()
}

fn trim_ascii_whitespace(input: &[u8]) -> &[u8] {
    let start = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or_else(|| input.len());
    let end = input
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &input[start..end]
}
