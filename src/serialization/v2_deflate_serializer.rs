use super::v2_serializer::V2Serializer;
use super::{EncodeError, Serializer, V2_COMPRESSED_COOKIE};
use crate::{Counter, Histogram};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// Serializer for the V2 + DEFLATE binary format.
///
/// It's called "deflate" to stay consistent with the naming used in the Java implementation, but
/// it actually uses zlib's wrapper format around plain DEFLATE.
pub struct V2DeflateSerializer {
    uncompressed_buf: Vec<u8>,
    compressed_buf: Vec<u8>,
    v2_serializer: V2Serializer,
}

impl Default for V2DeflateSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl V2DeflateSerializer {
    /// Create a new serializer.
    pub fn new() -> V2DeflateSerializer {
        V2DeflateSerializer {
            uncompressed_buf: Vec::new(),
            compressed_buf: Vec::new(),
            v2_serializer: V2Serializer::new(),
        }
    }
}

impl Serializer for V2DeflateSerializer {
    type SerializeError = EncodeError;

    fn serialize<T: Counter, W: Write>(
        &mut self,
        h: &Histogram<T>,
        writer: &mut W,
    ) -> Result<usize, EncodeError> {
        self.uncompressed_buf.clear();
        self.compressed_buf.clear();
        let uncompressed_len = self
            .v2_serializer
            .serialize(h, &mut self.uncompressed_buf)?;

        debug_assert_eq!(self.uncompressed_buf.len(), uncompressed_len);
        // assume 50% compression as a baseline to reserve
        self.compressed_buf.reserve(self.uncompressed_buf.len() / 2);

        self.compressed_buf
            .write_u32::<BigEndian>(V2_COMPRESSED_COOKIE)?;
        // placeholder for length
        self.compressed_buf.write_u32::<BigEndian>(0)?;

        {
            let mut compressor = ZlibEncoder::new(&mut self.compressed_buf, Compression::default());
            compressor.write_all(&self.uncompressed_buf[0..uncompressed_len])?;
            let _ = compressor.finish()?;
        }

        // length is always at least 8
        let total_compressed_len = self.compressed_buf.len();
        BigEndian::write_u32(
            &mut self.compressed_buf[4..8],
            (total_compressed_len - 8) as u32,
        );

        writer.write_all(&self.compressed_buf)?;

        Ok(total_compressed_len)
    }
}
