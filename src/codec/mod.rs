//! Value codecs for [`DirectClient`](crate::direct_client::DirectClient)
//! (Module D). Two interchangeable encodings of a Rust value into the
//! bytes stored at a Redis key:
//!
//! - [`StringCodec`]: raw UTF-8, no framing — interoperable with any other
//!   Redis client.
//! - [`ObjectCodec`]: a private one-byte type tag plus optional gzip
//!   compression above a size threshold. Only this library can read back
//!   what it wrote.

use bytes::Bytes;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use std::io::Read;

use crate::error::{CoreError, CoreResult};

/// A value codec binds `Vec<u8>` storage to a typed Rust value.
pub trait ValueCodec: Send + Sync + 'static {
    fn encode(&self, value: &str) -> Bytes;
    fn decode(&self, bytes: &[u8]) -> CoreResult<String>;
}

/// Raw passthrough: bytes are exactly the UTF-8 string, nothing else.
/// Default codec, and the only one another Redis client can read.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl ValueCodec for StringCodec {
    fn encode(&self, value: &str) -> Bytes {
        Bytes::copy_from_slice(value.as_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<String> {
        std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|e| CoreError::unexpected(format!("invalid UTF-8 in stored value: {e}")))
    }
}

const TAG_STRING: u8 = 0x01;
const FLAG_COMPRESSED: u8 = 0b1000_0000;
const DEFAULT_COMPRESSION_THRESHOLD: usize = 64 * 1024;

/// One-byte-tagged, optionally gzip-compressed encoding. Layout:
/// `[tag: u8][payload]`, where bit 7 of `tag` marks the payload as
/// gzip-compressed. Only string values are modeled here; the tag byte
/// leaves room for future scalar/object variants without breaking the
/// wire format of what's already written.
#[derive(Debug, Clone, Copy)]
pub struct ObjectCodec {
    compression_threshold: usize,
}

impl Default for ObjectCodec {
    fn default() -> Self {
        Self { compression_threshold: DEFAULT_COMPRESSION_THRESHOLD }
    }
}

impl ObjectCodec {
    pub fn with_compression_threshold(compression_threshold: usize) -> Self {
        Self { compression_threshold }
    }
}

impl ValueCodec for ObjectCodec {
    fn encode(&self, value: &str) -> Bytes {
        let raw = value.as_bytes();
        if raw.len() < self.compression_threshold {
            let mut out = Vec::with_capacity(raw.len() + 1);
            out.push(TAG_STRING);
            out.extend_from_slice(raw);
            return Bytes::from(out);
        }

        let mut encoder = GzEncoder::new(raw, Compression::default());
        let mut compressed = Vec::new();
        if encoder.read_to_end(&mut compressed).is_err() {
            // Compression failure falls back to an uncompressed write
            // rather than losing the value.
            let mut out = Vec::with_capacity(raw.len() + 1);
            out.push(TAG_STRING);
            out.extend_from_slice(raw);
            return Bytes::from(out);
        }

        let mut out = Vec::with_capacity(compressed.len() + 1);
        out.push(TAG_STRING | FLAG_COMPRESSED);
        out.extend_from_slice(&compressed);
        Bytes::from(out)
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<String> {
        let (&tag, payload) = bytes
            .split_first()
            .ok_or_else(|| CoreError::unexpected("empty object-codec payload"))?;

        let raw: Vec<u8> = if tag & FLAG_COMPRESSED != 0 {
            let mut decoder = GzDecoder::new(payload);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CoreError::unexpected(format!("gzip decode failed: {e}")))?;
            out
        } else {
            payload.to_vec()
        };

        String::from_utf8(raw)
            .map_err(|e| CoreError::unexpected(format!("invalid UTF-8 after decode: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_codec_round_trip() {
        let codec = StringCodec;
        let encoded = codec.encode("hello");
        assert_eq!(encoded.as_ref(), b"hello");
        assert_eq!(codec.decode(&encoded).unwrap(), "hello");
    }

    #[test]
    fn object_codec_small_value_is_uncompressed() {
        let codec = ObjectCodec::default();
        let encoded = codec.encode("small");
        assert_eq!(encoded[0], TAG_STRING);
        assert_eq!(codec.decode(&encoded).unwrap(), "small");
    }

    #[test]
    fn object_codec_large_value_is_compressed() {
        let codec = ObjectCodec::with_compression_threshold(16);
        let big = "x".repeat(1024);
        let encoded = codec.encode(&big);
        assert_eq!(encoded[0], TAG_STRING | FLAG_COMPRESSED);
        assert_eq!(codec.decode(&encoded).unwrap(), big);
    }

    #[test]
    fn object_codec_round_trips_both_paths() {
        let codec = ObjectCodec::with_compression_threshold(8);
        for value in ["ok", "a longer value than eight bytes for sure"] {
            let encoded = codec.encode(value);
            assert_eq!(codec.decode(&encoded).unwrap(), value);
        }
    }
}
