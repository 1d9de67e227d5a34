//! RESP (REdis Serialization Protocol) v2 codec.
//!
//! Decoding is streaming: [`RespCodec::decode`] returns `Ok(None)` when the
//! buffer holds an incomplete frame so callers can feed it more bytes and
//! try again, exactly as a `tokio_util::codec::Decoder` would.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::str;

/// One RESP value. `None` payloads are the RESP nil sentinels (`$-1`, `*-1`),
/// which are distinct from an empty bulk string or empty array.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<Bytes>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn nil_bulk() -> Self {
        RespValue::BulkString(None)
    }

    /// Borrow the payload of a non-nil bulk string, if this is one.
    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(Some(b)) => Some(b.as_ref()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&str> {
        match self {
            RespValue::Error(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error("invalid RESP frame: {0}")]
    InvalidFormat(String),
    #[error("invalid UTF-8 in RESP frame: {0}")]
    InvalidUtf8(#[from] str::Utf8Error),
    #[error("invalid integer in RESP frame: {0}")]
    InvalidInteger(#[from] std::num::ParseIntError),
}

/// Stateless decoder over a growable buffer.
pub struct RespDecoder;

impl RespDecoder {
    /// Decode one value, or `Ok(None)` if `buf` doesn't yet hold a complete
    /// frame. On `Ok(None)` the buffer is left untouched so the caller can
    /// append more bytes and retry.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        if buf.is_empty() {
            return Ok(None);
        }

        match buf[0] {
            b'+' => Self::decode_simple_string(buf),
            b'-' => Self::decode_error(buf),
            b':' => Self::decode_integer(buf),
            b'$' => Self::decode_bulk_string(buf),
            b'*' => Self::decode_array(buf),
            other => Err(RespError::InvalidFormat(format!(
                "unknown type byte: {}",
                other as char
            ))),
        }
    }

    fn decode_simple_string(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        Ok(Self::read_line(buf)?
            .map(|line| str::from_utf8(&line[1..]).map(|s| RespValue::SimpleString(s.to_string())))
            .transpose()?)
    }

    fn decode_error(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        Ok(Self::read_line(buf)?
            .map(|line| str::from_utf8(&line[1..]).map(|s| RespValue::Error(s.to_string())))
            .transpose()?)
    }

    fn decode_integer(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        let Some(line) = Self::read_line(buf)? else {
            return Ok(None);
        };
        let text = str::from_utf8(&line[1..])?;
        Ok(Some(RespValue::Integer(text.parse()?)))
    }

    fn decode_bulk_string(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        let Some(size_line) = Self::read_line(buf)? else {
            return Ok(None);
        };
        let size: i64 = str::from_utf8(&size_line[1..])?.parse()?;
        if size == -1 {
            return Ok(Some(RespValue::BulkString(None)));
        }
        if size < 0 {
            return Err(RespError::InvalidFormat("negative bulk string length".into()));
        }
        let size = size as usize;

        if buf.len() < size + 2 {
            let mut restored = BytesMut::with_capacity(size_line.len() + 2 + buf.len());
            restored.extend_from_slice(&size_line);
            restored.put_slice(b"\r\n");
            restored.extend_from_slice(buf);
            *buf = restored;
            return Ok(None);
        }

        let data = buf.split_to(size);
        if buf.len() < 2 || &buf[..2] != b"\r\n" {
            return Err(RespError::InvalidFormat("missing CRLF after bulk string".into()));
        }
        buf.advance(2);
        Ok(Some(RespValue::BulkString(Some(data.freeze()))))
    }

    fn decode_array(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        let checkpoint = buf.clone();
        let Some(size_line) = Self::read_line(buf)? else {
            return Ok(None);
        };
        let size: i64 = str::from_utf8(&size_line[1..])?.parse()?;
        if size == -1 {
            return Ok(Some(RespValue::Array(None)));
        }
        if size < 0 {
            return Err(RespError::InvalidFormat("negative array length".into()));
        }

        let mut elements = Vec::with_capacity(size as usize);
        for _ in 0..size {
            match Self::decode(buf)? {
                Some(v) => elements.push(v),
                None => {
                    // Incomplete element: restore the whole frame so the
                    // next call re-parses from the array header.
                    *buf = checkpoint;
                    return Ok(None);
                }
            }
        }
        Ok(Some(RespValue::Array(Some(elements))))
    }

    fn read_line(buf: &mut BytesMut) -> Result<Option<Bytes>, RespError> {
        if buf.len() < 2 {
            return Ok(None);
        }
        for i in 0..buf.len() - 1 {
            if buf[i] == b'\r' && buf[i + 1] == b'\n' {
                let mut line = buf.split_to(i + 2);
                line.truncate(i);
                return Ok(Some(line.freeze()));
            }
        }
        Ok(None)
    }
}

/// Stateless encoder writing RESP frames into a [`BytesMut`].
pub struct RespEncoder;

impl RespEncoder {
    pub fn encode(value: &RespValue) -> Bytes {
        let mut buf = BytesMut::new();
        Self::encode_into(&mut buf, value);
        buf.freeze()
    }

    pub fn encode_into(buf: &mut BytesMut, value: &RespValue) {
        match value {
            RespValue::SimpleString(s) => {
                buf.put_u8(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            RespValue::Error(s) => {
                buf.put_u8(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                buf.put_u8(b':');
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            RespValue::BulkString(Some(data)) => {
                buf.put_u8(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.put_slice(b"\r\n");
            }
            RespValue::BulkString(None) => buf.extend_from_slice(b"$-1\r\n"),
            RespValue::Array(Some(elements)) => {
                buf.put_u8(b'*');
                buf.extend_from_slice(elements.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for element in elements {
                    Self::encode_into(buf, element);
                }
            }
            RespValue::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
        }
    }

    /// Build a command: a RESP Array of BulkStrings, the only shape this
    /// client ever sends outbound.
    pub fn command(name: &str, args: &[impl AsRef<[u8]>]) -> RespValue {
        let mut elements = Vec::with_capacity(1 + args.len());
        elements.push(RespValue::bulk(Bytes::copy_from_slice(name.as_bytes())));
        for arg in args {
            elements.push(RespValue::bulk(Bytes::copy_from_slice(arg.as_ref())));
        }
        RespValue::Array(Some(elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_simple_string() {
        let mut buf = BytesMut::from("+OK\r\n");
        let v = RespDecoder::decode(&mut buf).unwrap().unwrap();
        assert_eq!(v, RespValue::SimpleString("OK".into()));
        assert!(buf.is_empty());
        assert_eq!(RespEncoder::encode(&v), Bytes::from("+OK\r\n"));
    }

    #[test]
    fn round_trip_error() {
        let mut buf = BytesMut::from("-ERR boom\r\n");
        let v = RespDecoder::decode(&mut buf).unwrap().unwrap();
        assert_eq!(v, RespValue::Error("ERR boom".into()));
    }

    #[test]
    fn round_trip_integer() {
        let mut buf = BytesMut::from(":1000\r\n");
        assert_eq!(
            RespDecoder::decode(&mut buf).unwrap().unwrap(),
            RespValue::Integer(1000)
        );
    }

    #[test]
    fn round_trip_bulk_string() {
        let mut buf = BytesMut::from("$5\r\nhello\r\n");
        let v = RespDecoder::decode(&mut buf).unwrap().unwrap();
        assert_eq!(v, RespValue::BulkString(Some(Bytes::from("hello"))));
    }

    #[test]
    fn nil_bulk_string() {
        let mut buf = BytesMut::from("$-1\r\n");
        assert_eq!(
            RespDecoder::decode(&mut buf).unwrap().unwrap(),
            RespValue::BulkString(None)
        );
    }

    #[test]
    fn nested_array() {
        let mut buf = BytesMut::from("*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n");
        let v = RespDecoder::decode(&mut buf).unwrap().unwrap();
        let elements = v.as_array().unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].as_bulk(), Some(b"hello".as_ref()));
        assert_eq!(elements[1].as_bulk(), Some(b"world".as_ref()));
    }

    #[test]
    fn incomplete_frame_yields_none_and_preserves_buffer() {
        let mut buf = BytesMut::from("+OK\r");
        assert!(RespDecoder::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf, BytesMut::from("+OK\r"));
    }

    #[test]
    fn incomplete_array_element_restores_whole_frame() {
        let mut buf = BytesMut::from("*2\r\n$5\r\nhello\r\n$5\r\nwor");
        assert!(RespDecoder::decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"ld\r\n");
        let v = RespDecoder::decode(&mut buf).unwrap().unwrap();
        assert_eq!(v.as_array().unwrap().len(), 2);
    }

    #[test]
    fn command_encoding() {
        let cmd = RespEncoder::command("SET", &["key", "value"]);
        let encoded = RespEncoder::encode(&cmd);
        assert_eq!(encoded, Bytes::from("*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n"));
    }

    #[test]
    fn decode_stream_of_concatenated_frames() {
        let mut buf = BytesMut::from("+OK\r\n:5\r\n");
        let mut out = Vec::new();
        while let Some(v) = RespDecoder::decode(&mut buf).unwrap() {
            out.push(v);
        }
        assert_eq!(out, vec![RespValue::SimpleString("OK".into()), RespValue::Integer(5)]);
    }
}
