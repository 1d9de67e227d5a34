//! `GET`/`SET`/`DEL`/`INCR`-family commands.

use bytes::Bytes;

use super::{parse_integer, parse_ok_bool, parse_optional_bytes, parse_optional_string};
use crate::error::CoreResult;
use crate::resp::{RespEncoder, RespValue};

pub fn build_get(key: &str) -> RespValue {
    RespEncoder::command("GET", &[key])
}

pub fn parse_get(resp: RespValue) -> CoreResult<Option<String>> {
    parse_optional_string(resp)
}

/// Raw-bytes variant of [`parse_get`], for callers that decode the payload
/// through a [`crate::codec::ValueCodec`] instead of reading it as UTF-8.
pub fn parse_get_bytes(resp: RespValue) -> CoreResult<Option<Bytes>> {
    parse_optional_bytes(resp)
}

pub fn build_set(key: &str, value: &[u8]) -> RespValue {
    RespEncoder::command("SET", &[key.as_bytes(), value])
}

pub fn parse_set(resp: RespValue) -> CoreResult<Option<bool>> {
    parse_ok_bool(resp)
}

pub fn build_set_ex(key: &str, value: &[u8], ttl_seconds: i64) -> RespValue {
    RespEncoder::command(
        "SET",
        &[key.as_bytes(), value, b"EX", ttl_seconds.to_string().as_bytes()],
    )
}

pub fn build_del(keys: &[&str]) -> RespValue {
    RespEncoder::command("DEL", keys)
}

pub fn parse_del(resp: RespValue) -> CoreResult<Option<i64>> {
    parse_integer(resp)
}

pub fn build_incr(key: &str) -> RespValue {
    RespEncoder::command("INCR", &[key])
}

pub fn build_incr_by(key: &str, delta: i64) -> RespValue {
    RespEncoder::command("INCRBY", &[key.as_bytes(), delta.to_string().as_bytes()])
}

pub fn parse_incr(resp: RespValue) -> CoreResult<Option<i64>> {
    parse_integer(resp)
}

pub fn build_expire(key: &str, ttl_seconds: i64) -> RespValue {
    RespEncoder::command("EXPIRE", &[key.as_bytes(), ttl_seconds.to_string().as_bytes()])
}

pub fn build_ttl(key: &str) -> RespValue {
    RespEncoder::command("TTL", &[key])
}

pub fn parse_ttl(resp: RespValue) -> CoreResult<Option<i64>> {
    parse_integer(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_command_shape() {
        let cmd = build_get("k");
        let elements = cmd.as_array().unwrap();
        assert_eq!(elements[0].as_bulk(), Some(b"GET".as_ref()));
        assert_eq!(elements[1].as_bulk(), Some(b"k".as_ref()));
    }

    #[test]
    fn get_parses_nil_as_none() {
        assert_eq!(parse_get(RespValue::BulkString(None)).unwrap(), None);
    }

    #[test]
    fn set_ex_includes_ttl() {
        let cmd = build_set_ex("k", b"v", 30);
        let elements = cmd.as_array().unwrap();
        assert_eq!(elements.len(), 4);
        assert_eq!(elements[3].as_bulk(), Some(b"30".as_ref()));
    }
}
