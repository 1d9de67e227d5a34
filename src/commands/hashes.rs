//! `HSET`/`HGET`/`HGETALL`/`HDEL`/`HEXISTS`.

use std::collections::HashMap;

use super::parse_optional_string;
use crate::error::CoreError;
use crate::error::CoreResult;
use crate::resp::{RespEncoder, RespValue};

pub fn build_hset(key: &str, field: &str, value: &str) -> RespValue {
    RespEncoder::command("HSET", &[key, field, value])
}

pub fn build_hget(key: &str, field: &str) -> RespValue {
    RespEncoder::command("HGET", &[key, field])
}

pub fn parse_hget(resp: RespValue) -> CoreResult<Option<String>> {
    parse_optional_string(resp)
}

pub fn build_hgetall(key: &str) -> RespValue {
    RespEncoder::command("HGETALL", &[key])
}

pub fn parse_hgetall(resp: RespValue) -> CoreResult<Option<HashMap<String, String>>> {
    match resp {
        RespValue::Array(None) => Ok(None),
        RespValue::Array(Some(items)) => {
            if items.len() % 2 != 0 {
                return Err(CoreError::unexpected("HGETALL reply had odd element count"));
            }
            let mut map = HashMap::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
                let field = field
                    .as_bulk()
                    .ok_or_else(|| CoreError::unexpected("HGETALL field was not a bulk string"))?;
                let value = value
                    .as_bulk()
                    .ok_or_else(|| CoreError::unexpected("HGETALL value was not a bulk string"))?;
                map.insert(
                    String::from_utf8_lossy(field).into_owned(),
                    String::from_utf8_lossy(value).into_owned(),
                );
            }
            Ok(Some(map))
        }
        other => Err(CoreError::unexpected(format!("expected array reply, got {other:?}"))),
    }
}

pub fn build_hdel(key: &str, fields: &[&str]) -> RespValue {
    let mut args = vec![key];
    args.extend_from_slice(fields);
    RespEncoder::command("HDEL", &args)
}

pub fn build_hexists(key: &str, field: &str) -> RespValue {
    RespEncoder::command("HEXISTS", &[key, field])
}

pub fn parse_hexists(resp: RespValue) -> CoreResult<Option<bool>> {
    match resp {
        RespValue::Integer(n) => Ok(Some(n == 1)),
        other => Err(CoreError::unexpected(format!("expected integer reply, got {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn hgetall_pairs_fields_with_values() {
        let resp = RespValue::Array(Some(vec![
            RespValue::bulk(Bytes::from("f1")),
            RespValue::bulk(Bytes::from("v1")),
            RespValue::bulk(Bytes::from("f2")),
            RespValue::bulk(Bytes::from("v2")),
        ]));
        let map = parse_hgetall(resp).unwrap().unwrap();
        assert_eq!(map.get("f1").unwrap(), "v1");
        assert_eq!(map.get("f2").unwrap(), "v2");
    }
}
