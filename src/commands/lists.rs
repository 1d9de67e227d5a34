//! `LPUSH`/`RPUSH`/`LPOP`/`RPOP`/`LRANGE`/`LLEN`.

use super::{parse_integer, parse_optional_string, parse_string_array};
use crate::error::CoreResult;
use crate::resp::{RespEncoder, RespValue};

pub fn build_lpush(key: &str, values: &[&str]) -> RespValue {
    let mut args = vec![key];
    args.extend_from_slice(values);
    RespEncoder::command("LPUSH", &args)
}

pub fn build_rpush(key: &str, values: &[&str]) -> RespValue {
    let mut args = vec![key];
    args.extend_from_slice(values);
    RespEncoder::command("RPUSH", &args)
}

pub fn parse_push(resp: RespValue) -> CoreResult<Option<i64>> {
    parse_integer(resp)
}

pub fn build_lpop(key: &str) -> RespValue {
    RespEncoder::command("LPOP", &[key])
}

pub fn build_rpop(key: &str) -> RespValue {
    RespEncoder::command("RPOP", &[key])
}

pub fn parse_pop(resp: RespValue) -> CoreResult<Option<String>> {
    parse_optional_string(resp)
}

pub fn build_lrange(key: &str, start: i64, stop: i64) -> RespValue {
    RespEncoder::command("LRANGE", &[key.to_string(), start.to_string(), stop.to_string()])
}

pub fn parse_lrange(resp: RespValue) -> CoreResult<Option<Vec<String>>> {
    parse_string_array(resp)
}

pub fn build_llen(key: &str) -> RespValue {
    RespEncoder::command("LLEN", &[key])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lrange_command_shape() {
        let cmd = build_lrange("k", 0, -1);
        let elements = cmd.as_array().unwrap();
        assert_eq!(elements[2].as_bulk(), Some(b"-1".as_ref()));
    }
}
