//! `SADD`/`SREM`/`SMEMBERS`/`SISMEMBER`/`SCARD`.

use super::{parse_integer, parse_string_array};
use crate::error::CoreResult;
use crate::resp::{RespEncoder, RespValue};

pub fn build_sadd(key: &str, members: &[&str]) -> RespValue {
    let mut args = vec![key];
    args.extend_from_slice(members);
    RespEncoder::command("SADD", &args)
}

pub fn parse_sadd(resp: RespValue) -> CoreResult<Option<i64>> {
    parse_integer(resp)
}

pub fn build_srem(key: &str, members: &[&str]) -> RespValue {
    let mut args = vec![key];
    args.extend_from_slice(members);
    RespEncoder::command("SREM", &args)
}

pub fn build_smembers(key: &str) -> RespValue {
    RespEncoder::command("SMEMBERS", &[key])
}

pub fn parse_smembers(resp: RespValue) -> CoreResult<Option<Vec<String>>> {
    parse_string_array(resp)
}

pub fn build_sismember(key: &str, member: &str) -> RespValue {
    RespEncoder::command("SISMEMBER", &[key, member])
}

pub fn parse_sismember(resp: RespValue) -> CoreResult<Option<bool>> {
    Ok(parse_integer(resp)?.map(|n| n == 1))
}

pub fn build_scard(key: &str) -> RespValue {
    RespEncoder::command("SCARD", &[key])
}
