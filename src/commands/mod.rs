//! Representative command surface (Module R, expansion).
//!
//! Each submodule is a pair of pure functions per command: `build_*`
//! constructs the RESP command object, `parse_*` turns the RESP reply into
//! a typed result. [`crate::exec::ExecPolicy::execute`] is the only place
//! that actually drives a command against a channel — these functions
//! never touch I/O, which is what lets [`crate::direct_client::DirectClient`],
//! [`crate::master_slave::MasterSlaveClient`], and
//! [`crate::cluster::client::ClusterClient`] all share one definition of
//! what `GET`/`SET`/... mean.
//!
//! Translating method arguments into RESP is explicitly out of scope as an
//! exhaustive effort (see `SPEC_FULL.md` §1) — this module covers a
//! representative slice: strings/counters, sets, sorted sets, lists,
//! hashes, geo.

pub mod geo;
pub mod hashes;
pub mod lists;
pub mod sets;
pub mod sorted_sets;
pub mod strings;

use bytes::Bytes;

use crate::error::{CoreError, CoreResult};
use crate::resp::RespValue;

/// Shared "reply was a bulk string or nil" parse, used by most single-value
/// reads.
pub(crate) fn parse_optional_string(resp: RespValue) -> CoreResult<Option<String>> {
    match resp {
        RespValue::BulkString(None) => Ok(None),
        RespValue::BulkString(Some(b)) => Ok(Some(
            String::from_utf8(b.to_vec())
                .map_err(|e| CoreError::unexpected(format!("invalid UTF-8 reply: {e}")))?,
        )),
        other => Err(CoreError::unexpected(format!("unexpected reply shape: {other:?}"))),
    }
}

/// Same shape as [`parse_optional_string`], but without the UTF-8 check —
/// for reads whose payload goes through a [`crate::codec::ValueCodec`]
/// before it's interpreted as text.
pub(crate) fn parse_optional_bytes(resp: RespValue) -> CoreResult<Option<Bytes>> {
    match resp {
        RespValue::BulkString(payload) => Ok(payload),
        other => Err(CoreError::unexpected(format!("unexpected reply shape: {other:?}"))),
    }
}

pub(crate) fn parse_integer(resp: RespValue) -> CoreResult<Option<i64>> {
    match resp {
        RespValue::Integer(n) => Ok(Some(n)),
        other => Err(CoreError::unexpected(format!("expected integer reply, got {other:?}"))),
    }
}

pub(crate) fn parse_ok_bool(resp: RespValue) -> CoreResult<Option<bool>> {
    match resp {
        RespValue::SimpleString(s) if s == "OK" => Ok(Some(true)),
        RespValue::BulkString(None) => Ok(Some(false)),
        other => Err(CoreError::unexpected(format!("unexpected reply shape: {other:?}"))),
    }
}

pub(crate) fn parse_string_array(resp: RespValue) -> CoreResult<Option<Vec<String>>> {
    match resp {
        RespValue::Array(None) => Ok(None),
        RespValue::Array(Some(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    RespValue::BulkString(Some(b)) => out.push(
                        String::from_utf8(b.to_vec())
                            .map_err(|e| CoreError::unexpected(format!("invalid UTF-8 reply: {e}")))?,
                    ),
                    RespValue::BulkString(None) => out.push(String::new()),
                    other => {
                        return Err(CoreError::unexpected(format!(
                            "unexpected array element: {other:?}"
                        )))
                    }
                }
            }
            Ok(Some(out))
        }
        other => Err(CoreError::unexpected(format!("expected array reply, got {other:?}"))),
    }
}
