//! `GEOADD`/`GEOPOS`/`GEODIST`.

use crate::error::CoreError;
use crate::error::CoreResult;
use crate::resp::{RespEncoder, RespValue};

pub fn build_geoadd(key: &str, longitude: f64, latitude: f64, member: &str) -> RespValue {
    RespEncoder::command(
        "GEOADD",
        &[key.to_string(), longitude.to_string(), latitude.to_string(), member.to_string()],
    )
}

pub fn build_geopos(key: &str, member: &str) -> RespValue {
    RespEncoder::command("GEOPOS", &[key, member])
}

/// `GEOPOS` replies with an array of (possibly nil) `[lon, lat]` pairs;
/// this client only ever asks for one member at a time, so unwrap that.
pub fn parse_geopos(resp: RespValue) -> CoreResult<Option<(f64, f64)>> {
    let items = resp
        .as_array()
        .ok_or_else(|| CoreError::unexpected("expected array reply from GEOPOS"))?;
    let Some(first) = items.first() else {
        return Ok(None);
    };
    match first {
        RespValue::Array(None) => Ok(None),
        RespValue::Array(Some(pair)) if pair.len() == 2 => {
            let lon = parse_float(&pair[0])?;
            let lat = parse_float(&pair[1])?;
            Ok(Some((lon, lat)))
        }
        other => Err(CoreError::unexpected(format!("unexpected GEOPOS element: {other:?}"))),
    }
}

pub fn build_geodist(key: &str, member1: &str, member2: &str, unit: &str) -> RespValue {
    RespEncoder::command("GEODIST", &[key, member1, member2, unit])
}

pub fn parse_geodist(resp: RespValue) -> CoreResult<Option<f64>> {
    match resp {
        RespValue::BulkString(None) => Ok(None),
        RespValue::BulkString(Some(b)) => {
            let text = std::str::from_utf8(&b)
                .map_err(|e| CoreError::unexpected(format!("invalid UTF-8 distance: {e}")))?;
            Ok(Some(text.parse().map_err(|e| {
                CoreError::unexpected(format!("invalid distance value: {e}"))
            })?))
        }
        other => Err(CoreError::unexpected(format!("unexpected reply shape: {other:?}"))),
    }
}

fn parse_float(value: &RespValue) -> CoreResult<f64> {
    let bytes = value
        .as_bulk()
        .ok_or_else(|| CoreError::unexpected("expected bulk string coordinate"))?;
    std::str::from_utf8(bytes)
        .map_err(|e| CoreError::unexpected(format!("invalid UTF-8 coordinate: {e}")))?
        .parse()
        .map_err(|e| CoreError::unexpected(format!("invalid coordinate value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn geopos_parses_pair() {
        let resp = RespValue::Array(Some(vec![RespValue::Array(Some(vec![
            RespValue::bulk(Bytes::from("13.361389")),
            RespValue::bulk(Bytes::from("38.115556")),
        ]))]));
        let (lon, lat) = parse_geopos(resp).unwrap().unwrap();
        assert!((lon - 13.361389).abs() < 1e-6);
        assert!((lat - 38.115556).abs() < 1e-6);
    }

    #[test]
    fn geopos_nil_member_is_none() {
        let resp = RespValue::Array(Some(vec![RespValue::Array(None)]));
        assert_eq!(parse_geopos(resp).unwrap(), None);
    }
}
