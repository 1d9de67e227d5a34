//! `ZADD`/`ZSCORE`/`ZRANGE`/`ZRANGEBYSCORE`/`ZREM`.
//!
//! [`ZAddBatch`] resolves the Open Question in `SPEC_FULL.md` §9: when
//! several `zadd` calls against the same key are coalesced into one
//! `ZADD`, the coalescing map must be keyed by `member`, not by `key` —
//! otherwise two different members added to the same sorted set in the
//! same batch silently clobber each other, keeping only the last score
//! seen for that *key*. `key` only ever identifies which sorted set is
//! being written to.

use std::collections::HashMap;

use super::{parse_integer, parse_string_array};
use crate::error::{CoreError, CoreResult};
use crate::resp::{RespEncoder, RespValue};

pub fn build_zadd(key: &str, score: f64, member: &str) -> RespValue {
    RespEncoder::command("ZADD", &[key.as_bytes(), format_score(score).as_bytes(), member.as_bytes()])
}

pub fn parse_zadd(resp: RespValue) -> CoreResult<Option<i64>> {
    parse_integer(resp)
}

pub fn build_zscore(key: &str, member: &str) -> RespValue {
    RespEncoder::command("ZSCORE", &[key, member])
}

pub fn parse_zscore(resp: RespValue) -> CoreResult<Option<f64>> {
    match resp {
        RespValue::BulkString(None) => Ok(None),
        RespValue::BulkString(Some(b)) => {
            let text = std::str::from_utf8(&b)
                .map_err(|e| CoreError::unexpected(format!("invalid UTF-8 score: {e}")))?;
            parse_score(text).map(Some)
        }
        other => Err(CoreError::unexpected(format!("unexpected reply shape: {other:?}"))),
    }
}

pub fn build_zrange(key: &str, start: i64, stop: i64) -> RespValue {
    RespEncoder::command(
        "ZRANGE",
        &[key.to_string(), start.to_string(), stop.to_string()],
    )
}

pub fn build_zrangebyscore(key: &str, min: f64, max: f64) -> RespValue {
    RespEncoder::command("ZRANGEBYSCORE", &[key.to_string(), format_score(min), format_score(max)])
}

pub fn parse_zrange(resp: RespValue) -> CoreResult<Option<Vec<String>>> {
    parse_string_array(resp)
}

pub fn build_zrem(key: &str, members: &[&str]) -> RespValue {
    let mut args = vec![key];
    args.extend_from_slice(members);
    RespEncoder::command("ZREM", &args)
}

fn format_score(score: f64) -> String {
    if score.is_infinite() {
        if score > 0.0 { "+inf".to_string() } else { "-inf".to_string() }
    } else {
        score.to_string()
    }
}

fn parse_score(text: &str) -> CoreResult<f64> {
    match text {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        other => other
            .parse()
            .map_err(|e| CoreError::unexpected(format!("invalid score: {e}"))),
    }
}

/// Coalesces multiple `zadd` calls against one key into a single `ZADD`
/// command, keyed internally by `member` so the last write for each
/// distinct member survives (not the last write overall).
#[derive(Debug, Default)]
pub struct ZAddBatch {
    by_member: HashMap<String, f64>,
}

impl ZAddBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, member: impl Into<String>, score: f64) {
        self.by_member.insert(member.into(), score);
    }

    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }

    pub fn build(&self, key: &str) -> Option<RespValue> {
        if self.by_member.is_empty() {
            return None;
        }
        let mut args = vec![key.to_string()];
        for (member, score) in &self.by_member {
            args.push(format_score(*score));
            args.push(member.clone());
        }
        Some(RespEncoder::command("ZADD", &args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_formatting_handles_infinities() {
        assert_eq!(format_score(f64::INFINITY), "+inf");
        assert_eq!(format_score(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_score(1.5), "1.5");
    }

    #[test]
    fn score_parsing_round_trips() {
        assert_eq!(parse_score("+inf").unwrap(), f64::INFINITY);
        assert_eq!(parse_score("-inf").unwrap(), f64::NEG_INFINITY);
        assert_eq!(parse_score("2.25").unwrap(), 2.25);
    }

    #[test]
    fn batch_keeps_distinct_members_keyed_by_member_not_key() {
        let mut batch = ZAddBatch::new();
        batch.add("alice", 1.0);
        batch.add("bob", 2.0);
        // Re-adding "alice" with a new score must overwrite only alice's
        // entry, never bob's — this is the behavior the key-keyed bug
        // would have broken.
        batch.add("alice", 5.0);

        assert_eq!(batch.by_member.get("alice"), Some(&5.0));
        assert_eq!(batch.by_member.get("bob"), Some(&2.0));

        let cmd = batch.build("leaderboard").unwrap();
        let elements = cmd.as_array().unwrap();
        // ZADD key score1 member1 score2 member2 -> 1 + 2*2 = 5 elements
        assert_eq!(elements.len(), 5);
    }

    #[test]
    fn empty_batch_builds_nothing() {
        assert!(ZAddBatch::new().build("k").is_none());
    }
}
