//! Direct client (Module D): binds the command surface to one
//! [`SocketChannel`], with a pluggable [`ValueCodec`] for values stored
//! through the typed string-valued methods.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::{ChannelStatus, SocketChannel};
use crate::codec::{StringCodec, ValueCodec};
use crate::commands::{geo, hashes, lists, sets, sorted_sets, strings};
use crate::error::{CoreError, CoreResult};
use crate::exec::{require_non_empty, require_positive, ExecPolicy};
use crate::monitor::Monitor;

/// A client bound to exactly one Redis server.
pub struct DirectClient {
    channel: SocketChannel,
    policy: ExecPolicy,
    codec: Box<dyn ValueCodec>,
}

impl DirectClient {
    pub async fn connect(host: &str, timeout: Duration, ping_period: Duration, monitor: Arc<Monitor>) -> CoreResult<Self> {
        let channel = SocketChannel::connect(host, ping_period).await?;
        Ok(Self {
            channel,
            policy: ExecPolicy::new(timeout, Duration::from_millis(100), monitor),
            codec: Box::new(StringCodec),
        })
    }

    pub fn with_codec(mut self, codec: impl ValueCodec) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn host(&self) -> &str {
        self.channel.host()
    }

    pub fn is_available(&self) -> bool {
        self.channel.status() == ChannelStatus::Normal
    }

    pub async fn close(&self) {
        self.channel.close().await;
    }

    // --- strings / counters ---------------------------------------------

    pub async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        require_non_empty("key", key)?;
        let raw = self
            .policy
            .execute("GET", &self.channel, strings::build_get(key), strings::parse_get_bytes)
            .await?;
        raw.map(|bytes| self.codec.decode(&bytes)).transpose()
    }

    pub async fn set(&self, key: &str, value: &str) -> CoreResult<Option<bool>> {
        require_non_empty("key", key)?;
        let encoded = self.codec.encode(value);
        self.policy
            .execute("SET", &self.channel, strings::build_set(key, &encoded), strings::parse_set)
            .await
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_seconds: i64) -> CoreResult<Option<bool>> {
        require_non_empty("key", key)?;
        require_positive("ttl_seconds", ttl_seconds)?;
        let encoded = self.codec.encode(value);
        self.policy
            .execute(
                "SET",
                &self.channel,
                strings::build_set_ex(key, &encoded, ttl_seconds),
                strings::parse_set,
            )
            .await
    }

    pub async fn delete(&self, keys: &[&str]) -> CoreResult<Option<i64>> {
        if keys.is_empty() {
            return Err(CoreError::illegal_argument("keys must not be empty"));
        }
        self.policy
            .execute("DEL", &self.channel, strings::build_del(keys), strings::parse_del)
            .await
    }

    pub async fn incr(&self, key: &str) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("INCR", &self.channel, strings::build_incr(key), strings::parse_incr)
            .await
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("INCRBY", &self.channel, strings::build_incr_by(key, delta), strings::parse_incr)
            .await
    }

    pub async fn expire(&self, key: &str, ttl_seconds: i64) -> CoreResult<Option<bool>> {
        require_non_empty("key", key)?;
        require_positive("ttl_seconds", ttl_seconds)?;
        self.policy
            .execute("EXPIRE", &self.channel, strings::build_expire(key, ttl_seconds), |resp| {
                Ok(resp.as_integer().map(|n| n == 1))
            })
            .await
    }

    pub async fn ttl(&self, key: &str) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("TTL", &self.channel, strings::build_ttl(key), strings::parse_ttl)
            .await
    }

    // --- sets -------------------------------------------------------------

    pub async fn sadd(&self, key: &str, members: &[&str]) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("SADD", &self.channel, sets::build_sadd(key, members), sets::parse_sadd)
            .await
    }

    pub async fn srem(&self, key: &str, members: &[&str]) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("SREM", &self.channel, sets::build_srem(key, members), sets::parse_sadd)
            .await
    }

    pub async fn smembers(&self, key: &str) -> CoreResult<Option<Vec<String>>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("SMEMBERS", &self.channel, sets::build_smembers(key), sets::parse_smembers)
            .await
    }

    pub async fn sismember(&self, key: &str, member: &str) -> CoreResult<Option<bool>> {
        require_non_empty("key", key)?;
        self.policy
            .execute(
                "SISMEMBER",
                &self.channel,
                sets::build_sismember(key, member),
                sets::parse_sismember,
            )
            .await
    }

    pub async fn scard(&self, key: &str) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("SCARD", &self.channel, sets::build_scard(key), |resp| {
                Ok(resp.as_integer())
            })
            .await
    }

    // --- sorted sets --------------------------------------------------------

    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute(
                "ZADD",
                &self.channel,
                sorted_sets::build_zadd(key, score, member),
                sorted_sets::parse_zadd,
            )
            .await
    }

    pub async fn zscore(&self, key: &str, member: &str) -> CoreResult<Option<f64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute(
                "ZSCORE",
                &self.channel,
                sorted_sets::build_zscore(key, member),
                sorted_sets::parse_zscore,
            )
            .await
    }

    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> CoreResult<Option<Vec<String>>> {
        require_non_empty("key", key)?;
        self.policy
            .execute(
                "ZRANGE",
                &self.channel,
                sorted_sets::build_zrange(key, start, stop),
                sorted_sets::parse_zrange,
            )
            .await
    }

    pub async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> CoreResult<Option<Vec<String>>> {
        require_non_empty("key", key)?;
        self.policy
            .execute(
                "ZRANGEBYSCORE",
                &self.channel,
                sorted_sets::build_zrangebyscore(key, min, max),
                sorted_sets::parse_zrange,
            )
            .await
    }

    pub async fn zrem(&self, key: &str, members: &[&str]) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("ZREM", &self.channel, sorted_sets::build_zrem(key, members), |resp| {
                Ok(resp.as_integer())
            })
            .await
    }

    // --- lists --------------------------------------------------------------

    pub async fn lpush(&self, key: &str, values: &[&str]) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("LPUSH", &self.channel, lists::build_lpush(key, values), lists::parse_push)
            .await
    }

    pub async fn rpush(&self, key: &str, values: &[&str]) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("RPUSH", &self.channel, lists::build_rpush(key, values), lists::parse_push)
            .await
    }

    pub async fn lpop(&self, key: &str) -> CoreResult<Option<String>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("LPOP", &self.channel, lists::build_lpop(key), lists::parse_pop)
            .await
    }

    pub async fn rpop(&self, key: &str) -> CoreResult<Option<String>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("RPOP", &self.channel, lists::build_rpop(key), lists::parse_pop)
            .await
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> CoreResult<Option<Vec<String>>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("LRANGE", &self.channel, lists::build_lrange(key, start, stop), lists::parse_lrange)
            .await
    }

    pub async fn llen(&self, key: &str) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("LLEN", &self.channel, lists::build_llen(key), |resp| Ok(resp.as_integer()))
            .await
    }

    // --- hashes ----------------------------------------------------------

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> CoreResult<Option<bool>> {
        require_non_empty("key", key)?;
        require_non_empty("field", field)?;
        self.policy
            .execute("HSET", &self.channel, hashes::build_hset(key, field, value), |resp| {
                Ok(resp.as_integer().map(|_| true))
            })
            .await
    }

    pub async fn hget(&self, key: &str, field: &str) -> CoreResult<Option<String>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("HGET", &self.channel, hashes::build_hget(key, field), hashes::parse_hget)
            .await
    }

    pub async fn hgetall(&self, key: &str) -> CoreResult<Option<HashMap<String, String>>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("HGETALL", &self.channel, hashes::build_hgetall(key), hashes::parse_hgetall)
            .await
    }

    pub async fn hdel(&self, key: &str, fields: &[&str]) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("HDEL", &self.channel, hashes::build_hdel(key, fields), |resp| {
                Ok(resp.as_integer())
            })
            .await
    }

    pub async fn hexists(&self, key: &str, field: &str) -> CoreResult<Option<bool>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("HEXISTS", &self.channel, hashes::build_hexists(key, field), hashes::parse_hexists)
            .await
    }

    // --- geo -------------------------------------------------------------

    pub async fn geoadd(&self, key: &str, longitude: f64, latitude: f64, member: &str) -> CoreResult<Option<i64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("GEOADD", &self.channel, geo::build_geoadd(key, longitude, latitude, member), |resp| {
                Ok(resp.as_integer())
            })
            .await
    }

    pub async fn geopos(&self, key: &str, member: &str) -> CoreResult<Option<(f64, f64)>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("GEOPOS", &self.channel, geo::build_geopos(key, member), geo::parse_geopos)
            .await
    }

    pub async fn geodist(&self, key: &str, member1: &str, member2: &str, unit: &str) -> CoreResult<Option<f64>> {
        require_non_empty("key", key)?;
        self.policy
            .execute("GEODIST", &self.channel, geo::build_geodist(key, member1, member2, unit), geo::parse_geodist)
            .await
    }

    /// Execute an arbitrary pre-built command, bypassing the typed
    /// surface above. Used by [`crate::lock`] for compare-and-delete and
    /// by the cluster client for `CLUSTER SLOTS`/`ASKING`.
    pub async fn execute_raw(
        &self,
        method: &str,
        command: crate::resp::RespValue,
    ) -> CoreResult<crate::resp::RespValue> {
        self.channel.send(command, self.policy.timeout).await.map(|resp| {
            let _ = method;
            resp
        })
    }

    pub(crate) fn channel(&self) -> &SocketChannel {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::RespDecoder;
    use bytes::BytesMut;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn stub_server(script: Vec<&'static [u8]>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut inbuf = BytesMut::new();
            let mut scratch = [0u8; 1024];
            for reply in script {
                loop {
                    if RespDecoder::decode(&mut inbuf).unwrap().is_some() {
                        break;
                    }
                    let n = socket.read(&mut scratch).await.unwrap();
                    inbuf.extend_from_slice(&scratch[..n]);
                }
                socket.write_all(reply).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn get_set_round_trip() {
        let addr = stub_server(vec![b"+OK\r\n", b"$3\r\nbar\r\n"]).await;
        let client = DirectClient::connect(&addr, Duration::from_secs(1), Duration::ZERO, Monitor::new())
            .await
            .unwrap();

        assert_eq!(client.set("foo", "bar").await.unwrap(), Some(true));
        assert_eq!(client.get("foo").await.unwrap(), Some("bar".to_string()));
    }

    #[tokio::test]
    async fn empty_key_is_illegal_argument() {
        let addr = stub_server(vec![]).await;
        let client = DirectClient::connect(&addr, Duration::from_secs(1), Duration::ZERO, Monitor::new())
            .await
            .unwrap();
        assert!(matches!(client.get("").await, Err(CoreError::IllegalArgument(_))));
    }

    #[tokio::test]
    async fn server_error_surfaces_as_redis_server_error() {
        let addr = stub_server(vec![b"-ERR unknown command\r\n"]).await;
        let client = DirectClient::connect(&addr, Duration::from_secs(1), Duration::ZERO, Monitor::new())
            .await
            .unwrap();
        let err = client.get("k").await.unwrap_err();
        assert!(matches!(err, CoreError::RedisServerError(_)));
    }

    #[tokio::test]
    async fn object_codec_round_trips_through_set_get() {
        use crate::codec::{ObjectCodec, ValueCodec};
        use crate::resp::RespEncoder;

        let codec = ObjectCodec::default();
        let encoded = codec.encode("v");
        let get_reply = RespEncoder::encode(&crate::resp::RespValue::bulk(encoded));

        let addr = stub_server(vec![b"+OK\r\n", Box::leak(get_reply.to_vec().into_boxed_slice())]).await;
        let client = DirectClient::connect(&addr, Duration::from_secs(1), Duration::ZERO, Monitor::new())
            .await
            .unwrap()
            .with_codec(codec);

        assert_eq!(client.set("k", "v").await.unwrap(), Some(true));
        assert_eq!(client.get("k").await.unwrap(), Some("v".to_string()));
    }
}
