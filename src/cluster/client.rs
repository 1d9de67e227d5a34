//! Cluster client (Module J): single-key routing with `MOVED`/`ASK`
//! retry-once semantics, and multi-key scatter/gather fan-out.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::async_exec::BoundedExecutor;
use crate::cluster::redirect::{self, Redirect};
use crate::cluster::router::{self, NodeRouter};
use crate::cluster::slot::key_slot;
use crate::direct_client::DirectClient;
use crate::error::{CoreError, CoreResult};
use crate::monitor::Monitor;

/// Used when no explicit reload period is configured (see
/// [`crate::config::TopologyConfig::Cluster`]).
pub const DEFAULT_RELOAD_PERIOD: Duration = Duration::from_secs(30);

/// Tolerant result of a scatter/gather call across multiple slots: callers
/// get back whatever succeeded, plus which keys failed and why.
#[derive(Debug, Default)]
pub struct ScatterGatherResult<T> {
    pub values: HashMap<String, T>,
    pub errors: Vec<(String, CoreError)>,
}

pub struct ClusterClient {
    router: Arc<RwLock<Arc<NodeRouter>>>,
    seeds: Arc<RwLock<Vec<String>>>,
    executor: BoundedExecutor,
    timeout: Duration,
    ping_period: Duration,
    reload_period: Duration,
    monitor: Arc<Monitor>,
    reload_in_flight: Arc<AtomicBool>,
}

/// Kick off a reload unless one is already running, clearing the flag when
/// it finishes regardless of outcome. Shared by the MOVED-triggered path
/// and the periodic timer so the two never race each other into a
/// duplicate `CLUSTER SLOTS` round trip.
fn trigger_reload(
    reload_in_flight: Arc<AtomicBool>,
    router: Arc<RwLock<Arc<NodeRouter>>>,
    seeds: Arc<RwLock<Vec<String>>>,
    timeout: Duration,
    ping_period: Duration,
    monitor: Arc<Monitor>,
) {
    if reload_in_flight.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
        return;
    }
    tokio::spawn(async move {
        let handle = router::spawn_reload_task(router, seeds, timeout, ping_period, monitor);
        if let Err(e) = handle.await {
            warn!(error = %e, "cluster reload task panicked");
        }
        reload_in_flight.store(false, Ordering::Release);
    });
}

impl ClusterClient {
    pub async fn connect(
        seeds: Vec<String>,
        timeout: Duration,
        ping_period: Duration,
        monitor: Arc<Monitor>,
    ) -> CoreResult<Self> {
        Self::connect_with_reload_period(seeds, timeout, ping_period, DEFAULT_RELOAD_PERIOD, monitor).await
    }

    pub async fn connect_with_reload_period(
        seeds: Vec<String>,
        timeout: Duration,
        ping_period: Duration,
        reload_period: Duration,
        monitor: Arc<Monitor>,
    ) -> CoreResult<Self> {
        let initial = NodeRouter::bootstrap(&seeds, timeout, ping_period, monitor.clone()).await?;
        let client = Self {
            router: Arc::new(RwLock::new(Arc::new(initial))),
            seeds: Arc::new(RwLock::new(seeds)),
            executor: BoundedExecutor::default(),
            timeout,
            ping_period,
            reload_period,
            monitor,
            reload_in_flight: Arc::new(AtomicBool::new(false)),
        };
        client.spawn_periodic_reload();
        Ok(client)
    }

    fn spawn_periodic_reload(&self) {
        let router_slot = self.router.clone();
        let seeds = self.seeds.clone();
        let timeout = self.timeout;
        let ping_period = self.ping_period;
        let reload_period = self.reload_period;
        let monitor = self.monitor.clone();
        let reload_in_flight = self.reload_in_flight.clone();

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(reload_period).await;
                trigger_reload(
                    reload_in_flight.clone(),
                    router_slot.clone(),
                    seeds.clone(),
                    timeout,
                    ping_period,
                    monitor.clone(),
                );
            }
        });
    }

    /// Trigger an out-of-cycle topology reload, e.g. in reaction to a
    /// `MOVED` redirect.
    fn trigger_reload(&self) {
        trigger_reload(
            self.reload_in_flight.clone(),
            self.router.clone(),
            self.seeds.clone(),
            self.timeout,
            self.ping_period,
            self.monitor.clone(),
        );
    }

    async fn current_router(&self) -> Arc<NodeRouter> {
        self.router.read().await.clone()
    }

    /// Resolve, call, and retry exactly once on a `MOVED`/`ASK` redirect.
    async fn routed<F, Fut, T>(&self, slot: u16, allow_slave: bool, call: F) -> CoreResult<Option<T>>
    where
        F: Fn(Arc<DirectClient>) -> Fut,
        Fut: Future<Output = CoreResult<Option<T>>>,
    {
        let router = self.current_router().await;
        let client = router.client_for_slot(slot, allow_slave).await?;
        let first = call(client).await;

        let Err(err) = &first else {
            return first;
        };
        let Some(text) = err.as_redirection() else {
            return first;
        };
        let Some(redirect) = redirect::parse_redirect_bytes(text.as_bytes()) else {
            return first;
        };

        match redirect {
            Redirect::Moved { slot, address } => {
                debug!(slot, address = %address, "following MOVED redirect");
                router.record_moved(slot, &address).await;
                self.trigger_reload();
                let target = router.client_for_host(&address).await?;
                call(target).await
            }
            Redirect::Ask { address, .. } => {
                debug!(address = %address, "following ASK redirect");
                let target = router.client_for_host(&address).await?;
                target.execute_raw("ASKING", redirect::asking_command()).await?;
                call(target).await
            }
        }
    }

    pub async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let slot = key_slot(key);
        let key = key.to_string();
        self.routed(slot, true, move |c| {
            let key = key.clone();
            async move { c.get(&key).await }
        })
        .await
    }

    pub async fn set(&self, key: &str, value: &str) -> CoreResult<Option<bool>> {
        let slot = key_slot(key);
        let key = key.to_string();
        let value = value.to_string();
        self.routed(slot, false, move |c| {
            let (key, value) = (key.clone(), value.clone());
            async move { c.set(&key, &value).await }
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> CoreResult<Option<i64>> {
        let slot = key_slot(key);
        let key = key.to_string();
        self.routed(slot, false, move |c| {
            let key = key.clone();
            async move { c.delete(&[key.as_str()]).await }
        })
        .await
    }

    /// Fan a batch of independent keys out across however many slots/nodes
    /// they land on, run each slot's keys concurrently through the bounded
    /// executor, and tolerate per-key failures rather than failing the
    /// whole call.
    pub async fn mget(&self, keys: &[&str]) -> ScatterGatherResult<Option<String>> {
        let mut by_slot: HashMap<u16, Vec<String>> = HashMap::new();
        for key in keys {
            by_slot.entry(key_slot(key)).or_default().push(key.to_string());
        }

        let mut handles = Vec::with_capacity(by_slot.len());
        for (slot, group) in by_slot {
            let router = self.current_router().await;
            handles.push(self.executor.try_spawn(async move {
                let mut out = Vec::with_capacity(group.len());
                let client = router.client_for_slot(slot, true).await;
                match client {
                    Ok(client) => {
                        for key in group {
                            let result = client.get(&key).await;
                            out.push((key, result));
                        }
                    }
                    Err(e) => {
                        for key in group {
                            out.push((key, Err(CoreError::illegal_state(format!("no client for slot: {e}")))));
                        }
                    }
                }
                out
            }));
        }

        let mut result = ScatterGatherResult::default();
        for outcome in futures::future::join_all(handles).await {
            match outcome {
                Ok(entries) => {
                    for (key, outcome) in entries {
                        match outcome {
                            Ok(value) => {
                                result.values.insert(key, value);
                            }
                            Err(e) => {
                                self.monitor.cluster.multi_get_error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                                result.errors.push((key, e));
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "mget slot group rejected by bounded executor");
                }
            }
        }
        result
    }

    pub async fn node_count(&self) -> usize {
        self.current_router().await.node_count()
    }

    pub async fn close(&self) -> CoreResult<()> {
        self.current_router().await.close_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::{RespDecoder, RespValue};
    use bytes::{Bytes, BytesMut};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_command(socket: &mut TcpStream, inbuf: &mut BytesMut) {
        let mut scratch = [0u8; 1024];
        loop {
            if RespDecoder::decode(inbuf).unwrap().is_some() {
                return;
            }
            let n = socket.read(&mut scratch).await.unwrap();
            inbuf.extend_from_slice(&scratch[..n]);
        }
    }

    fn slots_reply(addr: std::net::SocketAddr) -> Vec<u8> {
        let entry = RespValue::Array(Some(vec![
            RespValue::Integer(0),
            RespValue::Integer(16383),
            RespValue::Array(Some(vec![
                RespValue::bulk(Bytes::from(addr.ip().to_string())),
                RespValue::Integer(addr.port() as i64),
            ])),
        ]));
        crate::resp::RespEncoder::encode(&RespValue::Array(Some(vec![entry]))).to_vec()
    }

    #[tokio::test]
    async fn follows_moved_redirect_to_new_node() {
        let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr_b = listener_b.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener_b.accept().await.unwrap();
            let mut inbuf = BytesMut::new();
            read_command(&mut socket, &mut inbuf).await;
            socket.write_all(b"$5\r\nhello\r\n").await.unwrap();
        });

        let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr_a = listener_a.local_addr().unwrap();
        tokio::spawn(async move {
            // Bootstrap connection: answers CLUSTER SLOTS.
            let (mut socket, _) = listener_a.accept().await.unwrap();
            let mut inbuf = BytesMut::new();
            read_command(&mut socket, &mut inbuf).await;
            socket.write_all(&slots_reply(addr_a)).await.unwrap();
            drop(socket);

            // Client-list connection: the slot owner, replies MOVED once.
            let (mut socket, _) = listener_a.accept().await.unwrap();
            let mut inbuf = BytesMut::new();
            read_command(&mut socket, &mut inbuf).await;
            let moved = format!("-MOVED 0 {addr_b}\r\n");
            socket.write_all(moved.as_bytes()).await.unwrap();
        });

        let client = ClusterClient::connect(
            vec![addr_a.to_string()],
            Duration::from_secs(2),
            Duration::ZERO,
            Monitor::new(),
        )
        .await
        .unwrap();

        let value = client.get("k").await.unwrap();
        assert_eq!(value, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn mget_groups_keys_by_slot() {
        let mut by_slot: HashMap<u16, Vec<String>> = HashMap::new();
        for key in ["a", "b", "{tag}x", "{tag}y"] {
            by_slot.entry(key_slot(key)).or_default().push(key.to_string());
        }
        // The two tagged keys must land in the same group.
        let tagged_slot = key_slot("{tag}x");
        assert_eq!(by_slot.get(&tagged_slot).unwrap().len(), 2);
    }
}
