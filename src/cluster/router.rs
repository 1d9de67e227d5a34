//! Cluster node router (Module I): bootstrap from `CLUSTER SLOTS`, routing
//! by slot with MOVED-override tracking, and background topology reload.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::channel::SocketChannel;
use crate::client_list::ClientList;
use crate::direct_client::DirectClient;
use crate::error::{CoreError, CoreResult};
use crate::monitor::Monitor;
use crate::resp::{RespEncoder, RespValue};

use super::slot::SLOT_COUNT;

/// One contiguous slot range and the nodes that own it.
pub struct ClusterNode {
    pub start_slot: u16,
    pub end_slot: u16,
    pub master_host: String,
    pub slave_hosts: Vec<String>,
    rr: AtomicUsize,
}

impl ClusterNode {
    fn covers(&self, slot: u16) -> bool {
        slot >= self.start_slot && slot <= self.end_slot
    }

    fn next_slave(&self) -> Option<usize> {
        if self.slave_hosts.is_empty() {
            return None;
        }
        Some(self.rr.fetch_add(1, Ordering::Relaxed) % self.slave_hosts.len())
    }
}

/// Routes commands to the cluster node owning a given slot, tracking
/// `MOVED` overrides and lazily-created clients for redirection targets
/// that aren't (yet) known cluster members.
pub struct NodeRouter {
    nodes: Vec<ClusterNode>,
    clients: ClientList,
    host_index: HashMap<String, usize>,
    moved_overrides: RwLock<HashMap<u16, String>>,
    temp_clients: RwLock<HashMap<String, Arc<DirectClient>>>,
    timeout: Duration,
    ping_period: Duration,
    monitor: Arc<Monitor>,
}

impl NodeRouter {
    /// Connect to each seed in order until `CLUSTER SLOTS` succeeds and
    /// covers the full slot space.
    pub async fn bootstrap(
        seeds: &[String],
        timeout: Duration,
        ping_period: Duration,
        monitor: Arc<Monitor>,
    ) -> CoreResult<Self> {
        let mut last_err = None;
        for seed in seeds {
            match Self::load_from_seed(seed, timeout).await {
                Ok(nodes) => return Self::from_nodes(nodes, timeout, ping_period, monitor).await,
                Err(e) => {
                    warn!(seed, error = %e, "cluster bootstrap seed failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::illegal_state("no seed hosts provided")))
    }

    async fn load_from_seed(seed: &str, timeout: Duration) -> CoreResult<Vec<ClusterNode>> {
        let channel = SocketChannel::connect(seed, Duration::ZERO).await?;
        let cmd = RespEncoder::command("CLUSTER", &[b"SLOTS".as_ref()]);
        let resp = channel.send(cmd, timeout).await?;
        channel.close().await;
        parse_cluster_slots(&resp)
    }

    async fn from_nodes(
        mut nodes: Vec<ClusterNode>,
        timeout: Duration,
        ping_period: Duration,
        monitor: Arc<Monitor>,
    ) -> CoreResult<Self> {
        nodes.sort_by_key(|n| n.start_slot);
        verify_coverage(&nodes)?;

        let mut hosts = Vec::new();
        let mut host_index = HashMap::new();
        for node in &nodes {
            if !host_index.contains_key(&node.master_host) {
                host_index.insert(node.master_host.clone(), hosts.len());
                hosts.push(node.master_host.clone());
            }
            for slave in &node.slave_hosts {
                if !host_index.contains_key(slave) {
                    host_index.insert(slave.clone(), hosts.len());
                    hosts.push(slave.clone());
                }
            }
        }

        let clients = ClientList::connect(hosts, timeout, ping_period, monitor.clone()).await;

        Ok(Self {
            nodes,
            clients,
            host_index,
            moved_overrides: RwLock::new(HashMap::new()),
            temp_clients: RwLock::new(HashMap::new()),
            timeout,
            ping_period,
            monitor,
        })
    }

    fn node_for_slot(&self, slot: u16) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.covers(slot))
    }

    /// Resolve the client that should serve `slot`, honoring any MOVED
    /// override and optionally preferring a slave for reads.
    pub async fn client_for_slot(&self, slot: u16, allow_slave: bool) -> CoreResult<Arc<DirectClient>> {
        if let Some(host) = self.moved_overrides.read().await.get(&slot).cloned() {
            return self.client_for_host(&host).await;
        }

        let node = self
            .node_for_slot(slot)
            .ok_or_else(|| CoreError::illegal_state(format!("no node covers slot {slot}")))?;

        if allow_slave {
            if let Some(offset) = node.next_slave() {
                for i in 0..node.slave_hosts.len() {
                    let slave = &node.slave_hosts[(offset + i) % node.slave_hosts.len()];
                    if let Ok(client) = self.client_for_host(slave).await {
                        if client.is_available() {
                            return Ok(client);
                        }
                        // Connected at bootstrap but died since; hand the
                        // slot to the rescue task rather than retrying it
                        // every call.
                        if let Some(&index) = self.host_index.get(slave) {
                            self.clients.mark_dead(index).await;
                        }
                    }
                }
            }
        }

        self.client_for_host(&node.master_host).await
    }

    /// Resolve a client by host, whether it's a known cluster member or a
    /// redirection target that needs a temporary connection.
    pub async fn client_for_host(&self, host: &str) -> CoreResult<Arc<DirectClient>> {
        if let Some(&index) = self.host_index.get(host) {
            if let Some(client) = self.clients.get(index).await {
                return Ok(client);
            }
        }

        if let Some(client) = self.temp_clients.read().await.get(host) {
            return Ok(client.clone());
        }

        // Double-checked creation: only one concurrent caller wins; the
        // losers close the client they built.
        let candidate = DirectClient::connect(host, self.timeout, self.ping_period, self.monitor.clone()).await?;
        let mut guard = self.temp_clients.write().await;
        if let Some(existing) = guard.get(host) {
            candidate.close().await;
            return Ok(existing.clone());
        }
        let candidate = Arc::new(candidate);
        guard.insert(host.to_string(), candidate.clone());
        Ok(candidate)
    }

    /// Record that `slot` now belongs to `host`, learned from a `MOVED`
    /// reply.
    pub async fn record_moved(&self, slot: u16, host: &str) {
        self.moved_overrides.write().await.insert(slot, host.to_string());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub async fn close_all(&self) -> CoreResult<()> {
        self.clients.close_all().await?;
        for client in self.temp_clients.read().await.values() {
            client.close().await;
        }
        Ok(())
    }
}

fn verify_coverage(nodes: &[ClusterNode]) -> CoreResult<()> {
    let mut cursor: u32 = 0;
    for node in nodes {
        if node.start_slot as u32 != cursor {
            return Err(CoreError::illegal_state(format!(
                "slot coverage gap before {}",
                node.start_slot
            )));
        }
        cursor = node.end_slot as u32 + 1;
    }
    if cursor != SLOT_COUNT as u32 {
        return Err(CoreError::illegal_state("slot coverage does not reach 16384"));
    }
    Ok(())
}

fn parse_cluster_slots(resp: &RespValue) -> CoreResult<Vec<ClusterNode>> {
    let entries = resp
        .as_array()
        .ok_or_else(|| CoreError::unexpected("CLUSTER SLOTS did not return an array"))?;

    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        let fields = entry
            .as_array()
            .ok_or_else(|| CoreError::unexpected("CLUSTER SLOTS entry was not an array"))?;
        if fields.len() < 3 {
            return Err(CoreError::unexpected("CLUSTER SLOTS entry too short"));
        }

        let start_slot = fields[0]
            .as_integer()
            .ok_or_else(|| CoreError::unexpected("expected integer start slot"))? as u16;
        let end_slot = fields[1]
            .as_integer()
            .ok_or_else(|| CoreError::unexpected("expected integer end slot"))? as u16;
        let master_host = parse_host_entry(&fields[2])?;

        let mut slave_hosts = Vec::new();
        for slave_entry in &fields[3..] {
            slave_hosts.push(parse_host_entry(slave_entry)?);
        }

        nodes.push(ClusterNode {
            start_slot,
            end_slot,
            master_host,
            slave_hosts,
            rr: AtomicUsize::new(0),
        });
    }
    Ok(nodes)
}

fn parse_host_entry(entry: &RespValue) -> CoreResult<String> {
    let fields = entry
        .as_array()
        .ok_or_else(|| CoreError::unexpected("expected [host, port, ...] entry"))?;
    if fields.len() < 2 {
        return Err(CoreError::unexpected("host entry missing port"));
    }
    let host = std::str::from_utf8(
        fields[0]
            .as_bulk()
            .ok_or_else(|| CoreError::unexpected("host was not a bulk string"))?,
    )
    .map_err(|e| CoreError::unexpected(format!("invalid UTF-8 host: {e}")))?;
    let port = fields[1]
        .as_integer()
        .ok_or_else(|| CoreError::unexpected("port was not an integer"))?;
    Ok(format!("{host}:{port}"))
}

/// Spawn the background reload loop: wait a random 2-5s, rebuild the
/// router from the live host set, then swap it in atomically and close
/// the old one after a grace period. Retries every second on failure.
pub fn spawn_reload_task(
    current: Arc<RwLock<Arc<NodeRouter>>>,
    seeds_snapshot: Arc<RwLock<Vec<String>>>,
    timeout: Duration,
    ping_period: Duration,
    monitor: Arc<Monitor>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let initial_delay = Duration::from_millis(rand::thread_rng().gen_range(2000..=5000));
        tokio::time::sleep(initial_delay).await;

        loop {
            let seeds = seeds_snapshot.read().await.clone();
            match NodeRouter::bootstrap(&seeds, timeout, ping_period, monitor.clone()).await {
                Ok(fresh) => {
                    let fresh = Arc::new(fresh);
                    let old = {
                        let mut guard = current.write().await;
                        std::mem::replace(&mut *guard, fresh)
                    };
                    monitor.cluster.reload_count.fetch_add(1, Ordering::Relaxed);
                    info!("cluster topology reloaded");
                    let grace = timeout + Duration::from_secs(3);
                    tokio::spawn(async move {
                        tokio::time::sleep(grace).await;
                        let _ = old.close_all().await;
                        debug!("retired stale router closed");
                    });
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "cluster reload failed, retrying in 1s");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    })
}
