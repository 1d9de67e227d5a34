//! Master/slave read-write split client (Module G).
//!
//! Index 0 of the underlying [`ClientList`] is always the master; indices
//! `1..N` are slaves, selected round-robin for reads with a fall back to
//! the master when the chosen slave is unavailable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::client_list::ClientList;
use crate::direct_client::DirectClient;
use crate::error::{CoreError, CoreResult};
use crate::monitor::Monitor;

pub struct MasterSlaveClient {
    clients: ClientList,
    round_robin: AtomicUsize,
}

impl MasterSlaveClient {
    /// `hosts[0]` is the master; the rest are slaves.
    pub async fn connect(
        hosts: Vec<String>,
        timeout: Duration,
        ping_period: Duration,
        monitor: Arc<Monitor>,
    ) -> CoreResult<Self> {
        if hosts.is_empty() {
            return Err(CoreError::illegal_argument("master/slave client needs at least a master host"));
        }
        let clients = ClientList::connect(hosts, timeout, ping_period, monitor).await;
        Ok(Self { clients, round_robin: AtomicUsize::new(0) })
    }

    fn slave_count(&self) -> usize {
        self.clients.len().saturating_sub(1)
    }

    /// Pick a client for a write: always the master.
    pub async fn master(&self) -> CoreResult<Arc<DirectClient>> {
        self.clients
            .get(0)
            .await
            .ok_or_else(|| CoreError::illegal_state("master is unavailable"))
    }

    /// Pick a client for a read: round-robin over slaves, falling back to
    /// the master if no slave is reachable (or there are none).
    pub async fn read_target(&self) -> CoreResult<Arc<DirectClient>> {
        let slave_count = self.slave_count();
        if slave_count == 0 {
            return self.master().await;
        }

        let start = self.round_robin.fetch_add(1, Ordering::Relaxed) % slave_count;
        for offset in 0..slave_count {
            let slave_index = 1 + (start + offset) % slave_count;
            if let Some(client) = self.clients.get(slave_index).await {
                if client.is_available() {
                    return Ok(client);
                }
                // Connected once but died since; hand the slot to the
                // rescue task instead of skipping it forever.
                self.clients.mark_dead(slave_index).await;
            }
        }
        self.master().await
    }

    pub async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        self.read_target().await?.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> CoreResult<Option<bool>> {
        self.master().await?.set(key, value).await
    }

    pub async fn delete(&self, keys: &[&str]) -> CoreResult<Option<i64>> {
        self.master().await?.delete(keys).await
    }

    pub async fn close_all(&self) -> CoreResult<()> {
        self.clients.close_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_slaves_reads_from_master_host() {
        // Both ports are unreachable, but the routing logic itself (no
        // slaves -> fall back to master) doesn't require a live server.
        let client = MasterSlaveClient::connect(
            vec!["127.0.0.1:1".to_string()],
            Duration::from_millis(50),
            Duration::ZERO,
            Monitor::new(),
        )
        .await
        .unwrap();
        assert_eq!(client.slave_count(), 0);
    }

    #[tokio::test]
    async fn requires_at_least_one_host() {
        let result = MasterSlaveClient::connect(vec![], Duration::from_secs(1), Duration::ZERO, Monitor::new()).await;
        assert!(result.is_err());
    }
}
