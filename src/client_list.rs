//! Client list with rescue task (Module E): a fixed-size slot array of
//! [`DirectClient`]s over the same host set, with a background task that
//! repairs any slot whose connection dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::IteratorRandom;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::direct_client::DirectClient;
use crate::error::CoreResult;
use crate::monitor::Monitor;

const RESCUE_INTERVAL: Duration = Duration::from_millis(500);

/// Ordered client slots, one per configured host. A `None` slot means that
/// host is currently unreachable; the rescue task keeps retrying it.
pub struct ClientList {
    hosts: Vec<String>,
    slots: Arc<RwLock<Vec<Option<Arc<DirectClient>>>>>,
    timeout: Duration,
    ping_period: Duration,
    monitor: Arc<Monitor>,
    rescue_running: Arc<AtomicBool>,
}

impl ClientList {
    pub async fn connect(
        hosts: Vec<String>,
        timeout: Duration,
        ping_period: Duration,
        monitor: Arc<Monitor>,
    ) -> Self {
        let mut slots = Vec::with_capacity(hosts.len());
        for host in &hosts {
            let client = DirectClient::connect(host, timeout, ping_period, monitor.clone())
                .await
                .ok()
                .map(Arc::new);
            slots.push(client);
        }

        let list = Self {
            hosts,
            slots: Arc::new(RwLock::new(slots)),
            timeout,
            ping_period,
            monitor,
            rescue_running: Arc::new(AtomicBool::new(false)),
        };
        list.ensure_rescue_task_if_needed().await;
        list
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn host(&self, index: usize) -> Option<&str> {
        self.hosts.get(index).map(|s| s.as_str())
    }

    pub async fn get(&self, index: usize) -> Option<Arc<DirectClient>> {
        let guard = self.slots.read().await;
        guard.get(index).and_then(|s| s.clone())
    }

    /// Pick a random available client, optionally excluding some indices
    /// (e.g. the one that just failed).
    pub async fn get_available(&self, exclude: &[usize]) -> Option<Arc<DirectClient>> {
        let guard = self.slots.read().await;
        guard
            .iter()
            .enumerate()
            .filter(|(i, slot)| !exclude.contains(i) && slot.as_ref().is_some_and(|c| c.is_available()))
            .filter_map(|(_, slot)| slot.clone())
            .choose(&mut rand::thread_rng())
    }

    /// Mark a slot dead (its channel closed under it) and make sure the
    /// rescue task is running.
    pub async fn mark_dead(&self, index: usize) {
        {
            let mut guard = self.slots.write().await;
            if let Some(slot) = guard.get_mut(index) {
                *slot = None;
            }
        }
        self.monitor
            .cluster
            .unavailable_client_count
            .fetch_add(1, Ordering::Relaxed);
        self.ensure_rescue_task_if_needed().await;
    }

    async fn ensure_rescue_task_if_needed(&self) {
        let any_dead = {
            let guard = self.slots.read().await;
            guard.iter().any(|s| s.is_none())
        };
        if !any_dead {
            return;
        }
        if self
            .rescue_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return; // Already running — single-flight.
        }

        let hosts = self.hosts.clone();
        let slots = self.slots.clone();
        let timeout = self.timeout;
        let ping_period = self.ping_period;
        let monitor = self.monitor.clone();
        let running = self.rescue_running.clone();

        tokio::spawn(async move {
            debug!("rescue task starting");
            loop {
                tokio::time::sleep(RESCUE_INTERVAL).await;
                let dead_indices: Vec<usize> = {
                    let guard = slots.read().await;
                    guard
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.is_none())
                        .map(|(i, _)| i)
                        .collect()
                };
                if dead_indices.is_empty() {
                    break;
                }

                for index in dead_indices {
                    let host = &hosts[index];
                    match DirectClient::connect(host, timeout, ping_period, monitor.clone()).await {
                        Ok(client) => {
                            let mut guard = slots.write().await;
                            guard[index] = Some(Arc::new(client));
                            debug!(host, "rescue task reconnected slot");
                            monitor.cluster.unavailable_client_count.fetch_sub(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!(host, error = %e, "rescue task reconnect attempt failed");
                        }
                    }
                }
            }
            running.store(false, Ordering::Release);
            debug!("rescue task exiting, all slots healthy");
        });
    }

    pub async fn close_all(&self) -> CoreResult<()> {
        let guard = self.slots.read().await;
        for slot in guard.iter().flatten() {
            slot.close().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_list_has_no_rescue_work() {
        let list = ClientList::connect(vec![], Duration::from_secs(1), Duration::ZERO, Monitor::new()).await;
        assert!(list.is_empty());
        assert!(!list.rescue_running.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn unreachable_host_leaves_slot_empty_and_starts_rescue() {
        let list = ClientList::connect(
            vec!["127.0.0.1:1".to_string()], // port 1 should refuse immediately
            Duration::from_millis(100),
            Duration::ZERO,
            Monitor::new(),
        )
        .await;
        assert!(list.get(0).await.is_none());
        // The rescue task is started because the slot could not connect.
        assert!(list.rescue_running.load(Ordering::Relaxed));
    }
}
