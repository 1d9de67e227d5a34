//! Per-host and per-subsystem counters (Module O).
//!
//! The library only accumulates counters; exporting them (Prometheus,
//! logging, whatever) is the embedding application's job, matching the
//! teacher's `health` module stance of reporting status without owning
//! the export path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Window over which [`HostCounters`] rolls up a transactions-per-second
/// sample before folding it into the running peak.
const TPS_WINDOW_MILLIS: u64 = 1000;

/// Snapshot of one host's counters, suitable for an observer to diff
/// against a previous sample.
#[derive(Debug, Clone, Default)]
pub struct HostStats {
    pub execution_count: u64,
    pub error_count: u64,
    pub error_counts: HashMap<String, u64>,
    pub slow_count: u64,
    pub total_latency_micros: u64,
    pub max_latency_micros: u64,
    pub peak_tps: u64,
}

#[derive(Default)]
struct HostCounters {
    execution_count: AtomicU64,
    error_count: AtomicU64,
    error_counts: Mutex<HashMap<&'static str, u64>>,
    slow_count: AtomicU64,
    total_latency_micros: AtomicU64,
    max_latency_micros: AtomicU64,
    window_start_millis: AtomicU64,
    window_count: AtomicU64,
    peak_tps: AtomicU64,
}

impl HostCounters {
    /// Folds one execution into the current 1s window, closing and scoring
    /// the window (against the running peak) once it elapses.
    fn record_tps_tick(&self) {
        let now = now_millis();
        let window_start = self.window_start_millis.load(Ordering::Relaxed);
        if window_start == 0 {
            self.window_start_millis.store(now, Ordering::Relaxed);
            self.window_count.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let elapsed = now.saturating_sub(window_start);
        if elapsed < TPS_WINDOW_MILLIS {
            self.window_count.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let count = self.window_count.swap(0, Ordering::Relaxed) + 1;
        let tps = count.saturating_mul(1000) / elapsed.max(1);
        self.peak_tps.fetch_max(tps, Ordering::Relaxed);
        self.window_start_millis.store(now, Ordering::Relaxed);
    }

    fn snapshot(&self) -> HostStats {
        HostStats {
            execution_count: self.execution_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            error_counts: self
                .error_counts
                .lock()
                .unwrap()
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            slow_count: self.slow_count.load(Ordering::Relaxed),
            total_latency_micros: self.total_latency_micros.load(Ordering::Relaxed),
            max_latency_micros: self.max_latency_micros.load(Ordering::Relaxed),
            peak_tps: self.peak_tps.load(Ordering::Relaxed),
        }
    }
}

/// Cluster-level counters that don't belong to any single host.
#[derive(Default)]
pub struct ClusterCounters {
    pub unavailable_client_count: AtomicI64,
    pub multi_get_error_count: AtomicU64,
    pub reload_count: AtomicU64,
}

/// Distributed-lock counters (Module N).
#[derive(Default)]
pub struct LockCounters {
    pub acquire_success: AtomicU64,
    pub acquire_fail: AtomicU64,
    pub acquire_error: AtomicU64,
    pub unlock_success: AtomicU64,
    pub unlock_error: AtomicU64,
    pub total_holding_micros: AtomicU64,
    pub max_holding_micros: AtomicU64,
}

/// Central observation sink the rest of the crate writes into.
#[derive(Default)]
pub struct Monitor {
    hosts: RwLock<HashMap<String, Arc<HostCounters>>>,
    pub cluster: ClusterCounters,
    pub lock: LockCounters,
}

impl Monitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn counters_for(&self, host: &str) -> Arc<HostCounters> {
        if let Some(c) = self.hosts.read().await.get(host) {
            return c.clone();
        }
        let mut guard = self.hosts.write().await;
        guard
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostCounters::default()))
            .clone()
    }

    /// `error_kind` is [`crate::error::CoreError::kind`] when the call
    /// failed, `None` on success.
    pub async fn record_execution(
        &self,
        host: &str,
        elapsed: std::time::Duration,
        error_kind: Option<&'static str>,
        slow_threshold: std::time::Duration,
    ) {
        let c = self.counters_for(host).await;
        c.execution_count.fetch_add(1, Ordering::Relaxed);
        c.record_tps_tick();
        if let Some(kind) = error_kind {
            c.error_count.fetch_add(1, Ordering::Relaxed);
            *c.error_counts.lock().unwrap().entry(kind).or_insert(0) += 1;
        }
        let micros = elapsed.as_micros() as u64;
        c.total_latency_micros.fetch_add(micros, Ordering::Relaxed);
        c.max_latency_micros.fetch_max(micros, Ordering::Relaxed);
        if elapsed > slow_threshold {
            c.slow_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn snapshot(&self, host: &str) -> HostStats {
        self.counters_for(host).await.snapshot()
    }

    pub async fn hosts_snapshot(&self) -> HashMap<String, HostStats> {
        let guard = self.hosts.read().await;
        guard.iter().map(|(k, v)| (k.clone(), v.snapshot())).collect()
    }

    pub fn record_lock_acquired(&self, success: bool) {
        if success {
            self.lock.acquire_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lock.acquire_fail.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_lock_held(&self, held_for: std::time::Duration) {
        let micros = held_for.as_micros() as u64;
        self.lock.total_holding_micros.fetch_add(micros, Ordering::Relaxed);
        self.lock.max_holding_micros.fetch_max(micros, Ordering::Relaxed);
    }
}
