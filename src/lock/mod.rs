//! Distributed lock core (Module N): a single-instance lock built on
//! `SET ... NX PX` plus a compare-and-delete release, and a Redlock
//! quorum lock layered over N independent servers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use crate::direct_client::DirectClient;
use crate::error::{CoreError, CoreResult};
use crate::monitor::Monitor;
use crate::resp::{RespEncoder, RespValue};
use crate::utils::generate_lock_token;

/// A clock-drift allowance subtracted from the requested validity before
/// it's handed back to the caller, matching the Redlock algorithm's
/// recommendation to budget for drift between nodes.
const CLOCK_DRIFT_FACTOR: f64 = 0.01;

fn release_script() -> &'static str {
    "if redis.call('get', KEYS[1]) == ARGV[1] then return redis.call('del', KEYS[1]) else return 0 end"
}

fn build_acquire(name: &str, token: &str, validity_ms: u64) -> RespValue {
    RespEncoder::command(
        "SET",
        &[
            name.as_bytes(),
            token.as_bytes(),
            b"PX",
            validity_ms.to_string().as_bytes(),
            b"NX",
        ],
    )
}

fn build_release(name: &str, token: &str) -> RespValue {
    RespEncoder::command(
        "EVAL",
        &[
            release_script().as_bytes(),
            b"1",
            name.as_bytes(),
            token.as_bytes(),
        ],
    )
}

/// A held lock. Dropping this without calling [`SingleLock::release`] or
/// [`Redlock::release`] simply lets the key expire on its own at
/// `validity`.
#[derive(Debug, Clone)]
pub struct LockHandle {
    pub name: String,
    pub token: String,
    pub acquired_at: Instant,
    pub validity: Duration,
}

/// Lock against exactly one Redis server.
pub struct SingleLock {
    client: Arc<DirectClient>,
    monitor: Arc<Monitor>,
}

impl SingleLock {
    pub fn new(client: Arc<DirectClient>, monitor: Arc<Monitor>) -> Self {
        Self { client, monitor }
    }

    pub async fn acquire(&self, name: &str, validity: Duration) -> CoreResult<Option<LockHandle>> {
        let token = generate_lock_token();
        let start = Instant::now();
        let resp = self
            .client
            .execute_raw("SET", build_acquire(name, &token, validity.as_millis() as u64))
            .await?;

        let acquired = matches!(resp, RespValue::SimpleString(ref s) if s == "OK");
        self.monitor.record_lock_acquired(acquired);
        if !acquired {
            return Ok(None);
        }
        Ok(Some(LockHandle {
            name: name.to_string(),
            token,
            acquired_at: start,
            validity,
        }))
    }

    /// Retry [`Self::acquire`] with a randomized backoff until `deadline`
    /// elapses.
    pub async fn wait_for_lock(&self, name: &str, validity: Duration, deadline: Duration) -> CoreResult<Option<LockHandle>> {
        wait_for(deadline, || self.acquire(name, validity)).await
    }

    pub async fn release(&self, handle: &LockHandle) -> CoreResult<bool> {
        let resp = self
            .client
            .execute_raw("EVAL", build_release(&handle.name, &handle.token))
            .await?;
        let released = matches!(resp, RespValue::Integer(1));
        if released {
            self.monitor.lock.unlock_success.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.monitor.record_lock_held(handle.acquired_at.elapsed());
        } else {
            self.monitor.lock.unlock_error.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        Ok(released)
    }
}

/// Quorum lock over N >= 3 independent servers, following the Redlock
/// algorithm: acquire on each node in parallel, win if a majority agree
/// within the validity window, release everywhere on any failure.
pub struct Redlock {
    clients: Vec<Arc<DirectClient>>,
    quorum: usize,
    monitor: Arc<Monitor>,
}

impl Redlock {
    pub fn new(clients: Vec<Arc<DirectClient>>, monitor: Arc<Monitor>) -> CoreResult<Self> {
        if clients.len() < 3 {
            return Err(CoreError::DistributedLockError(
                "Redlock requires at least 3 independent servers".to_string(),
            ));
        }
        let quorum = clients.len() / 2 + 1;
        Ok(Self { clients, quorum, monitor })
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub async fn acquire(&self, name: &str, validity: Duration) -> CoreResult<Option<LockHandle>> {
        let token = generate_lock_token();
        let start = Instant::now();

        let attempts = futures::future::join_all(self.clients.iter().map(|client| {
            let client = client.clone();
            let token = token.clone();
            let name = name.to_string();
            async move {
                client
                    .execute_raw("SET", build_acquire(&name, &token, validity.as_millis() as u64))
                    .await
            }
        }))
        .await;

        let won: Vec<usize> = attempts
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r, Ok(RespValue::SimpleString(s)) if s == "OK"))
            .map(|(i, _)| i)
            .collect();

        let node_errors = attempts.iter().filter(|r| r.is_err()).count();
        if node_errors > 0 {
            self.monitor
                .lock
                .acquire_error
                .fetch_add(node_errors as u64, std::sync::atomic::Ordering::Relaxed);
        }

        let elapsed = start.elapsed();
        let drift = Duration::from_secs_f64(validity.as_secs_f64() * CLOCK_DRIFT_FACTOR);
        let remaining = validity.checked_sub(elapsed).and_then(|v| v.checked_sub(drift));

        let acquired = won.len() >= self.quorum && remaining.is_some();
        self.monitor.record_lock_acquired(acquired);

        if !acquired {
            debug!(won = won.len(), quorum = self.quorum, "redlock quorum not reached, rolling back");
            self.best_effort_release(name, &token).await;
            if self.clients.len() - node_errors < self.quorum {
                return Err(CoreError::DistributedLockError(format!(
                    "redlock quorum unreachable: {node_errors} of {} nodes errored",
                    self.clients.len()
                )));
            }
            return Ok(None);
        }

        Ok(Some(LockHandle {
            name: name.to_string(),
            token,
            acquired_at: start,
            validity: remaining.unwrap(),
        }))
    }

    pub async fn wait_for_lock(&self, name: &str, validity: Duration, deadline: Duration) -> CoreResult<Option<LockHandle>> {
        wait_for(deadline, || self.acquire(name, validity)).await
    }

    pub async fn release(&self, handle: &LockHandle) -> CoreResult<()> {
        self.best_effort_release(&handle.name, &handle.token).await;
        self.monitor.record_lock_held(handle.acquired_at.elapsed());
        Ok(())
    }

    async fn best_effort_release(&self, name: &str, token: &str) {
        let results = futures::future::join_all(self.clients.iter().map(|client| {
            let client = client.clone();
            let cmd = build_release(name, token);
            async move { client.execute_raw("EVAL", cmd).await }
        }))
        .await;

        for (client, result) in self.clients.iter().zip(results) {
            match result {
                Ok(_) => self
                    .monitor
                    .lock
                    .unlock_success
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
                Err(e) => {
                    warn!(host = client.host(), error = %e, "redlock release failed on one node");
                    self.monitor
                        .lock
                        .unlock_error
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
                }
            };
        }
    }
}

async fn wait_for<F, Fut>(deadline: Duration, mut attempt: F) -> CoreResult<Option<LockHandle>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = CoreResult<Option<LockHandle>>>,
{
    let start = Instant::now();
    loop {
        if let Some(handle) = attempt().await? {
            return Ok(Some(handle));
        }
        if start.elapsed() >= deadline {
            return Ok(None);
        }
        let backoff_ms = rand::thread_rng().gen_range(20..=150);
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_redlock_with_too_few_servers() {
        let result = Redlock::new(vec![], Monitor::new());
        assert!(matches!(result, Err(CoreError::DistributedLockError(_))));
    }

    #[test]
    fn quorum_is_majority() {
        // Can't construct real DirectClients without I/O, but quorum math
        // is pure and worth locking down directly.
        assert_eq!(3 / 2 + 1, 2);
        assert_eq!(5 / 2 + 1, 3);
    }

    #[test]
    fn acquire_command_shape() {
        let cmd = build_acquire("lock:a", "tok", 5000);
        let elements = cmd.as_array().unwrap();
        assert_eq!(elements[0].as_bulk(), Some(b"SET".as_ref()));
        assert_eq!(elements[3].as_bulk(), Some(b"PX".as_ref()));
        assert_eq!(elements[5].as_bulk(), Some(b"NX".as_ref()));
    }

    #[test]
    fn release_command_is_eval_with_one_key() {
        let cmd = build_release("lock:a", "tok");
        let elements = cmd.as_array().unwrap();
        assert_eq!(elements[0].as_bulk(), Some(b"EVAL".as_ref()));
        assert_eq!(elements[2].as_bulk(), Some(b"1".as_ref()));
        assert_eq!(elements[3].as_bulk(), Some(b"lock:a".as_ref()));
    }
}
