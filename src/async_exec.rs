//! Bounded async executor (Module K).
//!
//! Tokio has no built-in "bounded thread pool with rendezvous admission",
//! so this models the spec's 200-worker pool as ordinary `tokio::spawn`
//! tasks gated by a [`Semaphore`](tokio::sync::Semaphore): a permit that
//! can't be acquired immediately means the pool is busy, and the caller
//! is rejected rather than queued.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{CoreError, CoreResult};

const DEFAULT_MAX_WORKERS: usize = 200;

pub struct BoundedExecutor {
    semaphore: Arc<Semaphore>,
    rejected: Arc<AtomicU64>,
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

impl BoundedExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Spawn `task` if a worker slot is immediately available; otherwise
    /// fail fast with `IllegalState` ("thread pool is too busy") rather
    /// than queuing the caller.
    pub async fn try_spawn<F, T>(&self, task: F) -> CoreResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(CoreError::illegal_state("thread pool is too busy"));
            }
        };

        let handle = tokio::spawn(async move {
            let result = task.await;
            drop(permit);
            result
        });

        handle
            .await
            .map_err(|e| CoreError::unexpected(format!("executor task panicked: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_task_to_completion() {
        let executor = BoundedExecutor::new(4);
        let result = executor.try_spawn(async { 1 + 1 }).await.unwrap();
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn rejects_when_all_workers_busy() {
        let executor = Arc::new(BoundedExecutor::new(1));
        let e1 = executor.clone();
        let blocker = tokio::spawn(async move {
            e1.try_spawn(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let rejected = executor.try_spawn(async { 42 }).await;
        assert!(matches!(rejected, Err(CoreError::IllegalState(_))));
        assert_eq!(executor.rejected_count(), 1);

        blocker.await.unwrap().unwrap();
    }
}
