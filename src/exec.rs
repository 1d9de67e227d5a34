//! Command execution wrapper (Module C): validation, timing, error
//! classification, and monitor/tracing instrumentation around every call
//! a client makes over a [`SocketChannel`](crate::channel::SocketChannel).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::channel::SocketChannel;
use crate::error::{CoreError, CoreResult};
use crate::monitor::Monitor;
use crate::resp::RespValue;

/// Shared execution policy for one client: timeouts, slow-log threshold,
/// and where to report observations.
#[derive(Clone)]
pub struct ExecPolicy {
    pub timeout: Duration,
    pub slow_threshold: Duration,
    pub monitor: Arc<Monitor>,
}

impl ExecPolicy {
    pub fn new(timeout: Duration, slow_threshold: Duration, monitor: Arc<Monitor>) -> Self {
        Self { timeout, slow_threshold, monitor }
    }

    /// Run `command` on `channel`, applying `parse` to a successful RESP
    /// reply. `parse` returning `Ok(None)` models a semantic "not found"
    /// and is tracked separately from hard errors.
    pub async fn execute<T>(
        &self,
        method: &str,
        channel: &SocketChannel,
        command: RespValue,
        parse: impl FnOnce(RespValue) -> CoreResult<Option<T>>,
    ) -> CoreResult<Option<T>> {
        let start = Instant::now();
        let host = channel.host().to_string();

        let outcome = channel.send(command, self.timeout).await.and_then(|resp| {
            if let RespValue::Error(text) = &resp {
                return Err(CoreError::RedisServerError(text.clone()));
            }
            parse(resp)
        });

        let elapsed = start.elapsed();
        let error_kind = outcome.as_ref().err().map(CoreError::kind);
        self.monitor
            .record_execution(&host, elapsed, error_kind, self.slow_threshold)
            .await;

        if elapsed > self.slow_threshold {
            warn!(method, host = %host, elapsed_us = elapsed.as_micros(), "slow redis execution");
        } else {
            debug!(method, host = %host, elapsed_us = elapsed.as_micros(), "redis execution");
        }

        outcome
    }
}

/// Argument validation helpers shared by the command surface (Module R).
pub fn require_non_empty(name: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::illegal_argument(format!("{name} must not be empty")));
    }
    Ok(())
}

pub fn require_positive(name: &str, value: i64) -> CoreResult<()> {
    if value <= 0 {
        return Err(CoreError::illegal_argument(format!("{name} must be positive")));
    }
    Ok(())
}
