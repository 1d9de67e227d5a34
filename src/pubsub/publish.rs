//! Publish client (Module M): a thin `PUBLISH` wrapper with lazy
//! auto-reconnect. Publishing to a channel with no subscribers isn't an
//! error — Redis reports it as a `0` receiver count, which is logged as a
//! warning rather than surfaced as [`CoreError`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::warn;

use crate::direct_client::DirectClient;
use crate::error::{CoreError, CoreResult};
use crate::monitor::Monitor;
use crate::resp::RespEncoder;

pub struct PublishClient {
    host: String,
    timeout: Duration,
    monitor: Arc<Monitor>,
    client: RwLock<Option<Arc<DirectClient>>>,
}

impl PublishClient {
    pub fn new(host: String, timeout: Duration, monitor: Arc<Monitor>) -> Self {
        Self { host, timeout, monitor, client: RwLock::new(None) }
    }

    async fn ensure_connected(&self) -> CoreResult<Arc<DirectClient>> {
        if let Some(client) = self.client.read().await.as_ref() {
            if client.is_available() {
                return Ok(client.clone());
            }
        }
        let fresh = Arc::new(DirectClient::connect(&self.host, self.timeout, Duration::ZERO, self.monitor.clone()).await?);
        *self.client.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    pub async fn publish(&self, channel: &str, message: &str) -> CoreResult<i64> {
        let client = self.ensure_connected().await?;
        let cmd = RespEncoder::command("PUBLISH", &[channel.as_bytes(), message.as_bytes()]);
        let resp = client.execute_raw("PUBLISH", cmd).await?;
        let count = resp
            .as_integer()
            .ok_or_else(|| CoreError::unexpected("PUBLISH did not return an integer reply"))?;
        if count == 0 {
            warn!(channel, "published message with no subscribers");
        }
        Ok(count)
    }

    pub async fn close(&self) {
        if let Some(client) = self.client.write().await.take() {
            client.close().await;
        }
    }
}
