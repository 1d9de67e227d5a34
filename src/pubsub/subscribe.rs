//! Subscribe client (Module L).
//!
//! A Redis connection in subscribe mode stops behaving like a
//! request/response channel: the server pushes `message`/`pmessage`
//! frames on its own schedule, so this uses its own reader loop rather
//! than [`crate::channel::SocketChannel`]'s FIFO request/response
//! pairing — dispatch is keyed off the first array element, not off a
//! pending-request queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::resp::{RespDecoder, RespEncoder, RespValue};

const ACK_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to wait for a PONG after sending a heartbeat PING before
/// treating the connection as dead, matching
/// [`crate::channel`]'s own `PING_AWAIT`.
const PING_AWAIT: Duration = Duration::from_secs(5);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub enum SubscribeEvent {
    Message { channel: String, payload: Bytes },
    PMessage { pattern: String, channel: String, payload: Bytes },
}

pub type EventHandler = Arc<dyn Fn(SubscribeEvent) + Send + Sync>;

/// Owns the background connection loop for one subscribe session.
/// Reconnects and re-subscribes automatically when the connection drops.
pub struct SubscribeClient {
    connected: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl SubscribeClient {
    /// `ping_period` gates the heartbeat: a PING is only sent once the
    /// connection has been quiet for longer than this, matching
    /// [`crate::channel::SocketChannel`]'s heartbeat policy.
    pub fn start(
        host: String,
        channels: Vec<String>,
        patterns: Vec<String>,
        ping_period: Duration,
        handler: EventHandler,
    ) -> Self {
        let connected = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(Notify::new());

        let task_connected = connected.clone();
        let task_stop = stop.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_stop.notified() => return,
                    result = run_once(&host, &channels, &patterns, ping_period, handler.clone(), task_connected.clone()) => {
                        if let Err(e) = result {
                            warn!(host = %host, error = %e, "subscribe connection dropped, reconnecting");
                        }
                        task_connected.store(false, Ordering::Release);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Self { connected, stop }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.stop.notify_waiters();
    }
}

async fn run_once(
    host: &str,
    channels: &[String],
    patterns: &[String],
    ping_period: Duration,
    handler: EventHandler,
    connected: Arc<AtomicBool>,
) -> CoreResult<()> {
    if channels.is_empty() && patterns.is_empty() {
        return Err(CoreError::illegal_argument("subscribe client needs at least one channel or pattern"));
    }

    let mut stream = TcpStream::connect(host).await.map_err(CoreError::Io)?;
    stream.set_nodelay(true).ok();

    if !channels.is_empty() {
        let args: Vec<&[u8]> = channels.iter().map(|c| c.as_bytes()).collect();
        write_command(&mut stream, &RespEncoder::command("SUBSCRIBE", &args)).await?;
    }
    if !patterns.is_empty() {
        let args: Vec<&[u8]> = patterns.iter().map(|c| c.as_bytes()).collect();
        write_command(&mut stream, &RespEncoder::command("PSUBSCRIBE", &args)).await?;
    }

    let mut buf = BytesMut::new();
    let mut scratch = [0u8; READ_CHUNK];
    let mut expected_acks = channels.len() + patterns.len();
    let deadline = tokio::time::Instant::now() + ACK_TIMEOUT;

    while expected_acks > 0 {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                return Err(CoreError::Timeout(ACK_TIMEOUT));
            }
            read = stream.read(&mut scratch) => {
                let n = read.map_err(CoreError::Io)?;
                if n == 0 {
                    return Err(CoreError::illegal_state("connection closed while awaiting subscribe ack"));
                }
                buf.extend_from_slice(&scratch[..n]);
                while let Some(value) = RespDecoder::decode(&mut buf)? {
                    if is_ack(&value) {
                        expected_acks -= 1;
                    }
                }
            }
        }
    }

    connected.store(true, Ordering::Release);
    info!(host, "subscribe connection established");

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last_activity = tokio::time::Instant::now();
    let mut pending_pong_deadline: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(deadline) = pending_pong_deadline {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(CoreError::illegal_state("no PONG within ping deadline, closing"));
                    }
                    continue;
                }
                if last_activity.elapsed() <= ping_period {
                    continue;
                }
                write_command(&mut stream, &RespEncoder::command("PING", &[] as &[&[u8]])).await?;
                pending_pong_deadline = Some(tokio::time::Instant::now() + PING_AWAIT);
            }
            read = stream.read(&mut scratch) => {
                let n = read.map_err(CoreError::Io)?;
                if n == 0 {
                    return Err(CoreError::illegal_state("subscribe connection closed by peer"));
                }
                last_activity = tokio::time::Instant::now();
                buf.extend_from_slice(&scratch[..n]);
                while let Some(value) = RespDecoder::decode(&mut buf)? {
                    if is_pong(&value) {
                        pending_pong_deadline = None;
                    }
                    dispatch(value, &handler);
                }
            }
        }
    }
}

async fn write_command(stream: &mut TcpStream, command: &RespValue) -> CoreResult<()> {
    let bytes = RespEncoder::encode(command);
    stream.write_all(&bytes).await.map_err(CoreError::Io)
}

fn is_ack(value: &RespValue) -> bool {
    match value.as_array().and_then(|e| e.first()).and_then(|v| v.as_bulk()) {
        Some(b"subscribe") | Some(b"psubscribe") => true,
        _ => false,
    }
}

fn is_pong(value: &RespValue) -> bool {
    matches!(
        value.as_array().and_then(|e| e.first()).and_then(|v| v.as_bulk()),
        Some(b"pong")
    )
}

fn dispatch(value: RespValue, handler: &EventHandler) {
    let Some(elements) = value.as_array() else { return };
    let Some(kind) = elements.first().and_then(|v| v.as_bulk()) else { return };
    match kind {
        b"message" if elements.len() >= 3 => {
            if let (Some(channel), Some(payload)) = (elements[1].as_bulk(), elements[2].as_bulk()) {
                handler(SubscribeEvent::Message {
                    channel: String::from_utf8_lossy(channel).to_string(),
                    payload: Bytes::copy_from_slice(payload),
                });
            }
        }
        b"pmessage" if elements.len() >= 4 => {
            if let (Some(pattern), Some(channel), Some(payload)) =
                (elements[1].as_bulk(), elements[2].as_bulk(), elements[3].as_bulk())
            {
                handler(SubscribeEvent::PMessage {
                    pattern: String::from_utf8_lossy(pattern).to_string(),
                    channel: String::from_utf8_lossy(channel).to_string(),
                    payload: Bytes::copy_from_slice(payload),
                });
            }
        }
        b"pong" | b"subscribe" | b"psubscribe" | b"unsubscribe" | b"punsubscribe" => {}
        _ => debug!("unhandled pubsub frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dispatches_message_after_ack_gate() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut inbuf = BytesMut::new();
            let mut scratch = [0u8; 1024];
            loop {
                if RespDecoder::decode(&mut inbuf).unwrap().is_some() {
                    break;
                }
                let n = socket.read(&mut scratch).await.unwrap();
                inbuf.extend_from_slice(&scratch[..n]);
            }
            socket.write_all(b"*3\r\n$9\r\nsubscribe\r\n$4\r\nchan\r\n:1\r\n").await.unwrap();
            socket
                .write_all(b"*3\r\n$7\r\nmessage\r\n$4\r\nchan\r\n$5\r\nhello\r\n")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let received: Arc<Mutex<Vec<SubscribeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let handler: EventHandler = Arc::new(move |event| received_clone.lock().unwrap().push(event));

        let client = SubscribeClient::start(
            addr,
            vec!["chan".to_string()],
            vec![],
            Duration::from_secs(30),
            handler,
        );

        for _ in 0..50 {
            if client.is_connected() && !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert!(client.is_connected());
        let events = received.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            SubscribeEvent::Message { channel, payload } => {
                assert_eq!(channel, "chan");
                assert_eq!(payload.as_ref(), b"hello");
            }
            _ => panic!("expected Message event"),
        }
        client.stop();
    }

    #[test]
    fn ack_detection() {
        assert!(is_ack(&RespValue::Array(Some(vec![
            RespValue::bulk(Bytes::from("subscribe")),
            RespValue::bulk(Bytes::from("chan")),
            RespValue::Integer(1),
        ]))));
        assert!(!is_ack(&RespValue::Array(Some(vec![
            RespValue::bulk(Bytes::from("message")),
            RespValue::bulk(Bytes::from("chan")),
            RespValue::bulk(Bytes::from("x")),
        ]))));
    }
}
