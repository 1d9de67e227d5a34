//! Single-socket duplex channel (Module B): one writer task, one reader
//! task, a FIFO of response slots guaranteeing request/response alignment.
//!
//! RESP carries no correlation id, so the only correctness requirement is
//! that the reader completes pending slots in exactly the order the writer
//! released commands onto the wire — see `SPEC_FULL.md` §4.B and §5.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::resp::{RespDecoder, RespEncoder, RespValue};

const READ_BUF_INITIAL: usize = 8 * 1024;
const WRITE_QUEUE_DEPTH: usize = 4096;
const PING_AWAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Uninitialized,
    Normal,
    Closed,
}

struct PendingSlot {
    reply: oneshot::Sender<CoreResult<RespValue>>,
}

struct Outbound {
    command: RespValue,
    reply: oneshot::Sender<CoreResult<RespValue>>,
}

/// One TCP connection to a Redis node, pipelined for concurrent callers.
pub struct SocketChannel {
    host: String,
    write_tx: mpsc::Sender<Outbound>,
    status: Arc<AtomicBool>, // true == normal
    last_activity: Arc<AtomicU64>,
    close_notify: Arc<tokio::sync::Notify>,
    pending: Arc<Mutex<VecDeque<PendingSlot>>>,
    writer_handle: tokio::task::JoinHandle<()>,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl SocketChannel {
    /// Connect and spawn the writer/reader loops. `ping_period` of zero
    /// disables the heartbeat.
    pub async fn connect(host: &str, ping_period: Duration) -> CoreResult<Self> {
        let stream = TcpStream::connect(host)
            .await
            .map_err(|e| CoreError::Io(e))?;
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();

        let (write_tx, write_rx) = mpsc::channel::<Outbound>(WRITE_QUEUE_DEPTH);
        let pending: Arc<Mutex<VecDeque<PendingSlot>>> = Arc::new(Mutex::new(VecDeque::new()));
        let status = Arc::new(AtomicBool::new(true));
        let last_activity = Arc::new(AtomicU64::new(now_millis()));
        let close_notify = Arc::new(tokio::sync::Notify::new());

        let writer_handle = tokio::spawn(writer_loop(write_half, write_rx, pending.clone(), status.clone()));
        let reader_handle = tokio::spawn(reader_loop(
            read_half,
            pending.clone(),
            status.clone(),
            last_activity.clone(),
            close_notify.clone(),
        ));

        if !ping_period.is_zero() {
            tokio::spawn(heartbeat_loop(
                write_tx.clone(),
                status.clone(),
                last_activity.clone(),
                ping_period,
            ));
        }

        Ok(Self {
            host: host.to_string(),
            write_tx,
            status,
            last_activity,
            close_notify,
            pending,
            writer_handle,
            reader_handle,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn status(&self) -> ChannelStatus {
        if self.status.load(Ordering::Acquire) {
            ChannelStatus::Normal
        } else {
            ChannelStatus::Closed
        }
    }

    pub fn is_available(&self) -> bool {
        self.status() == ChannelStatus::Normal
    }

    /// Enqueue `command` and await its response, failing with `Timeout` if
    /// none arrives within `timeout`.
    pub async fn send(&self, command: RespValue, timeout: Duration) -> CoreResult<RespValue> {
        if !self.is_available() {
            return Err(CoreError::illegal_state(format!(
                "channel to {} is closed",
                self.host
            )));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.write_tx
            .send(Outbound { command, reply: reply_tx })
            .await
            .map_err(|_| CoreError::illegal_state("writer queue closed"))?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CoreError::illegal_state("response slot dropped")),
            Err(_) => Err(CoreError::Timeout(timeout)),
        }
    }

    /// Notify when this channel transitions to closed (fires once,
    /// immediately, if it is already closed).
    pub async fn wait_closed(&self) {
        if !self.is_available() {
            return;
        }
        self.close_notify.notified().await;
    }

    /// Tear the connection down: aborts the reader/writer tasks (which
    /// drops their owned socket halves, closing the TCP connection), then
    /// drains every still-pending request with `IllegalState` so no
    /// caller is left waiting.
    pub async fn close(&self) {
        if self.status.swap(false, Ordering::AcqRel) {
            self.writer_handle.abort();
            self.reader_handle.abort();
            drain_pending(&self.pending, "channel closed").await;
            self.close_notify.notify_waiters();
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

async fn writer_loop(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut write_rx: mpsc::Receiver<Outbound>,
    pending: Arc<Mutex<VecDeque<PendingSlot>>>,
    status: Arc<AtomicBool>,
) {
    let mut buf = BytesMut::new();
    while let Some(Outbound { command, reply }) = write_rx.recv().await {
        buf.clear();
        RespEncoder::encode_into(&mut buf, &command);

        // The response slot must be pushed before the bytes hit the
        // socket so the reader can never get ahead of the writer.
        {
            let mut guard = pending.lock().await;
            guard.push_back(PendingSlot { reply });
        }

        if let Err(e) = write_half.write_all(&buf).await {
            warn!("channel write error: {e}");
            status.store(false, Ordering::Release);
            break;
        }
    }
    status.store(false, Ordering::Release);
    drain_pending(&pending, "writer loop stopped").await;
}

async fn reader_loop(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    pending: Arc<Mutex<VecDeque<PendingSlot>>>,
    status: Arc<AtomicBool>,
    last_activity: Arc<AtomicU64>,
    close_notify: Arc<tokio::sync::Notify>,
) {
    let mut buf = BytesMut::with_capacity(READ_BUF_INITIAL);
    let mut scratch = [0u8; READ_BUF_INITIAL];

    loop {
        match read_half.read(&mut scratch).await {
            Ok(0) => {
                debug!("channel read EOF");
                break;
            }
            Ok(n) => {
                buf.extend_from_slice(&scratch[..n]);
                last_activity.store(now_millis(), Ordering::Relaxed);
            }
            Err(e) => {
                warn!("channel read error: {e}");
                break;
            }
        }

        loop {
            match RespDecoder::decode(&mut buf) {
                Ok(Some(value)) => fulfill_next(&pending, Ok(value)).await,
                Ok(None) => break,
                Err(e) => {
                    warn!("protocol error, closing channel: {e}");
                    fulfill_next(&pending, Err(CoreError::Protocol(e))).await;
                    status.store(false, Ordering::Release);
                    drain_pending(&pending, "protocol error").await;
                    close_notify.notify_waiters();
                    return;
                }
            }
        }
    }

    status.store(false, Ordering::Release);
    drain_pending(&pending, "channel closed").await;
    close_notify.notify_waiters();
}

async fn fulfill_next(pending: &Arc<Mutex<VecDeque<PendingSlot>>>, value: CoreResult<RespValue>) {
    let slot = {
        let mut guard = pending.lock().await;
        guard.pop_front()
    };
    if let Some(slot) = slot {
        // A timed-out caller has already dropped its receiver; ignore.
        let _ = slot.reply.send(value);
    } else {
        warn!("response arrived with no pending request");
    }
}

async fn drain_pending(pending: &Arc<Mutex<VecDeque<PendingSlot>>>, reason: &str) {
    let mut guard = pending.lock().await;
    while let Some(slot) = guard.pop_front() {
        let _ = slot.reply.send(Err(CoreError::illegal_state(reason.to_string())));
    }
}

async fn heartbeat_loop(
    write_tx: mpsc::Sender<Outbound>,
    status: Arc<AtomicBool>,
    last_activity: Arc<AtomicU64>,
    ping_period: Duration,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        if !status.load(Ordering::Acquire) {
            return;
        }
        let quiet_ms = now_millis().saturating_sub(last_activity.load(Ordering::Relaxed));
        if Duration::from_millis(quiet_ms) <= ping_period {
            continue;
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let ping = RespEncoder::command("PING", &[] as &[&[u8]]);
        if write_tx
            .send(Outbound { command: ping, reply: reply_tx })
            .await
            .is_err()
        {
            return;
        }

        match tokio::time::timeout(PING_AWAIT, reply_rx).await {
            Ok(Ok(Ok(_))) => continue,
            _ => {
                warn!("no PONG within {PING_AWAIT:?}, closing channel");
                status.store(false, Ordering::Release);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn stub_server(script: Vec<&'static [u8]>) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut inbuf = BytesMut::new();
            let mut scratch = [0u8; 1024];
            for reply in script {
                // Drain one request frame before replying.
                loop {
                    if RespDecoder::decode(&mut inbuf).unwrap().is_some() {
                        break;
                    }
                    let n = socket.read(&mut scratch).await.unwrap();
                    inbuf.extend_from_slice(&scratch[..n]);
                }
                socket.write_all(reply).await.unwrap();
            }
        });
        (addr.to_string(), handle)
    }

    #[tokio::test]
    async fn send_receives_matching_reply() {
        let (addr, _srv) = stub_server(vec![b"+PONG\r\n"]).await;
        let channel = SocketChannel::connect(&addr, Duration::ZERO).await.unwrap();
        let cmd = RespEncoder::command("PING", &[] as &[&[u8]]);
        let resp = channel.send(cmd, Duration::from_secs(1)).await.unwrap();
        assert_eq!(resp, RespValue::SimpleString("PONG".into()));
    }

    #[tokio::test]
    async fn pipelines_responses_in_request_order() {
        let (addr, _srv) = stub_server(vec![b":1\r\n", b":2\r\n", b":3\r\n"]).await;
        let channel = SocketChannel::connect(&addr, Duration::ZERO).await.unwrap();

        let c1 = channel.send(RespEncoder::command("INCR", &["a"]), Duration::from_secs(1));
        let c2 = channel.send(RespEncoder::command("INCR", &["b"]), Duration::from_secs(1));
        let c3 = channel.send(RespEncoder::command("INCR", &["c"]), Duration::from_secs(1));
        let (r1, r2, r3) = tokio::join!(c1, c2, c3);
        assert_eq!(r1.unwrap(), RespValue::Integer(1));
        assert_eq!(r2.unwrap(), RespValue::Integer(2));
        assert_eq!(r3.unwrap(), RespValue::Integer(3));
    }

    #[tokio::test]
    async fn close_drains_pending_with_illegal_state() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            // Never reply; hold the connection open.
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let channel = Arc::new(SocketChannel::connect(&addr, Duration::ZERO).await.unwrap());
        let in_flight = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.send(RespEncoder::command("GET", &["k"]), Duration::from_secs(5)).await })
        };

        // Give the send a chance to actually be polled and land in the
        // pending queue before the channel is closed out from under it.
        tokio::time::sleep(Duration::from_millis(50)).await;

        channel.close().await;
        let result = in_flight.await.unwrap();
        assert!(matches!(result, Err(CoreError::IllegalState(_))));
    }

    #[tokio::test]
    async fn timeout_does_not_crash_on_late_response() {
        let (addr, _srv) = stub_server(vec![b"+OK\r\n"]).await;
        let channel = SocketChannel::connect(&addr, Duration::ZERO).await.unwrap();
        let result = channel
            .send(RespEncoder::command("SLOW", &[] as &[&[u8]]), Duration::from_millis(1))
            .await;
        assert!(matches!(result, Err(CoreError::Timeout(_))));
        // Let the late reply actually arrive and be silently dropped.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
