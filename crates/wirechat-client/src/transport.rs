//! TCP transport for the session.
//!
//! Provides [`Connection`], a handle around one established TCP stream.
//! This is a thin layer that moves bytes - protocol logic stays in the
//! Sans-IO [`crate::Session`].
//!
//! Two tasks run per connection:
//!
//! - the **reader** pulls bytes from the socket, feeds the
//!   [`StreamDecoder`], and pushes decoded lines into a channel;
//! - the **writer** drains a byte channel into the socket, so concurrent
//!   producers (chat input, the file reader) can never interleave partial
//!   writes.
//!
//! Shutdown is driven by a [`CancellationToken`]. Cancelling does not
//! interrupt a blocked read by itself; dropping the read half closes the
//! socket, which does.

use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use wirechat_proto::{DecodedLine, ProtocolError, StreamDecoder};

use crate::error::TransportError;

/// Transport tuning knobs.
///
/// Keep-alive values are configuration, not protocol: they only affect how
/// quickly a silently dropped connection is detected.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Idle time before the first keep-alive probe.
    pub keepalive_idle: Duration,
    /// Interval between keep-alive probes.
    pub keepalive_interval: Duration,
    /// Size of each socket read.
    pub read_buffer_size: usize,
    /// Capacity of the inbound and outbound channels.
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            keepalive_idle: Duration::from_secs(180),
            keepalive_interval: Duration::from_secs(30),
            read_buffer_size: 1024,
            channel_capacity: 32,
        }
    }
}

/// Handle to one established connection.
///
/// Owned by the session runtime. Dropping the handle cancels the reader;
/// [`close`](Connection::close) additionally sends the leave announcement
/// and waits for the writer to flush.
pub struct Connection {
    outgoing: Option<mpsc::Sender<Vec<u8>>>,
    incoming: mpsc::Receiver<Result<DecodedLine, ProtocolError>>,
    writer: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    username: String,
}

impl Connection {
    /// Queue bytes for the writer task.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the connection was closed or the
    ///   writer task is gone.
    pub async fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let Some(tx) = &self.outgoing else {
            return Err(TransportError::Closed);
        };
        tx.send(bytes).await.map_err(|_| TransportError::Closed)
    }

    /// Receive the next decoded line.
    ///
    /// Returns `None` once the peer disconnected (or our own close
    /// completed) and all buffered lines were drained.
    pub async fn recv(&mut self) -> Option<Result<DecodedLine, ProtocolError>> {
        self.incoming.recv().await
    }

    /// Gracefully close the connection.
    ///
    /// Best-effort: the leave announcement is queued (failure ignored), the
    /// writer gets a bounded window to flush, then the reader is cancelled
    /// and the socket closes. Safe to call more than once; the second call
    /// is a no-op apart from re-cancelling an already-cancelled token.
    pub async fn close(&mut self) {
        if let Some(tx) = self.outgoing.take() {
            let leave = format!("User {} left the chat.\n", self.username).into_bytes();
            let _ = tx.send(leave).await;
        }
        if let Some(writer) = self.writer.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), writer).await;
        }
        self.cancel.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Connect to the chat server and announce the user.
///
/// Configures TCP keep-alive, spawns the reader/writer tasks, and sends
/// the join announcement as a plain chat-shaped line.
///
/// # Errors
///
/// - `TransportError::Connect` if the TCP connection cannot be established
/// - `TransportError::Io` if keep-alive configuration fails
/// - `TransportError::Closed` if the join announcement cannot be queued
pub async fn connect(
    host: &str,
    port: u16,
    username: &str,
    config: TransportConfig,
) -> Result<Connection, TransportError> {
    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| TransportError::Connect { addr: addr.clone(), source })?;

    configure_keepalive(&stream, &config)?;
    tracing::debug!(%addr, "connected");

    let (read_half, write_half) = stream.into_split();
    let cancel = CancellationToken::new();

    let (out_tx, out_rx) = mpsc::channel(config.channel_capacity);
    let (in_tx, in_rx) = mpsc::channel(config.channel_capacity);

    let writer = tokio::spawn(run_writer(write_half, out_rx));
    tokio::spawn(run_reader(read_half, in_tx, cancel.clone(), config.read_buffer_size));

    let connection = Connection {
        outgoing: Some(out_tx),
        incoming: in_rx,
        writer: Some(writer),
        cancel,
        username: username.to_string(),
    };

    let join = format!("User {username} joined the chat.\n").into_bytes();
    connection.send(join).await?;

    Ok(connection)
}

/// Enable keep-alive probing on the socket so a silently dropped peer is
/// eventually detected.
fn configure_keepalive(stream: &TcpStream, config: &TransportConfig) -> Result<(), TransportError> {
    let keepalive = TcpKeepalive::new()
        .with_time(config.keepalive_idle)
        .with_interval(config.keepalive_interval);

    SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    Ok(())
}

/// Drain the outbound channel into the socket.
///
/// Exits when every sender is dropped (after flushing what was queued,
/// which is how the leave announcement gets out) or on the first write
/// error.
async fn run_writer(mut write_half: OwnedWriteHalf, mut outgoing: mpsc::Receiver<Vec<u8>>) {
    while let Some(bytes) = outgoing.recv().await {
        if let Err(e) = write_half.write_all(&bytes).await {
            tracing::error!("connection write failed: {e}");
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

/// Pull bytes from the socket and push decoded lines to the session.
///
/// Exits on cancellation, peer close, read error, or the session dropping
/// its receiver. Dropping `incoming` is what signals disconnect upstream.
async fn run_reader(
    mut read_half: OwnedReadHalf,
    incoming: mpsc::Sender<Result<DecodedLine, ProtocolError>>,
    cancel: CancellationToken,
    read_buffer_size: usize,
) {
    let mut decoder = StreamDecoder::new();
    let mut buf = vec![0u8; read_buffer_size.max(1)];

    loop {
        let n = tokio::select! {
            () = cancel.cancelled() => break,
            read = read_half.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!("peer closed the connection");
                    break;
                },
                Ok(n) => n,
                Err(e) => {
                    if !cancel.is_cancelled() {
                        tracing::error!("connection read failed: {e}");
                    }
                    break;
                },
            },
        };

        decoder.feed(&buf[..n]);
        while let Some(line) = decoder.next_line() {
            if incoming.send(line).await.is_err() {
                // Session is gone; stop reading.
                return;
            }
        }
    }
}
