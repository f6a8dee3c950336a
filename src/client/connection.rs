//! Module `connection`
//!
//! Wraps one accepted TCP stream behind a line-oriented interface shared by
//! the client's receiver task and every broadcaster that writes to it.

use log::{debug, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};

use crate::error::ConnectionError;
use crate::utils::flag_raised;

/// Longest accepted line, terminator excluded
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// How long one line may take to reach a client before it is dropped
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection bounds on reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub max_line_length: usize,
    pub write_timeout: Duration,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Outcome of waiting for the next line.
#[derive(Debug, PartialEq)]
pub enum LineRead {
    /// A complete line, without its `\n` or `\r\n` terminator
    Line(String),
    /// Peer closed, the read failed, the line was too long, or the
    /// connection was closed locally
    EndOfStream,
}

/// A connected chat client.
///
/// The read half is only used by the client's receiver. The write half sits
/// behind its own lock so overlapping broadcasts never interleave lines.
/// Every write is bounded by `write_timeout` and abandoned as soon as the
/// connection is closed, so a client that stops reading cannot hold the lock.
pub struct Connection {
    addr: SocketAddr,
    limits: ConnectionLimits,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
}

impl Connection {
    pub fn with_limits(stream: TcpStream, addr: SocketAddr, limits: ConnectionLimits) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (closed, _) = watch::channel(false);

        Self {
            addr,
            limits,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            closed,
        }
    }

    /// Wraps a freshly accepted stream, keyed by its peer address.
    ///
    /// Fails when the peer is already gone.
    pub fn from_stream(
        stream: TcpStream,
        limits: ConnectionLimits,
    ) -> Result<Self, ConnectionError> {
        let addr = stream.peer_addr().map_err(ConnectionError::PeerAddr)?;
        Ok(Self::with_limits(stream, addr, limits))
    }

    /// Returns the peer address this connection is registered under.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Waits for the next `\n`-terminated line.
    ///
    /// Never fails: peer closure, read errors, an overlong line and a local
    /// `close()` all end the stream. A trailing fragment with no terminator
    /// is dropped.
    pub async fn read_line(&self) -> LineRead {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return LineRead::EndOfStream;
        }

        let max = self.limits.max_line_length;
        let mut reader = self.reader.lock().await;
        let mut limited = (&mut *reader).take(max as u64 + 1);
        let mut buf = Vec::new();

        tokio::select! {
            _ = flag_raised(&mut closed) => LineRead::EndOfStream,
            result = limited.read_until(b'\n', &mut buf) => match result {
                Ok(0) => LineRead::EndOfStream,
                Ok(n) if buf.last() != Some(&b'\n') => {
                    if n > max {
                        warn!("Line from {} exceeds {} bytes; dropping client", self.addr, max);
                    } else {
                        debug!("Discarding {} unterminated bytes from {}", n, self.addr);
                    }
                    LineRead::EndOfStream
                }
                Ok(_) => LineRead::Line(decode_line(&buf)),
                Err(e) => {
                    warn!("Failed to read from {}: {}", self.addr, e);
                    LineRead::EndOfStream
                }
            },
        }
    }

    /// Writes `line` plus a newline and flushes it immediately.
    ///
    /// Gives up with `Closed` when the connection is closed mid-write. A
    /// write that outlives `write_timeout` closes the connection.
    pub async fn write_line(&self, line: &str) -> Result<(), ConnectionError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ConnectionError::Closed(self.addr));
        }

        let mut payload = String::with_capacity(line.len() + 1);
        payload.push_str(line);
        payload.push('\n');

        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(payload.as_bytes()).await?;
            writer.flush().await
        };

        let outcome = tokio::select! {
            _ = flag_raised(&mut closed) => Err(ConnectionError::Closed(self.addr)),
            result = tokio::time::timeout(self.limits.write_timeout, write) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ConnectionError::Write(self.addr, e)),
                Err(_) => Err(ConnectionError::WriteTimeout(self.addr, self.limits.write_timeout)),
            },
        };

        if let Err(ConnectionError::WriteTimeout(..)) = &outcome {
            // The peer stopped reading; a partial line may already be on the wire
            self.close().await;
        }
        outcome
    }

    /// Closes the connection. Idempotent.
    ///
    /// Raising the closed flag first wakes a pending `read_line` and makes
    /// in-flight writes release the write lock; the write direction is then
    /// shut down so the peer sees end of stream.
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown of {} failed: {}", self.addr, e);
        }
    }
}

fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Returns a server-side `Connection` and the client stream talking to it.
    pub(crate) async fn connected_pair() -> (Connection, TcpStream) {
        connected_pair_with(ConnectionLimits::default()).await
    }

    pub(crate) async fn connected_pair_with(limits: ConnectionLimits) -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server_side, addr) = listener.accept().await.unwrap();
        (Connection::with_limits(server_side, addr, limits), client)
    }

    #[tokio::test]
    async fn test_from_stream_keys_by_peer_addr() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server_side, _) = listener.accept().await.unwrap();

        let connection = Connection::from_stream(server_side, ConnectionLimits::default()).unwrap();
        assert_eq!(connection.addr(), client.local_addr().unwrap());
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_read_line_strips_terminators() {
        let (connection, mut client) = connected_pair().await;
        client.write_all(b"hello\r\nworld\n").await.unwrap();

        assert_eq!(connection.read_line().await, LineRead::Line("hello".into()));
        assert_eq!(connection.read_line().await, LineRead::Line("world".into()));
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream_and_drops_fragment() {
        let (connection, mut client) = connected_pair().await;
        client.write_all(b"complete\npartial").await.unwrap();
        drop(client);

        assert_eq!(
            connection.read_line().await,
            LineRead::Line("complete".into())
        );
        assert_eq!(connection.read_line().await, LineRead::EndOfStream);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let (connection, mut client) = connected_pair().await;
        client.write_all(b"caf\xff\n").await.unwrap();

        assert_eq!(
            connection.read_line().await,
            LineRead::Line("caf\u{fffd}".into())
        );
    }

    #[tokio::test]
    async fn test_close_wakes_pending_read() {
        let (connection, _client) = connected_pair().await;
        let connection = Arc::new(connection);

        let reader = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move { connection.read_line().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        connection.close().await;

        let outcome = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, LineRead::EndOfStream);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_peer_sees_eof() {
        let (connection, client) = connected_pair().await;
        connection.close().await;
        connection.close().await;
        assert!(connection.is_closed());

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_line_appends_newline() {
        let (connection, client) = connected_pair().await;
        connection.write_line("ping").await.unwrap();

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap(), Some("ping".into()));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (connection, _client) = connected_pair().await;
        connection.close().await;

        let err = connection.write_line("late").await.unwrap_err();
        assert!(matches!(err, ConnectionError::Closed(addr) if addr == connection.addr()));
    }

    #[tokio::test]
    async fn test_concurrent_writes_do_not_interleave() {
        let (connection, client) = connected_pair().await;
        let connection = Arc::new(connection);
        let long_a = "a".repeat(64 * 1024);
        let long_b = "b".repeat(64 * 1024);

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(client).lines();
            let first = lines.next_line().await.unwrap().unwrap();
            let second = lines.next_line().await.unwrap().unwrap();
            (first, second)
        });

        let writer_a = {
            let connection = Arc::clone(&connection);
            let line = long_a.clone();
            tokio::spawn(async move { connection.write_line(&line).await })
        };
        let writer_b = {
            let connection = Arc::clone(&connection);
            let line = long_b.clone();
            tokio::spawn(async move { connection.write_line(&line).await })
        };
        writer_a.await.unwrap().unwrap();
        writer_b.await.unwrap().unwrap();

        let (first, second) = reader.await.unwrap();
        let mut received = vec![first, second];
        received.sort();
        assert_eq!(received, vec![long_a, long_b]);
    }

    #[tokio::test]
    async fn test_line_length_cap() {
        let limits = ConnectionLimits {
            max_line_length: 16,
            ..ConnectionLimits::default()
        };
        let (connection, mut client) = connected_pair_with(limits).await;
        let exact = "a".repeat(16);
        let overlong = "b".repeat(40);
        client
            .write_all(format!("{}\n{}\n", exact, overlong).as_bytes())
            .await
            .unwrap();

        assert_eq!(connection.read_line().await, LineRead::Line(exact));
        assert_eq!(connection.read_line().await, LineRead::EndOfStream);
    }

    #[tokio::test]
    async fn test_non_reading_peer_times_out_and_is_closed() {
        let limits = ConnectionLimits {
            write_timeout: Duration::from_millis(200),
            ..ConnectionLimits::default()
        };
        // The client side is kept open but never read
        let (connection, _client) = connected_pair_with(limits).await;
        let line = "x".repeat(64 * 1024);

        let flood = async {
            loop {
                if let Err(e) = connection.write_line(&line).await {
                    return e;
                }
            }
        };
        let err = tokio::time::timeout(Duration::from_secs(20), flood)
            .await
            .unwrap();

        assert!(matches!(err, ConnectionError::WriteTimeout(..)));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_close_releases_writer_stuck_on_full_socket() {
        let limits = ConnectionLimits {
            write_timeout: Duration::from_secs(60),
            ..ConnectionLimits::default()
        };
        let (connection, _client) = connected_pair_with(limits).await;
        let connection = Arc::new(connection);

        let flood = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                let line = "x".repeat(64 * 1024);
                loop {
                    if let Err(e) = connection.write_line(&line).await {
                        return e;
                    }
                }
            })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;

        tokio::time::timeout(Duration::from_secs(2), connection.close())
            .await
            .unwrap();
        let err = tokio::time::timeout(Duration::from_secs(2), flood)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(err, ConnectionError::Closed(_)));
    }
}
