//! One accepted connection, from the first byte to close.
//!
//! The supervisor reads into a [`MessageFramer`], hands each complete message
//! to the [`MessageHandler`] strictly in arrival order, and decides when the
//! connection ends: idle timeout (`408`), framing failure (`413`/`400`), peer
//! close, or a response that closed the write side.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, error, warn};

use super::MessageHandler;
use crate::config::{DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_REQUEST_SIZE};
use crate::http::response::Outbound;
use crate::http::{FrameError, MessageFramer, Response};

/// Where a connection is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    /// Waiting for the first byte of a message.
    Idle,
    /// Holding part of a message, waiting for the rest.
    Framing,
    Decoding,
    Routing,
    Handling,
    Responding,
    Closed,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Phase::Idle,
            1 => Phase::Framing,
            2 => Phase::Decoding,
            3 => Phase::Routing,
            4 => Phase::Handling,
            5 => Phase::Responding,
            _ => Phase::Closed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Framing => "framing",
            Phase::Decoding => "decoding",
            Phase::Routing => "routing",
            Phase::Handling => "handling",
            Phase::Responding => "responding",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Longest wait for the next bytes before answering `408`.
    pub idle_timeout: Duration,
    /// Largest message the framer will buffer.
    pub max_request_size: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }
}

/// A message handler's view of the connection a message arrived on.
///
/// Cheap to clone; every clone refers to the same connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    peer: Option<SocketAddr>,
    outbound: Arc<Outbound>,
    phase: Arc<AtomicU8>,
}

impl ConnectionHandle {
    fn new(peer: Option<SocketAddr>, outbound: Arc<Outbound>) -> Self {
        Self {
            peer,
            outbound,
            phase: Arc::new(AtomicU8::new(Phase::Idle as u8)),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    /// Starts a reply on this connection.
    ///
    /// With `keep_alive == false` the write side is shut down once the reply
    /// is written. `head_only` drops body bytes.
    pub fn response(&self, keep_alive: bool, head_only: bool) -> Response {
        Response::new(Arc::clone(&self.outbound), keep_alive, head_only)
    }

    /// Returns `true` once the write side has been shut down.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Shuts down the write side.
    pub async fn close(&self) {
        self.set_phase(Phase::Closed);
        self.outbound.shutdown().await;
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("peer", &self.peer)
            .field("phase", &self.phase())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Drives one connection until it closes.
///
/// Generic over the stream so tests can run it over an in-memory duplex.
pub async fn serve_connection<S, H>(
    stream: S,
    peer: Option<SocketAddr>,
    handler: Arc<H>,
    limits: ConnectionLimits,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
    H: MessageHandler + ?Sized,
{
    let (mut reader, writer) = tokio::io::split(stream);
    let conn = ConnectionHandle::new(peer, Outbound::new(writer));
    let mut framer = MessageFramer::new(limits.max_request_size);
    let peer_label = peer.map_or_else(|| "-".to_owned(), |p| p.to_string());

    loop {
        loop {
            match framer.next_message() {
                Ok(Some(message)) => {
                    conn.set_phase(Phase::Decoding);
                    handler.handle(message, conn.clone()).await;
                    if conn.is_closed() {
                        conn.set_phase(Phase::Closed);
                        debug!(peer = %peer_label, "connection closed after response");
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(peer = %peer_label, error = %e, "framing failed, closing connection");
                    let status = match e {
                        FrameError::TooLarge { .. } => 413,
                        FrameError::InvalidContentLength { .. } => 400,
                    };
                    reply_and_close(&*handler, &conn, status).await;
                    return;
                }
            }
        }

        conn.set_phase(if framer.is_empty() {
            Phase::Idle
        } else {
            Phase::Framing
        });

        let read = tokio::time::timeout(limits.idle_timeout, reader.read_buf(framer.buffer_mut())).await;
        match read {
            Err(_) => {
                warn!(
                    peer = %peer_label,
                    phase = %conn.phase(),
                    pending = framer.pending(),
                    "connection idle timeout"
                );
                reply_and_close(&*handler, &conn, 408).await;
                return;
            }
            Ok(Ok(0)) => {
                debug!(peer = %peer_label, "connection closed by peer");
                conn.close().await;
                return;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                debug!(peer = %peer_label, error = %e, "read failed");
                conn.close().await;
                return;
            }
        }
    }
}

// Answers with a bare status and closes; used where no request was decoded.
async fn reply_and_close<H>(handler: &H, conn: &ConnectionHandle, status: u16)
where
    H: MessageHandler + ?Sized,
{
    if !conn.is_closed() {
        let response = conn.response(false, false);
        handler.prepare(&response);
        if let Err(e) = response.send_status(status).await {
            error!(error = %e, status, "failed to write error response");
        }
    }
    conn.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    // Echoes each message's first line back and records what it saw.
    #[derive(Default)]
    struct FirstLine {
        seen: Mutex<Vec<String>>,
    }

    impl MessageHandler for FirstLine {
        fn handle(
            &self,
            message: Bytes,
            conn: ConnectionHandle,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                let text = String::from_utf8_lossy(&message).into_owned();
                let line = text.lines().next().unwrap_or_default().to_owned();
                self.seen.lock().unwrap().push(line.clone());
                let keep_alive = !text.contains("Connection: close");
                conn.response(keep_alive, false).send(line).await.unwrap();
            })
        }
    }

    fn spawn(limits: ConnectionLimits) -> (DuplexStream, Arc<FirstLine>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let handler = Arc::new(FirstLine::default());
        tokio::spawn(serve_connection(server, None, Arc::clone(&handler), limits));
        (client, handler)
    }

    async fn read_all(client: &mut DuplexStream) -> String {
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn pipelined_messages_are_answered_in_order() {
        let (mut client, handler) = spawn(ConnectionLimits::default());
        client
            .write_all(b"GET /1 HTTP/1.1\r\n\r\nGET /2 HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let out = read_all(&mut client).await;
        let first = out.find("GET /1").unwrap();
        let second = out.find("GET /2").unwrap();
        assert!(first < second);
        assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 2);
        assert_eq!(handler.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn trickled_bytes_frame_the_same() {
        let (mut client, handler) = spawn(ConnectionLimits::default());
        for byte in b"POST /t HTTP/1.1\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok" {
            client.write_all(std::slice::from_ref(byte)).await.unwrap();
        }
        let out = read_all(&mut client).await;
        assert!(out.ends_with("POST /t HTTP/1.1"));
        assert_eq!(handler.seen.lock().unwrap().as_slice(), ["POST /t HTTP/1.1"]);
    }

    #[tokio::test]
    async fn oversized_message_gets_413() {
        let limits = ConnectionLimits {
            max_request_size: 64,
            ..ConnectionLimits::default()
        };
        let (mut client, handler) = spawn(limits);
        client
            .write_all(b"POST / HTTP/1.1\r\nContent-Length: 1000\r\n\r\n")
            .await
            .unwrap();
        let out = read_all(&mut client).await;
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(out.contains("Connection: close\r\n"));
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_content_length_gets_400() {
        let (mut client, _handler) = spawn(ConnectionLimits::default());
        client
            .write_all(b"POST / HTTP/1.1\r\nContent-Length: nope\r\n\r\n")
            .await
            .unwrap();
        assert!(read_all(&mut client).await.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn idle_connection_gets_408() {
        let limits = ConnectionLimits {
            idle_timeout: Duration::from_millis(50),
            ..ConnectionLimits::default()
        };
        let (mut client, _handler) = spawn(limits);
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        assert!(read_all(&mut client).await.starts_with("HTTP/1.1 408 Request Timeout\r\n"));
    }

    #[tokio::test]
    async fn peer_close_ends_connection() {
        let (client, server) = tokio::io::duplex(1024);
        let handler = Arc::new(FirstLine::default());
        let task = tokio::spawn(serve_connection(
            server,
            None,
            Arc::clone(&handler),
            ConnectionLimits::default(),
        ));
        drop(client);
        task.await.unwrap();
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn phase_round_trips_through_atomic() {
        for phase in [Phase::Idle, Phase::Framing, Phase::Routing, Phase::Closed] {
            assert_eq!(Phase::from_u8(phase as u8), phase);
        }
        assert_eq!(Phase::Responding.to_string(), "responding");
    }
}
