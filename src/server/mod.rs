//! Async TCP acceptor using Tokio.
//!
//! [`Server`] owns the listening socket and spawns one task per accepted
//! connection. What happens to the bytes is up to the [`MessageHandler`] it is
//! given; [`App`](crate::App) is the HTTP one.

pub mod connection;

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::http::Response;

pub use connection::{ConnectionHandle, ConnectionLimits, Phase, serve_connection};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Handles one framed message on a connection.
///
/// The message is exactly one request: header block, blank line and
/// `Content-Length` body bytes. The implementation is expected to write a
/// reply through [`ConnectionHandle::response`]; the next message is not read
/// until the returned future completes.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(
        &self,
        message: Bytes,
        conn: ConnectionHandle,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Decorates replies the connection supervisor writes on its own
    /// (`408`, `413`, framing `400`).
    fn prepare(&self, _response: &Response) {}
}

/// Stops a running [`Server`] from accepting new connections.
///
/// Connections already accepted run to completion.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// The hasty TCP acceptor.
///
/// # Examples
///
/// ```rust,no_run
/// use hasty::App;
/// use hasty::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut app = App::new();
///     app.get("/", |_req, res| async move {
///         res.send("Hello!").await?;
///         Ok(())
///     });
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(app).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    limits: ConnectionLimits,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            listener,
            local_addr,
            limits: ConnectionLimits::default(),
            shutdown: Arc::new(shutdown),
        })
    }

    /// Replaces the per-connection limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ConnectionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn limits(&self) -> ConnectionLimits {
        self.limits
    }

    /// Returns a handle that stops [`run`](Self::run).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Accepts connections and feeds their messages to `handler` until a
    /// [`ShutdownHandle`] fires.
    ///
    /// Accept failures are logged and skipped.
    pub async fn run<H: MessageHandler>(self, handler: H) -> Result<(), ServerError> {
        let handler = Arc::new(handler);
        let mut stop = self.shutdown.subscribe();
        info!(address = %self.local_addr, "hasty listening");

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            let (stream, peer_addr) = tokio::select! {
                _ = stop.changed() => continue,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            debug!(peer = %peer_addr, "connection accepted");
            tokio::spawn(serve_connection(
                stream,
                Some(peer_addr),
                Arc::clone(&handler),
                self.limits,
            ));
        }

        info!(address = %self.local_addr, "hasty stopped");
        Ok(())
    }
}
