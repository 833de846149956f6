//! The HTTP application: route table plus configuration, served by
//! [`Server`].
//!
//! For each framed message [`App`] decodes the request, applies the rate limit,
//! resolves a route, and runs the handler with a fresh [`Response`]. Failures
//! that happen before a handler gets the response are answered here; a
//! handler that fails or panics gets `500` if it had not started replying and
//! a closed connection otherwise.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::config::{RateLimitConfig, ServerConfig};
use crate::http::{Method, Request, Response};
use crate::router::{Handler, HandlerResult, Resolution, Router};
use crate::security::rate_limit::retry_after_secs;
use crate::security::{RateDecision, RateLimiter};
use crate::server::{ConnectionHandle, ConnectionLimits, MessageHandler, Phase, Server, ServerError};

/// An HTTP/1.1 application.
///
/// # Examples
///
/// ```rust,no_run
/// use hasty::App;
///
/// #[tokio::main]
/// async fn main() -> Result<(), hasty::ServerError> {
///     let mut app = App::new();
///     app.get("/users/:id", |req, res| async move {
///         let id = req.param("id").unwrap_or_default().to_owned();
///         res.json(&serde_json::json!({ "id": id })).await?;
///         Ok(())
///     });
///     app.static_files("./public", "/assets");
///     app.listen().await
/// }
/// ```
#[derive(Default)]
pub struct App {
    router: Router,
    config: ServerConfig,
    limiter: Option<RateLimiter>,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let limiter = config.rate_limit.map(RateLimiter::new);
        Self {
            router: Router::new(),
            config,
            limiter,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Turns automatic CORS headers and preflight answers on or off.
    pub fn cors(&mut self, enabled: bool) -> &mut Self {
        self.config.cors = enabled;
        self
    }

    /// Enables per-client rate limiting.
    pub fn rate_limit(&mut self, limit: RateLimitConfig) -> &mut Self {
        self.config.rate_limit = Some(limit);
        self.limiter = Some(RateLimiter::new(limit));
        self
    }

    pub fn get<H, Fut>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.get(path, handler);
        self
    }

    pub fn post<H, Fut>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.post(path, handler);
        self
    }

    pub fn put<H, Fut>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.put(path, handler);
        self
    }

    pub fn delete<H, Fut>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.delete(path, handler);
        self
    }

    pub fn patch<H, Fut>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.patch(path, handler);
        self
    }

    pub fn head<H, Fut>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.head(path, handler);
        self
    }

    /// Registers an explicit `OPTIONS` handler, which takes precedence over
    /// automatic preflight handling for that path.
    pub fn options<H, Fut>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.options(path, handler);
        self
    }

    /// See [`Router::static_files`].
    pub fn static_files(&mut self, root: impl Into<PathBuf>, prefix: &str) -> &mut Self {
        self.router.static_files(root, prefix);
        self
    }

    /// Per-connection limits derived from the configuration.
    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            idle_timeout: self.config.idle_timeout,
            max_request_size: self.config.max_request_size,
        }
    }

    /// Binds `0.0.0.0:<port>` and serves until the process ends.
    pub async fn listen(self) -> Result<(), ServerError> {
        let server = Server::bind(format!("0.0.0.0:{}", self.config.port))
            .await?
            .with_limits(self.connection_limits());
        server.run(self).await
    }

    // Security headers, then CORS defaults. Handlers may overwrite either.
    fn decorate(&self, response: &Response, origin: Option<&str>) {
        for (name, value) in &self.config.security_headers {
            response.set_header(name.as_str(), value.as_str());
        }
        if self.config.cors {
            self.config.cors_policy.apply_for_origin(response, origin, &[]);
        }
    }

    async fn dispatch(&self, message: Bytes, conn: ConnectionHandle) {
        let peer = conn.peer_addr();
        let mut request = match Request::decode(&message, peer) {
            Ok(request) => request,
            Err(e) => {
                warn!(peer = ?peer, error = %e, "failed to parse request");
                // Framing was intact, so the connection carries on unless the
                // client asked to close or the version is unreadable.
                let response = conn.response(Request::keep_alive_hint(&message), false);
                self.decorate(&response, None);
                if let Err(e) = response.send_status(400).await {
                    debug!(error = %e, "failed to write 400 response");
                }
                return;
            }
        };

        let response = conn.response(request.is_keep_alive(), request.method() == Method::Head);
        self.decorate(&response, request.header("origin").as_deref());

        debug!(
            peer = ?peer,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        if let (Some(limiter), Some(peer)) = (&self.limiter, peer) {
            if let RateDecision::Limited { retry_after } = limiter.check(peer.ip()) {
                warn!(peer = %peer, "rate limit exceeded");
                response.set_header("Retry-After", retry_after_secs(retry_after).to_string());
                if let Err(e) = response.send_status(429).await {
                    debug!(error = %e, "failed to write 429 response");
                }
                return;
            }
        }

        conn.set_phase(Phase::Routing);
        let resolved = self
            .router
            .resolve(request.method(), request.path(), request.raw_path());
        let written = match resolved {
            Resolution::Matched { handler, params } => {
                request.set_params(params);
                let handler = Arc::clone(handler);
                self.run_handler(handler, request, response, &conn).await;
                return;
            }
            Resolution::Forbidden => {
                warn!(path = %request.path(), "path traversal rejected");
                response.send_status(403).await
            }
            Resolution::NotFound if request.method() == Method::Options && self.config.cors => {
                conn.set_phase(Phase::Responding);
                self.config
                    .cors_policy
                    .handle_preflight(&request, &response, true)
                    .await
                    .map(|_| ())
            }
            Resolution::NotFound => {
                warn!(method = %request.method(), path = %request.path(), "route not found");
                response.send_status(404).await
            }
        };
        if let Err(e) = written {
            debug!(error = %e, "failed to write response");
        }
    }

    async fn run_handler(
        &self,
        handler: Handler,
        request: Request,
        response: Response,
        conn: &ConnectionHandle,
    ) {
        conn.set_phase(Phase::Handling);
        // Spawned so a panic surfaces as a JoinError instead of unwinding
        // through the connection task.
        let outcome = tokio::spawn(handler(request, response.clone())).await;
        conn.set_phase(Phase::Responding);

        let failure = match outcome {
            Ok(Ok(())) => {
                if !response.headers_sent() {
                    if let Err(e) = response.end().await {
                        debug!(error = %e, "failed to finish response");
                    }
                }
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(join) => format!("handler panicked: {join}"),
        };
        error!(error = %failure, "handler failed");

        if response.headers_sent() {
            conn.close().await;
        } else if let Err(e) = response.send_status(500).await {
            debug!(error = %e, "failed to write 500 response");
        }
    }
}

impl MessageHandler for App {
    fn handle(
        &self,
        message: Bytes,
        conn: ConnectionHandle,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.dispatch(message, conn))
    }

    fn prepare(&self, response: &Response) {
        self.decorate(response, None);
    }
}
