//! # hasty
//!
//! A minimal HTTP/1.1 server written directly on top of TCP streams.
//!
//! Bytes from each connection are cut into whole requests by
//! [`http::MessageFramer`], decoded into a [`Request`], matched against the
//! [`Router`], and answered through a [`Response`] that writes the status
//! line, headers and body itself. Connections are kept alive per HTTP/1.1
//! rules and pipelined requests are answered in order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hasty::App;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hasty::ServerError> {
//!     let mut app = App::new();
//!     app.get("/", |_req, res| async move {
//!         res.send("Hello, World!").await?;
//!         Ok(())
//!     });
//!     app.post("/echo", |req, res| async move {
//!         match req.body().as_json() {
//!             Some(value) => res.json(value).await?,
//!             None => res.status(400)?.send("expected JSON").await?,
//!         }
//!         Ok(())
//!     });
//!     app.listen().await
//! }
//! ```

pub mod app;
pub mod config;
pub mod http;
pub mod router;
pub mod security;
pub mod server;

pub use app::App;
pub use config::{RateLimitConfig, ServerConfig};
pub use http::{Body, Headers, Method, Payload, Request, Response, ResponseError, StatusCode};
pub use router::{HandlerError, HandlerResult, PathParams, Router};
pub use server::{MessageHandler, Server, ServerError, ShutdownHandle};
