//! Server configuration.
//!
//! Everything is supplied programmatically. Fields are public so a
//! configuration can be written as a struct literal over the defaults:
//!
//! ```
//! use std::time::Duration;
//! use hasty::config::{RateLimitConfig, ServerConfig};
//!
//! let config = ServerConfig {
//!     port: 8080,
//!     idle_timeout: Duration::from_secs(5),
//!     rate_limit: Some(RateLimitConfig::per_minute(120)),
//!     ..ServerConfig::default()
//! };
//! assert!(!config.cors);
//! assert_eq!(config.max_request_size, 8 * 1024 * 1024);
//! ```

use std::time::Duration;

use crate::security::cors::CorsPolicy;

/// Default port for [`App::listen`](crate::App::listen).
pub const DEFAULT_PORT: u16 = 3000;

/// Default idle timeout on a connection waiting for bytes.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on one buffered request, header block plus body (8 MiB).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Connection and protocol settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port bound by [`App::listen`](crate::App::listen) on all interfaces
    /// (default: `3000`). `0` picks an ephemeral port.
    pub port: u16,

    /// How long a connection may sit without sending bytes before it is
    /// answered with `408 Request Timeout` and closed (default: 30 s).
    pub idle_timeout: Duration,

    /// Largest request accepted, in bytes (default: 8 MiB). Anything bigger is
    /// answered with `413 Payload Too Large` and the connection is closed.
    pub max_request_size: usize,

    /// Whether CORS headers are added and preflights answered automatically
    /// (default: `false`; turn on with [`App::cors`](crate::App::cors)).
    pub cors: bool,

    /// Header values used when [`cors`](Self::cors) is on.
    pub cors_policy: CorsPolicy,

    /// Headers added to every response before the handler runs. A handler can
    /// overwrite them.
    pub security_headers: Vec<(String, String)>,

    /// Per-client request throttling; off by default.
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            cors: false,
            cors_policy: CorsPolicy::default(),
            security_headers: default_security_headers(),
            rate_limit: None,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_request_size(mut self, bytes: usize) -> Self {
        self.max_request_size = bytes;
        self
    }

    #[must_use]
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    #[must_use]
    pub fn cors_policy(mut self, policy: CorsPolicy) -> Self {
        self.cors_policy = policy;
        self
    }

    /// Adds (or replaces) one security header.
    #[must_use]
    pub fn security_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.security_headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.security_headers.push((name, value)),
        }
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(limit);
        self
    }
}

fn default_security_headers() -> Vec<(String, String)> {
    [
        ("X-Content-Type-Options", "nosniff"),
        ("X-Frame-Options", "SAMEORIGIN"),
        ("Referrer-Policy", "no-referrer"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

/// Fixed-window request throttling per client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of one counting window.
    pub window: Duration,
    /// Requests allowed per client within one window.
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(Duration::from_secs(60), max_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert!(!config.cors);
        assert!(config.rate_limit.is_none());
        assert!(
            config
                .security_headers
                .iter()
                .any(|(k, v)| k == "X-Content-Type-Options" && v == "nosniff")
        );
    }

    #[test]
    fn security_header_replaces_case_insensitively() {
        let config = ServerConfig::default()
            .security_header("x-frame-options", "DENY")
            .security_header("Strict-Transport-Security", "max-age=63072000");
        let frame: Vec<_> = config
            .security_headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("x-frame-options"))
            .collect();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].1, "DENY");
        assert_eq!(config.security_headers.len(), 4);
    }

    #[test]
    fn builder_helpers() {
        let config = ServerConfig::default()
            .port(0)
            .cors(true)
            .max_request_size(1024)
            .rate_limit(RateLimitConfig::per_minute(10));
        assert_eq!(config.port, 0);
        assert!(config.cors);
        assert_eq!(config.max_request_size, 1024);
        assert_eq!(config.rate_limit.unwrap().window, Duration::from_secs(60));
    }
}
