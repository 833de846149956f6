//! Cross-Origin Resource Sharing headers and preflight answers.

use crate::http::{Method, Request, Response, ResponseError};

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const MAX_AGE: &str = "Access-Control-Max-Age";
pub const ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";

/// The CORS header table.
///
/// The defaults allow any origin:
///
/// | Header                             | Default                                   |
/// |------------------------------------|-------------------------------------------|
/// | `Access-Control-Allow-Origin`      | `*`                                       |
/// | `Access-Control-Allow-Methods`     | `GET, POST, PUT, DELETE, PATCH, OPTIONS`  |
/// | `Access-Control-Allow-Headers`     | `Content-Type, Authorization`             |
/// | `Access-Control-Max-Age`           | `86400`                                   |
/// | `Access-Control-Allow-Credentials` | `true`                                    |
///
/// Naming specific origins with [`allow_origin`](Self::allow_origin) switches
/// to an allow-list: a listed `Origin` is echoed back (with `Vary: Origin`),
/// and any other origin gets no `Access-Control-Allow-Origin` at all.
///
/// # Examples
///
/// ```
/// use hasty::security::CorsPolicy;
///
/// let cors = CorsPolicy::new()
///     .allow_origin("https://app.example.com")
///     .allow_header("X-Request-Id")
///     .max_age(600);
/// assert!(cors.allows_origin("https://app.example.com"));
/// assert!(!cors.allows_origin("https://evil.example"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    // `None` allows any origin.
    allowed_origins: Option<Vec<String>>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
    max_age: u64,
    allow_credentials: bool,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsPolicy {
    pub fn new() -> Self {
        Self {
            allowed_origins: None,
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
                .map(str::to_owned)
                .to_vec(),
            allowed_headers: vec!["Content-Type".to_owned(), "Authorization".to_owned()],
            max_age: 86_400,
            allow_credentials: true,
        }
    }

    /// Adds an allowed origin. `"*"` goes back to allowing any origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        if origin == "*" {
            self.allowed_origins = None;
        } else {
            self.allowed_origins.get_or_insert_with(Vec::new).push(origin);
        }
        self
    }

    /// Adds a method to `Access-Control-Allow-Methods`.
    #[must_use]
    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        let method = method.into();
        if !self.allowed_methods.iter().any(|m| m.eq_ignore_ascii_case(&method)) {
            self.allowed_methods.push(method);
        }
        self
    }

    /// Adds a header name to `Access-Control-Allow-Headers`.
    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        let header = header.into();
        if !self.allowed_headers.iter().any(|h| h.eq_ignore_ascii_case(&header)) {
            self.allowed_headers.push(header);
        }
        self
    }

    /// Sets `Access-Control-Max-Age`, in seconds.
    #[must_use]
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = seconds;
        self
    }

    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        match &self.allowed_origins {
            None => true,
            Some(list) => list.iter().any(|o| o == origin),
        }
    }

    /// The default header table for a request from `origin`.
    fn table(&self, origin: Option<&str>) -> Vec<(&'static str, String)> {
        let mut table = Vec::with_capacity(6);
        match (&self.allowed_origins, origin) {
            (None, _) => table.push((ALLOW_ORIGIN, "*".to_owned())),
            (Some(_), Some(origin)) if self.allows_origin(origin) => {
                table.push((ALLOW_ORIGIN, origin.to_owned()));
                table.push(("Vary", "Origin".to_owned()));
            }
            (Some(_), _) => {}
        }
        table.push((ALLOW_METHODS, self.allowed_methods.join(", ")));
        table.push((ALLOW_HEADERS, self.allowed_headers.join(", ")));
        table.push((MAX_AGE, self.max_age.to_string()));
        if self.allow_credentials {
            table.push((ALLOW_CREDENTIALS, "true".to_owned()));
        }
        table
    }

    /// Adds the CORS headers to `response`.
    ///
    /// Does nothing when `enabled` is false. Entries of `custom_headers` are
    /// always written; default entries only when the response does not carry
    /// that header yet.
    pub fn apply_cors_headers(
        &self,
        response: &Response,
        enabled: bool,
        custom_headers: &[(&str, &str)],
    ) {
        if enabled {
            self.apply_for_origin(response, None, custom_headers);
        }
    }

    /// Like [`apply_cors_headers`](Self::apply_cors_headers) for a request
    /// that sent `Origin: origin`, so an allow-list can echo it.
    pub fn apply_for_origin(
        &self,
        response: &Response,
        origin: Option<&str>,
        custom_headers: &[(&str, &str)],
    ) {
        for (name, value) in self.table(origin) {
            let custom = custom_headers
                .iter()
                .any(|(custom, _)| custom.eq_ignore_ascii_case(name));
            if !custom && !response.has_header(name) {
                response.set_header(name, value);
            }
        }
        for (name, value) in custom_headers {
            response.set_header(*name, *value);
        }
    }

    /// Answers a CORS preflight with `204 No Content`.
    ///
    /// The requested method and headers are echoed into the allow lists, with
    /// the configured lists as fallback. Returns `Ok(false)` without writing
    /// when `enabled` is false or the request is not `OPTIONS`.
    pub async fn handle_preflight(
        &self,
        request: &Request,
        response: &Response,
        enabled: bool,
    ) -> Result<bool, ResponseError> {
        if !enabled || request.method() != Method::Options {
            return Ok(false);
        }

        let requested_method = request
            .header("access-control-request-method")
            .map(|m| m.into_owned())
            .unwrap_or_else(|| self.allowed_methods.join(", "));
        let requested_headers = request
            .header("access-control-request-headers")
            .map(|h| h.into_owned())
            .unwrap_or_else(|| self.allowed_headers.join(", "));

        let origin = request.header("origin");
        self.apply_for_origin(
            response,
            origin.as_deref(),
            &[
                (ALLOW_METHODS, requested_method.as_str()),
                (ALLOW_HEADERS, requested_headers.as_str()),
            ],
        );
        response.status(204)?.send("").await?;
        Ok(true)
    }
}
