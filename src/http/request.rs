//! HTTP/1.1 request decoding.
//!
//! [`Request::decode`] turns one complete message, as cut by
//! [`MessageFramer`](super::MessageFramer), into a fixed-shape [`Request`].
//! Parsing works on slices of the input and never rewrites it.

use std::borrow::Cow;
use std::net::SocketAddr;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::query::{Query, percent_decode};
use super::{Headers, Method, Version};
use crate::router::PathParams;

/// Reasons a framed message cannot be decoded into a [`Request`].
///
/// Every variant maps to `400 Bad Request`; none is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing request line")]
    MissingRequestLine,

    #[error("malformed request line {line:?}: expected 3 tokens, found {found}")]
    RequestLine { line: String, found: usize },

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("invalid percent-encoding in path {0:?}")]
    InvalidEncoding(String),
}

/// A decoded request body.
///
/// Which variant appears depends on the method and the declared
/// `Content-Type`; see [`Request::decode`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No body bytes, or a method whose body is not interpreted.
    #[default]
    Empty,
    /// Bytes of a content type the decoder does not interpret.
    Raw(Bytes),
    /// `application/json`. Invalid JSON decodes to an empty object.
    Json(Value),
    /// `application/x-www-form-urlencoded`.
    Form(Query),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&Query> {
        match self {
            Body::Form(form) => Some(form),
            _ => None,
        }
    }

    /// The raw bytes, for [`Body::Raw`] only.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The raw bytes as text, replacing invalid UTF-8.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.as_bytes().map(String::from_utf8_lossy)
    }
}

/// What a browser asked for in a CORS preflight (`OPTIONS`) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
    /// The `Origin` header, if sent.
    pub origin: Option<String>,
    /// `Access-Control-Request-Method`, or `*` when absent.
    pub method: String,
    /// `Access-Control-Request-Headers`, or empty when absent.
    pub headers: String,
}

/// A fully decoded HTTP/1.1 request.
///
/// # Examples
///
/// ```
/// use hasty::http::{Method, Request};
///
/// let raw = b"GET /hello%20world?name=ferris HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let request = Request::decode(raw, None).unwrap();
///
/// assert_eq!(request.method(), Method::Get);
/// assert_eq!(request.path(), "/hello world");
/// assert_eq!(request.query_param("name"), Some("ferris"));
/// assert_eq!(request.header("HOST").as_deref(), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    raw_path: String,
    version: Version,
    headers: Headers,
    query: Query,
    raw_query: Option<String>,
    body: Body,
    raw_body: Bytes,
    peer: Option<SocketAddr>,
    preflight: Option<Preflight>,
    params: PathParams,
}

impl Request {
    /// Decodes one complete message.
    ///
    /// The message is split at the first blank line. The request line must have
    /// exactly three whitespace-separated tokens: a method among the seven
    /// supported ones (any case), a target, and `HTTP/<digit>.<digit>`.
    /// Header lines are split at their first colon, with names lowercased and
    /// both sides trimmed; lines without a usable colon are skipped.
    ///
    /// For POST, PUT and PATCH the body is interpreted by `Content-Type`:
    /// JSON, URL-encoded form, or raw bytes. Other methods get
    /// [`Body::Empty`]; OPTIONS additionally records a [`Preflight`] summary.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] describing the first problem found.
    pub fn decode(raw: &[u8], peer: Option<SocketAddr>) -> Result<Self, ParseError> {
        let (head, body) = match raw.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(end) => (&raw[..end], &raw[end + 4..]),
            None => (raw, &[][..]),
        };
        let head = String::from_utf8_lossy(head);

        let mut lines = head.lines().filter(|line| !line.trim().is_empty());
        let request_line = lines.next().ok_or(ParseError::MissingRequestLine)?;

        let tokens: Vec<&str> = request_line.split_whitespace().collect();
        let [method, target, version] = tokens[..] else {
            return Err(ParseError::RequestLine {
                line: request_line.to_owned(),
                found: tokens.len(),
            });
        };
        let method: Method = method.parse()?;
        let version: Version = version.parse()?;

        let mut headers = Headers::new();
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            headers.append(name.to_ascii_lowercase(), value.trim());
        }

        let (raw_path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let path = percent_decode(raw_path)
            .map_err(|_| ParseError::InvalidEncoding(raw_path.to_owned()))?;
        let path = if path.is_empty() {
            "/".to_owned()
        } else {
            path.into_owned()
        };
        let query = raw_query.map(Query::parse).unwrap_or_default();

        // The framer already sliced exactly Content-Length bytes; trim anyway
        // when decoding a buffer that carries trailing data.
        let declared = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok());
        let body = match declared {
            Some(len) if len <= body.len() => &body[..len],
            _ => body,
        };
        let raw_body = Bytes::copy_from_slice(body);

        let decoded_body = if method.carries_body() && !raw_body.is_empty() {
            decode_body(headers.get("content-type"), &raw_body)
        } else {
            Body::Empty
        };

        let preflight = (method == Method::Options).then(|| Preflight {
            origin: headers.get("origin").map(str::to_owned),
            method: headers
                .get("access-control-request-method")
                .unwrap_or("*")
                .to_owned(),
            headers: headers
                .get_joined("access-control-request-headers")
                .map(Cow::into_owned)
                .unwrap_or_default(),
        });

        Ok(Self {
            method,
            path,
            raw_path: if raw_path.is_empty() { "/" } else { raw_path }.to_owned(),
            version,
            headers,
            query,
            raw_query: raw_query.map(str::to_owned),
            body: decoded_body,
            raw_body,
            peer,
            preflight,
            params: PathParams::new(),
        })
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the percent-decoded request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the path exactly as it appeared on the request line.
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// Returns the protocol version from the request line.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request headers (names lowercased).
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a header value, with repeated fields joined by `", "`.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers.get_joined(name)
    }

    /// Returns the parsed query string.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Returns a decoded query parameter by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key)
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.raw_query.as_deref()
    }

    /// Returns the decoded body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the body bytes as received, regardless of how they were decoded.
    pub fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    /// Deserializes the raw body bytes as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.raw_body)
    }

    /// Returns the client's socket address, when known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Returns the CORS preflight summary for OPTIONS requests.
    pub fn preflight(&self) -> Option<&Preflight> {
        self.preflight.as_ref()
    }

    /// Returns the path parameters bound by the router.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Returns a single path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is sent.
    /// HTTP/1.0 defaults to close unless `Connection: keep-alive` is sent.
    pub fn is_keep_alive(&self) -> bool {
        keep_alive(Some(self.version), self.header("connection").as_deref())
    }

    /// Keep-alive for a message that failed to decode, read from whatever
    /// of its head is intact.
    ///
    /// An unreadable version means close; otherwise the same rules as
    /// [`is_keep_alive`](Self::is_keep_alive) apply to the raw `Connection`
    /// fields.
    ///
    /// ```
    /// use hasty::http::Request;
    ///
    /// assert!(Request::keep_alive_hint(b"BREW /pot HTTP/1.1\r\n\r\n"));
    /// assert!(!Request::keep_alive_hint(b"BREW /pot HTTP/1.1\r\nConnection: close\r\n\r\n"));
    /// assert!(!Request::keep_alive_hint(b"GET /\r\n\r\n"));
    /// ```
    pub fn keep_alive_hint(raw: &[u8]) -> bool {
        let head = match raw.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(end) => &raw[..end],
            None => raw,
        };
        let head = String::from_utf8_lossy(head);
        let mut lines = head.lines().filter(|line| !line.trim().is_empty());

        let version = lines.next().and_then(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens[..] {
                [_, _, version] => version.parse::<Version>().ok(),
                _ => None,
            }
        });
        let connection: Vec<&str> = lines
            .filter_map(|line| line.split_once(':'))
            .filter(|(name, _)| name.trim().eq_ignore_ascii_case("connection"))
            .map(|(_, value)| value.trim())
            .collect();
        let connection = (!connection.is_empty()).then(|| connection.join(", "));
        keep_alive(version, connection.as_deref())
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

// HTTP/1.1 and later stay open unless `close` is listed; HTTP/1.0 needs an
// explicit `keep-alive`. No version at all means close.
fn keep_alive(version: Option<Version>, connection: Option<&str>) -> bool {
    let Some(version) = version else {
        return false;
    };
    let Some(connection) = connection else {
        return version.keeps_alive_by_default();
    };
    let has = |token: &str| {
        connection
            .split(',')
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    };
    if has("close") {
        false
    } else if has("keep-alive") {
        true
    } else {
        version.keeps_alive_by_default()
    }
}

fn decode_body(content_type: Option<&str>, raw: &Bytes) -> Body {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

    if content_type.contains("application/json") {
        match serde_json::from_slice(raw) {
            Ok(value) => Body::Json(value),
            Err(e) => {
                warn!(error = %e, "invalid JSON body, substituting an empty object");
                Body::Json(Value::Object(Default::default()))
            }
        }
    } else if content_type.contains("application/x-www-form-urlencoded") {
        Body::Form(Query::parse(&String::from_utf8_lossy(raw)))
    } else {
        Body::Raw(raw.clone())
    }
}
