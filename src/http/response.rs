//! HTTP/1.1 response encoding.
//!
//! A [`Response`] is a handle a handler writes through. The status line and
//! header block are serialized into one buffer, the way a reply is assembled
//! before it touches the socket, then written together with the body by one
//! of the terminal operations ([`send`](Response::send),
//! [`json`](Response::json), [`send_file`](Response::send_file),
//! [`download`](Response::download), [`send_status`](Response::send_status),
//! [`end`](Response::end)). Only the first terminal operation reaches the wire.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, warn};

use super::mime::mime_for_path;
use super::{Headers, StatusCode};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Value of the `X-Powered-By` header carried by every response.
pub const POWERED_BY: &str = "hasty";

/// Errors raised while building or writing a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("unrecognized status code {0}")]
    InvalidStatus(u16),

    #[error("failed to serialize JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),

    #[error("file stream {path:?} failed after headers were sent: {source}")]
    Stream {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A body for [`Response::send`].
///
/// The variant decides the inferred `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Bytes(Bytes),
    Json(Value),
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The write half of one connection, shared by every response it carries.
pub(crate) struct Outbound {
    writer: tokio::sync::Mutex<BoxWriter>,
    closed: AtomicBool,
}

impl Outbound {
    pub(crate) fn new<W>(writer: W) -> Arc<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Arc::new(Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes `bytes` in full and flushes.
    pub(crate) async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    /// Shuts down the write side. Later calls are no-ops.
    pub(crate) async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut writer = self.writer.lock().await;
        // The peer may already be gone; nothing useful to do with the error.
        let _ = writer.shutdown().await;
    }
}

struct Meta {
    status: StatusCode,
    headers: Headers,
    headers_sent: bool,
}

struct Exchange {
    meta: Mutex<Meta>,
    outbound: Arc<Outbound>,
    keep_alive: bool,
    head_only: bool,
}

/// The reply to one request.
///
/// Cloning yields another handle to the same reply, so a supervisor can keep
/// one while the handler owns another. All methods take `&self`.
#[derive(Clone)]
pub struct Response {
    inner: Arc<Exchange>,
}

impl Response {
    /// Creates a `200 OK` response writing to `outbound`.
    ///
    /// `keep_alive` is fixed for the lifetime of the response. `head_only`
    /// suppresses body bytes while keeping the computed `Content-Length`.
    pub(crate) fn new(outbound: Arc<Outbound>, keep_alive: bool, head_only: bool) -> Self {
        let mut headers = Headers::with_capacity(8);
        headers.set("X-Powered-By", POWERED_BY);
        Self {
            inner: Arc::new(Exchange {
                meta: Mutex::new(Meta {
                    status: StatusCode::Ok,
                    headers,
                    headers_sent: false,
                }),
                outbound,
                keep_alive,
                head_only,
            }),
        }
    }

    fn meta(&self) -> MutexGuard<'_, Meta> {
        self.inner.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the status code.
    ///
    /// Returns `self` so a terminal operation can follow:
    /// `res.status(201)?.json(&item).await?`.
    ///
    /// # Errors
    ///
    /// [`ResponseError::InvalidStatus`] if `code` is not a recognized status.
    pub fn status(&self, code: u16) -> Result<&Self, ResponseError> {
        let status = StatusCode::from_u16(code).ok_or(ResponseError::InvalidStatus(code))?;
        let mut meta = self.meta();
        if meta.headers_sent {
            warn!(status = code, "status set after headers were sent, ignoring");
        } else {
            meta.status = status;
        }
        Ok(self)
    }

    /// Sets a header. Names are case-sensitive and the last write wins.
    ///
    /// Ignored with a warning once headers are on the wire, or when the name
    /// or value contains CR or LF.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        let name = name.into();
        let value = value.into();
        if [&name, &value].iter().any(|s| s.contains(['\r', '\n'])) {
            warn!(header = %name.escape_debug(), "line break in header, ignoring");
            return self;
        }

        let mut meta = self.meta();
        if meta.headers_sent {
            warn!(header = %name, "header set after headers were sent, ignoring");
        } else {
            meta.headers.set(name, value);
        }
        self
    }

    /// Returns the current status code.
    pub fn status_code(&self) -> StatusCode {
        self.meta().status
    }

    /// Returns a header value (case-insensitive lookup).
    pub fn header(&self, name: &str) -> Option<String> {
        self.meta().headers.get(name).map(str::to_owned)
    }

    /// Returns `true` if a header with this name (any case) is set.
    pub fn has_header(&self, name: &str) -> bool {
        self.meta().headers.contains(name)
    }

    /// Returns `true` once a terminal operation has started writing.
    pub fn headers_sent(&self) -> bool {
        self.meta().headers_sent
    }

    /// Returns `true` if the connection stays open after this response.
    pub fn keep_alive(&self) -> bool {
        self.inner.keep_alive
    }

    /// Sends a body, inferring `Content-Type` unless one was set.
    ///
    /// JSON values go through [`json`](Self::json). Text that looks like a
    /// whole HTML document is sent as `text/html`, other text as `text/plain`,
    /// and bytes as `application/octet-stream`.
    pub async fn send(&self, payload: impl Into<Payload>) -> Result<(), ResponseError> {
        match payload.into() {
            Payload::Json(value) => self.json(&value).await,
            Payload::Text(text) => {
                let content_type = if looks_like_markup(&text) {
                    TEXT_HTML
                } else {
                    TEXT_PLAIN
                };
                self.write_body(Bytes::from(text), content_type).await
            }
            Payload::Bytes(bytes) => self.write_body(bytes, OCTET_STREAM).await,
        }
    }

    /// Serializes `value` and sends it as `application/json`.
    pub async fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ResponseError> {
        if self.already_sent() {
            return Ok(());
        }
        let body = serde_json::to_vec(value)?;
        self.write_body(Bytes::from(body), APPLICATION_JSON).await
    }

    /// Sets `code` and sends its reason phrase as the body.
    pub async fn send_status(&self, code: u16) -> Result<(), ResponseError> {
        self.status(code)?;
        let reason = self.status_code().canonical_reason();
        self.write_body(Bytes::from_static(reason.as_bytes()), TEXT_PLAIN)
            .await
    }

    /// Finishes the response with an empty body, keeping any status and
    /// headers already set.
    pub async fn end(&self) -> Result<(), ResponseError> {
        self.write_body(Bytes::new(), TEXT_PLAIN).await
    }

    /// Streams a file as the body.
    ///
    /// `Content-Type` comes from the file extension unless set explicitly.
    /// A missing path (or one that is not a regular file) is answered with
    /// `404 File not found`; any other failure before the headers go out with
    /// `500 Error serving file`.
    ///
    /// # Errors
    ///
    /// [`ResponseError::Stream`] when reading fails after the headers were
    /// written. The connection is closed in that case.
    pub async fn send_file(&self, path: impl AsRef<Path>) -> Result<(), ResponseError> {
        self.stream_file(path.as_ref(), None).await
    }

    /// Like [`send_file`](Self::send_file), adding
    /// `Content-Disposition: attachment` with an optional file name.
    pub async fn download(
        &self,
        path: impl AsRef<Path>,
        filename: Option<&str>,
    ) -> Result<(), ResponseError> {
        let disposition = match filename {
            Some(name) => format!("attachment; filename=\"{}\"", quote_filename(name)),
            None => "attachment".to_owned(),
        };
        self.stream_file(path.as_ref(), Some(disposition)).await
    }

    async fn stream_file(&self, path: &Path, disposition: Option<String>) -> Result<(), ResponseError> {
        if self.already_sent() {
            return Ok(());
        }

        let opened = match tokio::fs::File::open(path).await {
            Ok(file) => file.metadata().await.map(|meta| (file, meta)),
            Err(e) => Err(e),
        };
        let (file, len) = match opened {
            Ok((file, meta)) if meta.is_file() => (file, meta.len()),
            Ok(_) => return self.reply_text(404, "File not found").await,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return self.reply_text(404, "File not found").await;
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open file");
                return self.reply_text(500, "Error serving file").await;
            }
        };

        if let Some(disposition) = disposition {
            self.set_header("Content-Disposition", disposition);
        }
        let Some((head, include_body)) = self.begin(mime_for_path(path), len) else {
            return Ok(());
        };

        let outbound = &self.inner.outbound;
        let streamed = async {
            let mut writer = outbound.writer.lock().await;
            writer.write_all(&head).await.map_err(ResponseError::Io)?;
            if include_body {
                let copied = tokio::io::copy(&mut file.take(len), &mut *writer)
                    .await
                    .map_err(|source| ResponseError::Stream {
                        path: path.to_owned(),
                        source,
                    })?;
                if copied != len {
                    return Err(ResponseError::Stream {
                        path: path.to_owned(),
                        source: io::Error::new(io::ErrorKind::UnexpectedEof, "file shrank while streaming"),
                    });
                }
            }
            writer.flush().await.map_err(ResponseError::Io)
        }
        .await;

        if let Err(e) = streamed {
            outbound.shutdown().await;
            return Err(e);
        }
        self.finish().await;
        Ok(())
    }

    // Error replies for file operations replace whatever the handler staged.
    async fn reply_text(&self, code: u16, text: &'static str) -> Result<(), ResponseError> {
        self.status(code)?;
        self.set_header("Content-Type", TEXT_PLAIN);
        self.write_body(Bytes::from_static(text.as_bytes()), TEXT_PLAIN)
            .await
    }

    async fn write_body(&self, body: Bytes, content_type: &str) -> Result<(), ResponseError> {
        let Some((mut buf, include_body)) = self.begin(content_type, body.len() as u64) else {
            return Ok(());
        };
        if include_body {
            buf.put_slice(&body);
        }

        if let Err(e) = self.inner.outbound.write_all(&buf).await {
            self.inner.outbound.shutdown().await;
            return Err(ResponseError::Io(e));
        }
        self.finish().await;
        Ok(())
    }

    fn already_sent(&self) -> bool {
        let sent = self.headers_sent();
        if sent {
            warn!("response already sent, ignoring");
        }
        sent
    }

    // Claims the response and serializes the head. `None` means another
    // terminal operation got there first.
    fn begin(&self, default_type: &str, body_len: u64) -> Option<(BytesMut, bool)> {
        let mut meta = self.meta();
        if meta.headers_sent {
            warn!("response already sent, ignoring");
            return None;
        }
        meta.headers_sent = true;

        let forbids_body = meta.status.forbids_body();
        let content_length = (!forbids_body).then_some(body_len);
        let head = encode_head(
            meta.status,
            &meta.headers,
            default_type,
            content_length,
            self.inner.keep_alive,
        );
        let include_body = !forbids_body && !self.inner.head_only;

        let mut buf = BytesMut::with_capacity(head.len() + if include_body { body_len as usize } else { 0 });
        buf.put(head);
        Some((buf, include_body))
    }

    async fn finish(&self) {
        if !self.inner.keep_alive {
            self.inner.outbound.shutdown().await;
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.meta();
        f.debug_struct("Response")
            .field("status", &meta.status)
            .field("headers", &meta.headers)
            .field("headers_sent", &meta.headers_sent)
            .field("keep_alive", &self.inner.keep_alive)
            .field("head_only", &self.inner.head_only)
            .finish()
    }
}

/// Serializes a status line and header block.
///
/// `Content-Type` falls back to `default_type` when unset; `Connection` always
/// reflects `keep_alive`; `Content-Length` is written only when given.
fn encode_head(
    status: StatusCode,
    headers: &Headers,
    default_type: &str,
    content_length: Option<u64>,
    keep_alive: bool,
) -> BytesMut {
    let mut headers = headers.clone();
    if !headers.contains("content-type") {
        headers.set("Content-Type", default_type);
    }
    headers.remove("connection");
    headers.set("Connection", if keep_alive { "keep-alive" } else { "close" });
    headers.remove("content-length");
    if let Some(len) = content_length {
        headers.set("Content-Length", len.to_string());
    }

    let mut buf = BytesMut::with_capacity(128 + headers.len() * 64);
    buf.put(format!("HTTP/1.1 {status}\r\n").as_bytes());
    buf.put(headers.to_string().as_bytes());
    buf.put(&b"\r\n"[..]);
    buf
}

fn looks_like_markup(text: &str) -> bool {
    let trimmed = text.trim();
    let lower_start = |prefix: &str| {
        trimmed
            .get(..prefix.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(prefix))
    };
    let ends_html = trimmed.len() >= 7
        && trimmed
            .get(trimmed.len() - 7..)
            .is_some_and(|s| s.eq_ignore_ascii_case("</html>"));
    (lower_start("<!doctype html") || lower_start("<html")) && ends_html
}

// Control characters are dropped; quotes and backslashes escaped.
fn quote_filename(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len());
    for c in name.chars().filter(|c| !c.is_control()) {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn exchange(keep_alive: bool, head_only: bool) -> (Response, DuplexStream) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        (Response::new(Outbound::new(server), keep_alive, head_only), client)
    }

    async fn wire(res: Response, mut client: DuplexStream) -> String {
        drop(res);
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn plain_text() {
        let (res, client) = exchange(true, false);
        res.send("Hello").await.unwrap();
        let s = wire(res, client).await;
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.contains("Connection: keep-alive\r\n"));
        assert!(s.contains("X-Powered-By: hasty\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[tokio::test]
    async fn markup_is_sent_as_html() {
        let (res, client) = exchange(true, false);
        res.send("  <!DOCTYPE html><html><body>hi</body></html>\n").await.unwrap();
        assert!(wire(res, client).await.contains("Content-Type: text/html; charset=utf-8\r\n"));
    }

    #[tokio::test]
    async fn fragment_is_not_markup() {
        assert!(!looks_like_markup("<p>hi</p>"));
        assert!(!looks_like_markup("<html>unterminated"));
        assert!(looks_like_markup("<HTML></HTML>"));
    }

    #[tokio::test]
    async fn explicit_content_type_wins() {
        let (res, client) = exchange(true, false);
        res.set_header("Content-Type", "text/csv");
        res.send("a,b\n1,2").await.unwrap();
        let s = wire(res, client).await;
        assert!(s.contains("Content-Type: text/csv\r\n"));
        assert_eq!(s.matches("Content-Type").count(), 1);
    }

    #[tokio::test]
    async fn bytes_are_octet_stream() {
        let (res, client) = exchange(true, false);
        res.send(vec![0u8, 1, 2]).await.unwrap();
        let s = wire(res, client).await;
        assert!(s.contains("Content-Type: application/octet-stream\r\n"));
        assert!(s.contains("Content-Length: 3\r\n"));
    }

    #[tokio::test]
    async fn json_body_and_status() {
        let (res, client) = exchange(true, false);
        res.status(201).unwrap().json(&json!({"id": 7})).await.unwrap();
        let s = wire(res, client).await;
        assert!(s.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(s.contains("Content-Type: application/json; charset=utf-8\r\n"));
        assert!(s.ends_with("\r\n\r\n{\"id\":7}"));
    }

    #[tokio::test]
    async fn json_payload_through_send() {
        let (res, client) = exchange(true, false);
        res.send(json!([1, 2])).await.unwrap();
        let s = wire(res, client).await;
        assert!(s.contains("application/json"));
        assert!(s.ends_with("[1,2]"));
    }

    #[tokio::test]
    async fn unknown_status_is_rejected() {
        let (res, _client) = exchange(true, false);
        assert!(matches!(res.status(299), Err(ResponseError::InvalidStatus(299))));
        assert_eq!(res.status_code(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn second_terminal_call_writes_nothing() {
        let (res, client) = exchange(true, false);
        res.send("first").await.unwrap();
        res.send("second").await.unwrap();
        res.end().await.unwrap();
        res.set_header("X-Late", "1");
        let s = wire(res, client).await;
        assert_eq!(s.matches("HTTP/1.1").count(), 1);
        assert!(s.ends_with("first"));
        assert!(!s.contains("X-Late"));
    }

    #[tokio::test]
    async fn end_keeps_status_and_headers() {
        let (res, client) = exchange(true, false);
        res.status(202).unwrap().set_header("X-Job", "42");
        res.end().await.unwrap();
        let s = wire(res, client).await;
        assert!(s.starts_with("HTTP/1.1 202 Accepted\r\n"));
        assert!(s.contains("X-Job: 42\r\n"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[tokio::test]
    async fn send_status_uses_reason_phrase() {
        let (res, client) = exchange(true, false);
        res.send_status(418).await.unwrap();
        let s = wire(res, client).await;
        assert!(s.starts_with("HTTP/1.1 418 I'm a teapot\r\n"));
        assert!(s.ends_with("I'm a teapot"));
    }

    #[tokio::test]
    async fn head_keeps_length_without_body() {
        let (res, client) = exchange(true, true);
        res.send("twelve bytes").await.unwrap();
        let s = wire(res, client).await;
        assert!(s.contains("Content-Length: 12\r\n"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn no_content_has_no_length_or_body() {
        let (res, client) = exchange(true, false);
        res.status(204).unwrap().send("ignored").await.unwrap();
        let s = wire(res, client).await;
        assert!(s.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(!s.contains("Content-Length"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn close_shuts_down_writer() {
        let (res, mut client) = exchange(false, false);
        let keep = res.clone();
        res.send("bye").await.unwrap();
        // A live handle remains, so EOF can only come from the shutdown.
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("Connection: close\r\n"));
        assert!(keep.inner.outbound.is_closed());
    }

    #[tokio::test]
    async fn send_file_streams_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, b"{\"ok\":true}").unwrap();

        let (res, client) = exchange(true, false);
        res.send_file(&path).await.unwrap();
        let s = wire(res, client).await;
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: application/json\r\n"));
        assert!(s.contains("Content-Length: 11\r\n"));
        assert!(s.ends_with("{\"ok\":true}"));
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let (res, client) = exchange(true, false);
        res.send_file(dir.path().join("nope.txt")).await.unwrap();
        let s = wire(res, client).await;
        assert!(s.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(s.ends_with("File not found"));
    }

    #[tokio::test]
    async fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let (res, client) = exchange(true, false);
        res.send_file(dir.path()).await.unwrap();
        assert!(wire(res, client).await.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn download_sets_disposition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"a,b").unwrap();

        let (res, client) = exchange(true, false);
        res.download(&path, Some("q3.csv")).await.unwrap();
        let s = wire(res, client).await;
        assert!(s.contains("Content-Disposition: attachment; filename=\"q3.csv\"\r\n"));
        assert!(s.contains("Content-Type: text/csv\r\n"));

        let (res, client) = exchange(true, false);
        res.download(&path, None).await.unwrap();
        assert!(wire(res, client).await.contains("Content-Disposition: attachment\r\n"));
    }

    #[tokio::test]
    async fn download_name_cannot_split_the_head() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"a,b").unwrap();

        let (res, client) = exchange(true, false);
        res.download(&path, Some("evil\r\nSet-Cookie: x=1\r\n\"q\".csv"))
            .await
            .unwrap();
        let s = wire(res, client).await;
        assert!(s.contains(
            "Content-Disposition: attachment; filename=\"evilSet-Cookie: x=1\\\"q\\\".csv\"\r\n"
        ));
        assert!(!s.contains("\r\nSet-Cookie"));
    }

    #[tokio::test]
    async fn header_with_line_break_is_refused() {
        let (res, client) = exchange(true, false);
        res.set_header("X-Note", "ok\r\nSet-Cookie: x=1");
        res.set_header("X-Bad\nName", "v");
        res.set_header("X-Fine", "yes");
        assert!(!res.has_header("X-Note"));
        res.end().await.unwrap();
        let s = wire(res, client).await;
        assert!(!s.contains("Set-Cookie"));
        assert!(!s.contains("X-Bad"));
        assert!(s.contains("X-Fine: yes\r\n"));
    }
}
