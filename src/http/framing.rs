//! Message framing — cutting a TCP byte stream into whole HTTP requests.
//!
//! Bytes arrive in arbitrary chunks. [`MessageFramer`] accumulates them and
//! hands out one complete message at a time: the header block up to and
//! including the blank line, plus exactly `Content-Length` body bytes. A single
//! read may contain several pipelined requests; each call to
//! [`MessageFramer::next_message`] yields the next one.
//!
//! Only `Content-Length` framing is understood. A message without that header
//! has an empty body, so a chunked body will be mis-framed and surface as a
//! decode failure on the following "request".

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// The blank line that ends a header block.
const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors that make the remaining bytes on a connection unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("request exceeds the maximum size of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("invalid Content-Length header: {value:?}")]
    InvalidContentLength { value: String },
}

/// Per-connection reassembly buffer.
///
/// # Examples
///
/// ```
/// use hasty::http::MessageFramer;
///
/// let mut framer = MessageFramer::new(1024);
/// framer.extend(b"GET /a HTTP/1.1\r\n\r\nGET /b HT");
///
/// let first = framer.next_message().unwrap().unwrap();
/// assert_eq!(&first[..], b"GET /a HTTP/1.1\r\n\r\n");
/// assert!(framer.next_message().unwrap().is_none());
///
/// framer.extend(b"TP/1.1\r\n\r\n");
/// assert!(framer.next_message().unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct MessageFramer {
    buf: BytesMut,
    max_message_size: usize,
    // Offset up to which the buffer is known not to contain a terminator.
    scanned: usize,
}

impl MessageFramer {
    /// Initial buffer capacity; grows on demand.
    const INITIAL_CAPACITY: usize = 4096;

    /// Creates a framer that rejects messages larger than `max_message_size` bytes.
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(Self::INITIAL_CAPACITY.min(max_message_size.max(1))),
            max_message_size,
            scanned: 0,
        }
    }

    /// Returns the buffer so a reader can append to it directly
    /// (e.g. with `AsyncReadExt::read_buf`).
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Appends a received chunk.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of received bytes not yet handed out as a message.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` when no unconsumed bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Extracts the next complete message, if the buffer holds one.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// - [`FrameError::TooLarge`] — no terminator within the size limit, or the
    ///   declared message length exceeds it.
    /// - [`FrameError::InvalidContentLength`] — the length header cannot be trusted.
    pub fn next_message(&mut self) -> Result<Option<Bytes>, FrameError> {
        self.skip_leading_blank_lines();

        let Some(head_len) = self.find_terminator() else {
            if self.buf.len() > self.max_message_size {
                return Err(FrameError::TooLarge {
                    max_bytes: self.max_message_size,
                });
            }
            return Ok(None);
        };

        let content_length = declared_content_length(&self.buf[..head_len])?;
        let total = head_len
            .saturating_add(TERMINATOR.len())
            .saturating_add(content_length);

        if total > self.max_message_size {
            return Err(FrameError::TooLarge {
                max_bytes: self.max_message_size,
            });
        }
        if self.buf.len() < total {
            return Ok(None);
        }

        self.scanned = 0;
        Ok(Some(self.buf.split_to(total).freeze()))
    }

    // RFC 9112 §2.2: ignore empty lines received before a request line.
    fn skip_leading_blank_lines(&mut self) {
        while self.buf.starts_with(b"\r\n") {
            self.buf.advance(2);
            self.scanned = self.scanned.saturating_sub(2);
        }
    }

    // Returns the length of the header block (excluding the terminator).
    fn find_terminator(&mut self) -> Option<usize> {
        let start = self.scanned.min(self.buf.len());
        let found = self.buf[start..]
            .windows(TERMINATOR.len())
            .position(|w| w == TERMINATOR)
            .map(|pos| start + pos);

        if found.is_none() {
            // A terminator may straddle the next chunk, so back off by its length - 1.
            self.scanned = self.buf.len().saturating_sub(TERMINATOR.len() - 1);
        }
        found
    }
}

/// Reads `Content-Length` out of a raw header block without decoding the rest.
///
/// Absent means zero. Repeated fields must agree.
fn declared_content_length(head: &[u8]) -> Result<usize, FrameError> {
    let mut declared: Option<usize> = None;

    for line in head.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        if !line[..colon].trim_ascii().eq_ignore_ascii_case(b"content-length") {
            continue;
        }

        let raw = line[colon + 1..].trim_ascii();
        let invalid = || FrameError::InvalidContentLength {
            value: String::from_utf8_lossy(raw).into_owned(),
        };
        if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let value: usize = std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(invalid)?;

        match declared {
            Some(previous) if previous != value => return Err(invalid()),
            _ => declared = Some(value),
        }
    }

    Ok(declared.unwrap_or(0))
}
