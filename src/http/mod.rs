//! HTTP/1.1 protocol types, framing, decoding and encoding.
//!
//! This module provides the core HTTP primitives:
//! [`Method`], [`StatusCode`], [`Version`], [`Headers`], [`Request`], and [`Response`],
//! plus the [`framing`] reassembler that cuts a byte stream into messages.

use std::fmt;

pub mod framing;
pub mod headers;
pub mod mime;
pub mod query;
pub mod request;
pub mod response;

pub use framing::{FrameError, MessageFramer};
pub use headers::Headers;
pub use query::Query;
pub use request::{Body, ParseError, Preflight, Request};
pub use response::{Payload, Response, ResponseError};

macro_rules! status_codes {
    ($( $variant:ident = $code:literal => $reason:literal, )+) => {
        /// An HTTP response status code.
        ///
        /// Only the codes listed here are accepted by [`Response::status`]; anything
        /// else is rejected rather than written to the wire with a made-up reason.
        ///
        /// # Examples
        ///
        /// ```
        /// use hasty::http::StatusCode;
        ///
        /// let status = StatusCode::Ok;
        /// assert_eq!(status.as_u16(), 200);
        /// assert_eq!(status.canonical_reason(), "OK");
        /// assert_eq!(StatusCode::from_u16(418), Some(StatusCode::ImATeapot));
        /// assert_eq!(StatusCode::from_u16(299), None);
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum StatusCode {
            $( $variant = $code, )+
        }

        impl StatusCode {
            /// Returns the canonical reason phrase for this status code.
            pub fn canonical_reason(self) -> &'static str {
                match self {
                    $( Self::$variant => $reason, )+
                }
            }

            /// Looks up a recognized status code by its numeric value.
            pub fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    Continue = 100 => "Continue",
    SwitchingProtocols = 101 => "Switching Protocols",
    Processing = 102 => "Processing",
    EarlyHints = 103 => "Early Hints",

    Ok = 200 => "OK",
    Created = 201 => "Created",
    Accepted = 202 => "Accepted",
    NonAuthoritativeInformation = 203 => "Non-Authoritative Information",
    NoContent = 204 => "No Content",
    ResetContent = 205 => "Reset Content",
    PartialContent = 206 => "Partial Content",
    MultiStatus = 207 => "Multi-Status",
    AlreadyReported = 208 => "Already Reported",
    ImUsed = 226 => "IM Used",

    MultipleChoices = 300 => "Multiple Choices",
    MovedPermanently = 301 => "Moved Permanently",
    Found = 302 => "Found",
    SeeOther = 303 => "See Other",
    NotModified = 304 => "Not Modified",
    UseProxy = 305 => "Use Proxy",
    TemporaryRedirect = 307 => "Temporary Redirect",
    PermanentRedirect = 308 => "Permanent Redirect",

    BadRequest = 400 => "Bad Request",
    Unauthorized = 401 => "Unauthorized",
    PaymentRequired = 402 => "Payment Required",
    Forbidden = 403 => "Forbidden",
    NotFound = 404 => "Not Found",
    MethodNotAllowed = 405 => "Method Not Allowed",
    NotAcceptable = 406 => "Not Acceptable",
    ProxyAuthenticationRequired = 407 => "Proxy Authentication Required",
    RequestTimeout = 408 => "Request Timeout",
    Conflict = 409 => "Conflict",
    Gone = 410 => "Gone",
    LengthRequired = 411 => "Length Required",
    PreconditionFailed = 412 => "Precondition Failed",
    PayloadTooLarge = 413 => "Payload Too Large",
    UriTooLong = 414 => "URI Too Long",
    UnsupportedMediaType = 415 => "Unsupported Media Type",
    RangeNotSatisfiable = 416 => "Range Not Satisfiable",
    ExpectationFailed = 417 => "Expectation Failed",
    ImATeapot = 418 => "I'm a teapot",
    MisdirectedRequest = 421 => "Misdirected Request",
    UnprocessableEntity = 422 => "Unprocessable Entity",
    Locked = 423 => "Locked",
    FailedDependency = 424 => "Failed Dependency",
    TooEarly = 425 => "Too Early",
    UpgradeRequired = 426 => "Upgrade Required",
    PreconditionRequired = 428 => "Precondition Required",
    TooManyRequests = 429 => "Too Many Requests",
    RequestHeaderFieldsTooLarge = 431 => "Request Header Fields Too Large",
    UnavailableForLegalReasons = 451 => "Unavailable For Legal Reasons",

    InternalServerError = 500 => "Internal Server Error",
    NotImplemented = 501 => "Not Implemented",
    BadGateway = 502 => "Bad Gateway",
    ServiceUnavailable = 503 => "Service Unavailable",
    GatewayTimeout = 504 => "Gateway Timeout",
    HttpVersionNotSupported = 505 => "HTTP Version Not Supported",
    VariantAlsoNegotiates = 506 => "Variant Also Negotiates",
    InsufficientStorage = 507 => "Insufficient Storage",
    LoopDetected = 508 => "Loop Detected",
    NotExtended = 510 => "Not Extended",
    NetworkAuthenticationRequired = 511 => "Network Authentication Required",
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` for statuses whose responses never carry a body
    /// (1xx, `204 No Content`, `304 Not Modified`).
    pub fn forbids_body(self) -> bool {
        let code = self.as_u16();
        (100..200).contains(&code) || code == 204 || code == 304
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// An HTTP request method.
///
/// Only the seven methods the server routes are representable; any other token
/// on the request line is a decode failure.
///
/// # Examples
///
/// ```
/// use hasty::http::Method;
///
/// let method: Method = "get".parse().unwrap();
/// assert_eq!(method, Method::Get);
/// assert_eq!(method.as_str(), "GET");
/// assert!("TRACE".parse::<Method>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Returns `true` for the methods whose bodies the decoder interprets
    /// (POST, PUT, PATCH).
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => return Err(ParseError::UnsupportedMethod(s.to_owned())),
        })
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// The protocol version from a request line, `HTTP/<digit>.<digit>`.
///
/// # Examples
///
/// ```
/// use hasty::http::Version;
///
/// let v: Version = "HTTP/1.0".parse().unwrap();
/// assert_eq!(v, Version::HTTP_10);
/// assert_eq!(v.to_string(), "HTTP/1.0");
/// assert!("HTTP/1.10".parse::<Version>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    major: u8,
    minor: u8,
}

impl Version {
    pub const HTTP_10: Version = Version { major: 1, minor: 0 };
    pub const HTTP_11: Version = Version { major: 1, minor: 1 };

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    /// Whether persistent connections are the default for this version.
    ///
    /// Everything from HTTP/1.1 upward keeps the connection open unless told
    /// otherwise; HTTP/1.0 and older close by default.
    pub fn keeps_alive_by_default(&self) -> bool {
        (self.major, self.minor) >= (1, 1)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::HTTP_11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidVersion(s.to_owned());
        let digits = s.strip_prefix("HTTP/").ok_or_else(invalid)?.as_bytes();
        match digits {
            [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => Ok(Self {
                major: major - b'0',
                minor: minor - b'0',
            }),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lookup_rejects_unknown_codes() {
        assert_eq!(StatusCode::from_u16(404), Some(StatusCode::NotFound));
        assert_eq!(StatusCode::from_u16(999), None);
        assert_eq!(StatusCode::from_u16(0), None);
    }

    #[test]
    fn status_display() {
        assert_eq!(StatusCode::PayloadTooLarge.to_string(), "413 Payload Too Large");
    }

    #[test]
    fn bodiless_statuses() {
        assert!(StatusCode::NoContent.forbids_body());
        assert!(StatusCode::NotModified.forbids_body());
        assert!(StatusCode::Continue.forbids_body());
        assert!(!StatusCode::Ok.forbids_body());
    }

    #[test]
    fn method_is_case_normalized() {
        assert_eq!("Patch".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!("options".parse::<Method>().unwrap(), Method::Options);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = "CONNECT".parse::<Method>().unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedMethod(m) if m == "CONNECT"));
    }

    #[test]
    fn version_pattern() {
        assert_eq!("HTTP/1.1".parse::<Version>().unwrap(), Version::HTTP_11);
        assert_eq!("HTTP/2.0".parse::<Version>().unwrap().major(), 2);
        assert!("HTTP/1".parse::<Version>().is_err());
        assert!("http/1.1".parse::<Version>().is_err());
        assert!("HTTP/a.b".parse::<Version>().is_err());
    }

    #[test]
    fn keep_alive_defaults_by_version() {
        assert!(Version::HTTP_11.keeps_alive_by_default());
        assert!(!Version::HTTP_10.keeps_alive_by_default());
        assert!("HTTP/2.0".parse::<Version>().unwrap().keeps_alive_by_default());
    }
}
