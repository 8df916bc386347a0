//! HTTP message types
//!
//! This module defines the wire model: request and status lines, the body
//! descriptor, and the request and response messages built from them.

use super::{Error, Header, HeaderList, Result};
use bytes::Bytes;
use std::fmt;

/// Status codes the engine branches on
pub mod status {
    pub const CONTINUE: u16 = 100;
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const NO_CONTENT: u16 = 204;
    pub const RESET_CONTENT: u16 = 205;
    pub const MULTI_STATUS: u16 = 207;
    pub const MOVED_PERMANENTLY: u16 = 301;
    pub const MOVED_TEMPORARILY: u16 = 302;
    pub const NOT_MODIFIED: u16 = 304;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const METHOD_NOT_ALLOWED: u16 = 405;
    pub const GONE: u16 = 410;
}

/// HTTP methods, including the WebDAV extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Delete,
    Move,
    Mkcol,
    Propfind,
    Proppatch,
    Connect,
}

impl Method {
    /// Parse method from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "MOVE" => Ok(Method::Move),
            "MKCOL" => Ok(Method::Mkcol),
            "PROPFIND" => Ok(Method::Propfind),
            "PROPPATCH" => Ok(Method::Proppatch),
            "CONNECT" => Ok(Method::Connect),
            _ => Err(Error::Parse(format!("Invalid HTTP method: {}", s))),
        }
    }

    /// Convert method to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Move => "MOVE",
            Method::Mkcol => "MKCOL",
            Method::Propfind => "PROPFIND",
            Method::Proppatch => "PROPPATCH",
            Method::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    /// Parse version from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    /// Convert version to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request line
///
/// `uri` is the origin-form target: path plus optional raw query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: Method,
    uri: String,
    version: Version,
}

impl RequestLine {
    pub fn new(method: Method, uri: impl Into<String>, version: Version) -> Self {
        RequestLine {
            method,
            uri: uri.into(),
            version,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.uri, self.version)
    }
}

/// Response status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    version: Version,
    code: u16,
    reason: String,
}

impl StatusLine {
    /// Create a status line, validating the code range
    pub fn new(version: Version, code: u16, reason: impl Into<String>) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(StatusLine {
                version,
                code,
                reason: reason.into(),
            })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Reason phrase as sent by the server, or the canonical one
    pub fn reason(&self) -> &str {
        if self.reason.is_empty() {
            reason_phrase(self.code)
        } else {
            &self.reason
        }
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.code, self.reason())
    }
}

/// Get the canonical reason phrase for a status code
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        415 => "Unsupported Media Type",
        423 => "Locked",
        424 => "Failed Dependency",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        507 => "Insufficient Storage",
        _ => "Unknown",
    }
}

/// How a body is delimited on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// `Content-Length: n`
    Length(u64),
    /// Neither header: the body runs until the peer closes
    UntilClose,
}

/// Body descriptor
///
/// The framing mode is selected once from the headers and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    content_type: Option<Header>,
    content_encoding: Option<Header>,
    framing: Framing,
}

impl Body {
    /// Inspect `Transfer-Encoding`, then `Content-Length`
    pub fn from_headers(headers: &HeaderList) -> Result<Self> {
        let framing = if let Some(encoding) = headers.get(Header::TRANSFER_ENCODING) {
            let last = encoding.rsplit(',').next().unwrap_or("").trim();
            if last.eq_ignore_ascii_case("chunked") {
                Framing::Chunked
            } else if last.eq_ignore_ascii_case("identity") {
                content_length(headers)?.map_or(Framing::UntilClose, Framing::Length)
            } else {
                return Err(Error::Protocol(format!(
                    "unsupported transfer-encoding: {}",
                    encoding
                )));
            }
        } else {
            content_length(headers)?.map_or(Framing::UntilClose, Framing::Length)
        };

        Ok(Body {
            content_type: headers.get_first(Header::CONTENT_TYPE).cloned(),
            content_encoding: headers.get_first(Header::CONTENT_ENCODING).cloned(),
            framing,
        })
    }

    pub fn content_type(&self) -> Option<&Header> {
        self.content_type.as_ref()
    }

    pub fn content_encoding(&self) -> Option<&Header> {
        self.content_encoding.as_ref()
    }

    /// Declared length, or -1 when chunked or delimited by close
    pub fn length(&self) -> i64 {
        match self.framing {
            Framing::Length(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Framing::Chunked | Framing::UntilClose => -1,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.framing == Framing::Chunked
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }
}

fn content_length(headers: &HeaderList) -> Result<Option<u64>> {
    match headers.get(Header::CONTENT_LENGTH) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::Protocol(format!("Invalid Content-Length: {}", value))),
    }
}

/// What follows the request header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// A body held in memory, sent with `Content-Length`
    Fixed(Bytes),
    /// The caller streams the body after the header, framed per the
    /// `Transfer-Encoding`/`Content-Length` header already set
    Streamed,
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    line: RequestLine,
    headers: HeaderList,
    body: RequestBody,
}

impl Request {
    /// Create a new HTTP/1.1 request
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Request {
            line: RequestLine::new(method, uri, Version::Http11),
            headers: HeaderList::new(),
            body: RequestBody::Empty,
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Attach an in-memory body with its content type
    pub fn body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.headers.add(Header::CONTENT_TYPE, content_type);
        self.headers.add(Header::CONTENT_LENGTH, body.len().to_string());
        self.body = RequestBody::Fixed(body);
        self
    }

    /// Announce a body the caller streams in chunked encoding
    pub fn chunked(mut self) -> Self {
        self.headers.add(Header::TRANSFER_ENCODING, "chunked");
        self.body = RequestBody::Streamed;
        self
    }

    /// Announce a body of known length the caller streams after the header
    pub fn streamed(mut self, length: u64) -> Self {
        self.headers.add(Header::CONTENT_LENGTH, length.to_string());
        self.body = RequestBody::Streamed;
        self
    }

    pub fn line(&self) -> &RequestLine {
        &self.line
    }

    pub fn method(&self) -> Method {
        self.line.method
    }

    pub fn uri(&self) -> &str {
        &self.line.uri
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderList {
        &mut self.headers
    }

    pub fn request_body(&self) -> &RequestBody {
        &self.body
    }
}

/// HTTP response head plus its body descriptor
///
/// The body bytes themselves stay on the connection until a `BodyReader`
/// consumes them.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusLine,
    headers: HeaderList,
    body: Option<Body>,
    until_close: bool,
}

impl Response {
    pub fn new(status: StatusLine, headers: HeaderList, body: Option<Body>) -> Self {
        let until_close = delimited_by_close(body.as_ref());
        Response {
            status,
            headers,
            body,
            until_close,
        }
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub(crate) fn with_body(mut self, body: Body) -> Self {
        self.until_close = delimited_by_close(Some(&body));
        self.body = Some(body);
        self
    }

    /// Take over the body; whoever holds it must consume it before the
    /// connection goes back to the pool
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Whether the connection cannot carry another exchange
    pub fn close_requested(&self) -> bool {
        let close_token = self
            .headers
            .get_all(Header::CONNECTION)
            .iter()
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("close"));
        close_token || self.until_close
    }
}

fn delimited_by_close(body: Option<&Body>) -> bool {
    body.is_some_and(|body| body.framing() == Framing::UntilClose)
}
