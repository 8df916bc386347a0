//! HTTP/1.1 client engine
//!
//! This module provides the wire model, the ASCII framing codec and the
//! pooled connection machinery the WebDAV layer is built on.
//!
//! # Architecture
//!
//! The HTTP layer uses a session operations abstraction so that plain TCP
//! and TLS transports look the same to everything above them:
//!
//! - `SessionOps` trait defines transport operations (read, write, close)
//! - `Connection` owns one session plus its framing buffers
//! - `Root` pools connections per host and drives one exchange at a time
//!
//! # Examples
//!
//! ```no_run
//! use davnode::http::{Method, Request, Root, Scheme};
//!
//! let root = Root::builder(Scheme::Http, "localhost", 8080).build().unwrap();
//! let request = Request::new(Method::Head, "/index.html");
//!
//! let conn = root.allocate().unwrap();
//! let conn = root.send(conn, &request).unwrap();
//! let (conn, response) = root.receive(conn, true).unwrap();
//! assert_eq!(response.status().code(), 200);
//! root.free(Some(&response), conn);
//! ```

pub mod ascii;
pub mod body;
pub mod chunked;
pub mod connection;
pub mod headers;
pub mod message;
pub mod parser;
pub mod pool;
pub mod root;
pub mod session;
pub mod tls;
pub mod trace;
pub mod window;

pub use ascii::AsciiStream;
pub use body::BodyReader;
pub use chunked::{ChunkedReader, ChunkedWriter};
pub use connection::Connection;
pub use headers::{Header, HeaderList};
pub use message::{status, Body, Framing, Method, Request, RequestBody, RequestLine, Response, StatusLine, Version};
pub use pool::Pool;
pub use root::{Connector, Credentials, Proxy, Root, RootBuilder, Scheme, TcpConnector};
pub use session::{SessionOps, TcpSession};
pub use trace::{NoWire, TracingWire, WireTrace};
pub use window::WindowReader;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Proxy error: {0}")]
    Proxy(String),
}

impl Error {
    /// Convert an I/O error raised inside a framing stream back into an HTTP error
    ///
    /// The framing readers report protocol violations as `InvalidData` so they
    /// fit the `Read` trait; this recovers the protocol classification.
    pub fn from_io(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::InvalidData => Error::Protocol(e.to_string()),
            std::io::ErrorKind::UnexpectedEof => {
                Error::Protocol(format!("premature end of body: {}", e))
            }
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::Io(e),
        }
    }
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 128;

/// Maximum length of a single status, request or header line
pub const MAX_LINE: usize = 16 * 1024;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
