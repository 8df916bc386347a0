//! Per-host connection root
//!
//! A `Root` holds everything needed to talk to one `scheme://host:port`:
//! credentials, timeouts, proxy settings and the pool of idle connections.
//! It drives a single exchange as allocate, send, receive, free, and makes
//! sure a connection that failed anywhere along that path is closed rather
//! than pooled.

use super::parser::read_header_block;
use super::pool::{Pool, DEFAULT_CAPACITY};
use super::session::{SessionOps, TcpSession};
use super::tls::TlsConfig;
use super::trace::{TracingWire, WireTrace};
use super::{
    message::status, Connection, Error, Header, Method, Request, RequestBody, Response, Result,
    Version, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT,
};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default socket read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// URL scheme of a root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Parse a scheme; `dav` and `davs` are aliases for `http` and `https`
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "dav" => Ok(Scheme::Http),
            "https" | "davs" => Ok(Scheme::Https),
            _ => Err(Error::Parse(format!("Unsupported scheme: {}", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => DEFAULT_HTTP_PORT,
            Scheme::Https => DEFAULT_HTTPS_PORT,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic authentication credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> String {
        format!(
            "Basic {}",
            base64_encode(format!("{}:{}", self.username, self.password).as_bytes())
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Base64 encoder for Basic credentials
fn base64_encode(data: &[u8]) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut result = String::with_capacity(data.len().div_ceil(3) * 4);

    for chunk in data.chunks(3) {
        let mut buf = [0u8; 3];
        buf[..chunk.len()].copy_from_slice(chunk);

        let b1 = (buf[0] >> 2) as usize;
        let b2 = (((buf[0] & 0x03) << 4) | (buf[1] >> 4)) as usize;
        let b3 = (((buf[1] & 0x0F) << 2) | (buf[2] >> 6)) as usize;
        let b4 = (buf[2] & 0x3F) as usize;

        result.push(CHARS[b1] as char);
        result.push(CHARS[b2] as char);
        result.push(if chunk.len() > 1 { CHARS[b3] as char } else { '=' });
        result.push(if chunk.len() > 2 { CHARS[b4] as char } else { '=' });
    }

    result
}

/// HTTP proxy settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    host: String,
    port: u16,
    excludes: Vec<String>,
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Proxy {
            host: host.into(),
            port,
            excludes: Vec::new(),
        }
    }

    /// Hosts (suffix match, `*` for all) that bypass the proxy
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Proxy for `host` from `<scheme>_proxy` / `no_proxy` environment variables
    ///
    /// Loopback hosts never go through a proxy.
    pub fn from_env(scheme: Scheme, host: &str) -> Option<Proxy> {
        let lower = format!("{}_proxy", scheme.as_str());
        let value = std::env::var(&lower)
            .or_else(|_| std::env::var(lower.to_ascii_uppercase()))
            .ok()?;
        let mut proxy = Proxy::parse(&value)?;
        if let Ok(no_proxy) = std::env::var("no_proxy").or_else(|_| std::env::var("NO_PROXY")) {
            for pattern in no_proxy.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                proxy = proxy.exclude(pattern);
            }
        }
        if is_loopback(host) || !proxy.applies_to(host) {
            return None;
        }
        Some(proxy)
    }

    /// Parse `host:port` or `http://host:port/`
    pub fn parse(value: &str) -> Option<Proxy> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let with_scheme = if value.contains("://") {
            value.to_string()
        } else {
            format!("http://{}", value)
        };
        let url = url::Url::parse(&with_scheme).ok()?;
        let host = url.host_str()?.to_string();
        let port = url.port_or_known_default()?;
        Some(Proxy::new(host, port))
    }

    /// Whether requests to `host` use this proxy
    pub fn applies_to(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        !self.excludes.iter().any(|pattern| {
            let pattern = pattern.trim_start_matches('.').to_ascii_lowercase();
            pattern == "*"
                || host == pattern
                || host.ends_with(&format!(".{}", pattern))
        })
    }
}

fn is_loopback(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

/// Opens sessions for a root
///
/// The default `TcpConnector` opens TCP (and TLS) sockets; tests inject
/// their own to run without a network.
pub trait Connector: Send + Sync {
    fn connect(&self, root: &Root) -> Result<Box<dyn SessionOps>>;
}

/// Connects with socket2, honoring timeouts, proxy and TLS settings
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl TcpConnector {
    fn open_tcp(host: &str, port: u16, root: &Root) -> Result<TcpSession> {
        TcpSession::connect(host, port, root.connect_timeout, root.read_timeout)
    }

    /// Ask the proxy for a tunnel to the root's host
    fn tunnel(session: TcpSession, root: &Root) -> Result<TcpSession> {
        let authority = root.authority();
        let mut io = super::AsciiStream::new(session);
        io.write_ascii_line(&format!("{} {} {}", Method::Connect, authority, Version::Http11))?;
        io.write_ascii_line(&format!("{}: {}", Header::HOST, authority))?;
        io.write_ascii_line("")?;
        io.flush()?;

        let status = super::parser::read_status_line(&mut io)?;
        read_header_block(&mut io)?;
        if status.code() != status::OK {
            return Err(Error::Proxy(format!("CONNECT {}: {}", authority, status)));
        }
        if io.buffered_input() > 0 {
            return Err(Error::Proxy("data after CONNECT response".to_string()));
        }
        tracing::debug!(%authority, "proxy tunnel established");
        Ok(io.into_inner())
    }
}

impl Connector for TcpConnector {
    fn connect(&self, root: &Root) -> Result<Box<dyn SessionOps>> {
        let session = match &root.proxy {
            Some(proxy) => {
                let session = Self::open_tcp(proxy.host(), proxy.port(), root)?;
                match root.scheme {
                    Scheme::Http => session,
                    Scheme::Https => Self::tunnel(session, root)?,
                }
            }
            None => Self::open_tcp(&root.host, root.port, root)?,
        };

        match root.scheme {
            Scheme::Http => Ok(Box::new(session)),
            Scheme::Https => {
                let tls = match &root.tls {
                    Some(tls) => tls.clone(),
                    None => TlsConfig::client()
                        .build()
                        .map_err(|e| Error::Tls(e.to_string()))?,
                };
                let session = tls
                    .connect(&root.host, session.into_stream())
                    .map_err(|e| Error::Tls(e.to_string()))?;
                Ok(Box::new(session))
            }
        }
    }
}

/// Connection root for one `scheme://host:port`
pub struct Root {
    scheme: Scheme,
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    connect_timeout: Duration,
    read_timeout: Duration,
    proxy: Option<Proxy>,
    tls: Option<TlsConfig>,
    connector: Arc<dyn Connector>,
    trace: Arc<dyn WireTrace>,
    pool: Mutex<Pool<Connection>>,
}

impl Root {
    /// Create a root builder
    pub fn builder(scheme: Scheme, host: impl Into<String>, port: u16) -> RootBuilder {
        RootBuilder::new(scheme, host.into(), port)
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// `host` or `host:port` when the port is not the scheme default
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// `scheme://authority`, without trailing slash
    pub fn prefix(&self) -> String {
        format!("{}://{}", self.scheme, self.authority())
    }

    /// Connections currently handed out
    pub fn allocated(&self) -> usize {
        self.lock_pool().allocated()
    }

    /// Idle connections kept for reuse
    pub fn pooled(&self) -> usize {
        self.lock_pool().pooled()
    }

    fn lock_pool(&self) -> MutexGuard<'_, Pool<Connection>> {
        // The pool holds no invariant a panicking holder could break halfway
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand out a pooled connection or open a fresh one
    pub fn allocate(&self) -> Result<Connection> {
        let pooled = self.lock_pool().allocate();
        if let Some(conn) = pooled {
            tracing::debug!(peer = conn.peer(), "reusing pooled connection");
            return Ok(conn);
        }

        match self.open() {
            Ok(conn) => {
                tracing::debug!(peer = conn.peer(), "opened connection");
                Ok(conn)
            }
            Err(e) => {
                self.lock_pool().cancel();
                Err(e)
            }
        }
    }

    fn open(&self) -> Result<Connection> {
        let session = self.connector.connect(self)?;
        let conn = Connection::new(session, self.authority(), Arc::clone(&self.trace));
        Ok(match (&self.proxy, self.scheme) {
            (Some(_), Scheme::Http) => conn.with_target_prefix(self.prefix()),
            _ => conn,
        })
    }

    /// Return a connection after an exchange
    ///
    /// `None` means the exchange never completed, so the connection is
    /// closed. Otherwise any unread body is drained first, and the
    /// connection is pooled unless the response asked for `Connection: close`
    /// or the pool is full.
    ///
    /// # Panics
    ///
    /// Panics if no connection is allocated.
    pub fn free(&self, response: Option<&Response>, mut conn: Connection) {
        let keep = match response {
            None => false,
            Some(response) => {
                let drained = conn.body_reader(response.body()).drain();
                match drained {
                    Ok(_) => !response.close_requested(),
                    Err(e) => {
                        tracing::debug!(peer = conn.peer(), error = %e, "failed to drain body");
                        false
                    }
                }
            }
        };

        let rejected = self.lock_pool().free(conn, keep);
        if let Some(mut conn) = rejected {
            tracing::debug!(peer = conn.peer(), keep, "closing connection");
            conn.close();
        }
    }

    /// Write a request on an allocated connection
    ///
    /// Adds `Host` and, with credentials, `Authorization`. A request with a
    /// streamed body is not flushed; the caller writes and flushes the body.
    /// On failure the connection is freed before the error is returned.
    pub fn send(&self, mut conn: Connection, request: &Request) -> Result<Connection> {
        let mut request = request.clone();
        request.headers_mut().add(Header::HOST, self.authority());
        if let Some(credentials) = &self.credentials {
            request
                .headers_mut()
                .add(Header::AUTHORIZATION, credentials.authorization());
        }

        let result = conn
            .send_request_header(&request)
            .and_then(|()| conn.send_request_body(&request))
            .and_then(|()| match request.request_body() {
                RequestBody::Streamed => Ok(()),
                _ => conn.flush(),
            });
        match result {
            Ok(()) => Ok(conn),
            Err(e) => {
                self.free(None, conn);
                Err(e)
            }
        }
    }

    /// Read the final response head, skipping interim 1xx responses
    ///
    /// The body (if the response has one) stays on the connection, described
    /// by `Response::body`. On failure the connection is freed before the
    /// error is returned.
    pub fn receive(&self, mut conn: Connection, head_request: bool) -> Result<(Connection, Response)> {
        match Self::receive_final(&mut conn, head_request) {
            Ok(response) => Ok((conn, response)),
            Err(e) => {
                self.free(None, conn);
                Err(e)
            }
        }
    }

    fn receive_final(conn: &mut Connection, head_request: bool) -> Result<Response> {
        loop {
            let response = conn.receive_response_header()?;
            if response.status().is_informational() {
                continue;
            }
            let code = response.status().code();
            return if has_body(code, head_request) {
                conn.receive_response_body(response)
            } else {
                Ok(response)
            };
        }
    }

    /// Allocate, send and receive in one step
    pub fn exchange(&self, request: &Request) -> Result<(Connection, Response)> {
        let conn = self.allocate()?;
        let conn = self.send(conn, request)?;
        self.receive(conn, request.method() == super::Method::Head)
    }

    /// Read the body of `response` into memory and free the connection
    pub fn finish(&self, mut conn: Connection, mut response: Response) -> Result<bytes::Bytes> {
        let body = response.take_body();
        let read = conn.body_reader(body.as_ref()).read_all();
        match read {
            Ok(bytes) => {
                self.free(Some(&response), conn);
                Ok(bytes.into())
            }
            Err(e) => {
                self.free(None, conn);
                Err(Error::from_io(e))
            }
        }
    }

    /// Close all idle connections
    pub fn close_idle(&self) {
        self.lock_pool().clear();
    }
}

fn has_body(code: u16, head_request: bool) -> bool {
    !head_request
        && code >= status::OK
        && !matches!(
            code,
            status::NO_CONTENT | status::NOT_MODIFIED | status::RESET_CONTENT
        )
}

impl PartialEq for Root {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.port == other.port
            && self.host.eq_ignore_ascii_case(&other.host)
    }
}

impl Eq for Root {}

impl Hash for Root {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.host.to_ascii_lowercase().hash(state);
        self.port.hash(state);
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("url", &self.prefix())
            .field("credentials", &self.credentials)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl Drop for Root {
    fn drop(&mut self) {
        self.close_idle();
    }
}

/// Builder for `Root`
pub struct RootBuilder {
    scheme: Scheme,
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    connect_timeout: Duration,
    read_timeout: Duration,
    proxy: Option<Proxy>,
    tls: Option<TlsConfig>,
    connector: Arc<dyn Connector>,
    trace: Arc<dyn WireTrace>,
    pool_capacity: usize,
}

impl RootBuilder {
    fn new(scheme: Scheme, host: String, port: u16) -> Self {
        RootBuilder {
            scheme,
            host,
            port,
            credentials: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            proxy: None,
            tls: None,
            connector: Arc::new(TcpConnector),
            trace: Arc::new(TracingWire),
            pool_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Authenticate with HTTP Basic credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn proxy(mut self, proxy: Option<Proxy>) -> Self {
        self.proxy = proxy;
        self
    }

    /// TLS settings for `https` roots
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn trace(mut self, trace: Arc<dyn WireTrace>) -> Self {
        self.trace = trace;
        self
    }

    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Build the root; roots are shared by all nodes on the same host
    pub fn build(self) -> Result<Arc<Root>> {
        if self.host.is_empty() {
            return Err(Error::Parse("empty host".to_string()));
        }
        Ok(Arc::new(Root {
            scheme: self.scheme,
            host: self.host,
            port: self.port,
            credentials: self.credentials,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            proxy: self.proxy,
            tls: self.tls,
            connector: self.connector,
            trace: self.trace,
            pool: Mutex::new(Pool::new(self.pool_capacity)),
        }))
    }
}
