//! Client-side TLS for `https` roots
//!
//! `TlsSession` implements `SessionOps`, so framing and pooling work the same
//! over TLS as over plain TCP.
//!
//! ```no_run
//! use davnode::http::tls::{TlsConfig, TlsVersion};
//! use davnode::http::{Root, Scheme};
//!
//! let tls = TlsConfig::client()
//!     .min_version(TlsVersion::Tls13)
//!     .ca_file("/etc/dav/ca.pem")
//!     .build()
//!     .unwrap();
//! let root = Root::builder(Scheme::Https, "dav.example.com", 443)
//!     .tls(tls)
//!     .build()
//!     .unwrap();
//! ```

use super::session::{close_stream, poll_readable, SessionOps};
use super::Result as HttpResult;
use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslMethod, SslStream, SslVerifyMode, SslVersion};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl TlsVersion {
    fn to_openssl(self) -> SslVersion {
        match self {
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("Handshake with {host} failed: {detail}")]
    HandshakeFailed { host: String, detail: String },
}

/// Client TLS settings, shared by every connection of a root
#[derive(Clone)]
pub struct TlsConfig {
    ctx: SslContext,
    verify_peer: bool,
}

impl TlsConfig {
    pub fn client() -> TlsConfigBuilder {
        TlsConfigBuilder {
            min_version: TlsVersion::Tls12,
            verify_peer: true,
            ca_file: None,
        }
    }

    pub fn verifies_peer(&self) -> bool {
        self.verify_peer
    }

    /// Run the handshake for `host` over a connected socket
    pub fn connect(&self, host: &str, stream: TcpStream) -> Result<TlsSession, TlsError> {
        let mut ssl = Ssl::new(&self.ctx)?;
        ssl.set_hostname(host)?;
        if self.verify_peer {
            ssl.param_mut().set_host(host)?;
        }

        // Blocking socket: connect() returns once the handshake is done
        let stream = ssl.connect(stream).map_err(|e| TlsError::HandshakeFailed {
            host: host.to_string(),
            detail: e.to_string(),
        })?;
        tracing::debug!(host, version = stream.ssl().version_str(), "TLS established");
        Ok(TlsSession {
            stream,
            broken: false,
        })
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("verify_peer", &self.verify_peer)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TlsConfigBuilder {
    min_version: TlsVersion,
    verify_peer: bool,
    ca_file: Option<PathBuf>,
}

impl TlsConfigBuilder {
    /// Lowest protocol version to negotiate (default TLS 1.2)
    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = version;
        self
    }

    /// Check the server certificate and host name (default on)
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    /// Trust the CA certificates in this PEM file besides the system ones
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn build(self) -> Result<TlsConfig, TlsError> {
        let mut ctx = SslContextBuilder::new(SslMethod::tls_client())?;
        ctx.set_min_proto_version(Some(self.min_version.to_openssl()))?;

        if self.verify_peer {
            ctx.set_default_verify_paths()?;
            if let Some(path) = &self.ca_file {
                ctx.set_ca_file(path)?;
            }
            ctx.set_verify(SslVerifyMode::PEER);
        } else {
            ctx.set_verify(SslVerifyMode::NONE);
        }

        Ok(TlsConfig {
            ctx: ctx.build(),
            verify_peer: self.verify_peer,
        })
    }
}

/// TLS transport
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    broken: bool,
}

impl TlsSession {
    /// Negotiated protocol, e.g. "TLSv1.3"
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }
}

impl Read for TlsSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).inspect_err(|_| self.broken = true)
    }
}

impl Write for TlsSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf).inspect_err(|_| self.broken = true)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().inspect_err(|_| self.broken = true)
    }
}

impl SessionOps for TlsSession {
    fn readable(&self, timeout: Duration) -> HttpResult<bool> {
        // Records already decrypted never show up on the socket
        if self.stream.ssl().pending() > 0 {
            return Ok(true);
        }
        poll_readable(self.stream.get_ref().as_raw_fd(), timeout)
    }

    fn close(&mut self) -> HttpResult<()> {
        if !self.broken {
            // close_notify is a courtesy; the socket goes down either way
            let _ = self.stream.shutdown();
        }
        close_stream(self.stream.get_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = TlsConfig::client().build().unwrap();
        assert!(config.verifies_peer());

        let config = TlsConfig::client()
            .min_version(TlsVersion::Tls13)
            .verify_peer(false)
            .build()
            .unwrap();
        assert!(!config.verifies_peer());
    }

    #[test]
    fn test_missing_ca_file_fails() {
        let result = TlsConfig::client().ca_file("/nonexistent/ca.pem").build();
        assert!(matches!(result, Err(TlsError::OpenSsl(_))));
    }

    #[test]
    fn test_handshake_with_plain_server_fails() {
        use std::net::TcpListener;
        use std::thread;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n");
        });

        let config = TlsConfig::client().verify_peer(false).build().unwrap();
        let result = config.connect("localhost", TcpStream::connect(addr).unwrap());
        assert!(matches!(result, Err(TlsError::HandshakeFailed { .. })));
        handle.join().unwrap();
    }
}
