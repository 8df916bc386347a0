//! Byte transports under a connection
//!
//! A `Connection` frames HTTP over whatever implements `SessionOps`: a plain
//! `TcpSession`, a `TlsSession`, or a scripted fake in tests.

use super::{Error, Result};
use socket2::{Domain, Protocol, SockAddr, Socket, TcpKeepalive, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

const KEEPALIVE_IDLE: Duration = Duration::from_secs(60);

/// Transport of one connection
pub trait SessionOps: Read + Write + Send {
    /// Wait up to `timeout` for input; `Duration::ZERO` checks without waiting
    fn readable(&self, timeout: Duration) -> Result<bool>;

    /// Shut the transport down
    fn close(&mut self) -> Result<()>;

    /// Whether an idle session can no longer carry an exchange
    ///
    /// Between exchanges the peer has nothing to say, so anything readable
    /// is EOF, an error, or stray bytes.
    fn is_stale(&self) -> bool {
        self.readable(Duration::ZERO).unwrap_or(true)
    }
}

/// `poll(2)` one descriptor for input
pub(crate) fn poll_readable(fd: RawFd, timeout: Duration) -> Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

    // SAFETY: pfd is a valid pollfd for the duration of the call and nfds is 1
    let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if ready < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(ready > 0)
}

fn shutdown(stream: &TcpStream) -> Result<()> {
    match stream.shutdown(Shutdown::Both) {
        // The peer may have closed first
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other.map_err(Error::from),
    }
}

/// Plain TCP transport
pub struct TcpSession {
    stream: TcpStream,
}

impl TcpSession {
    pub fn new(stream: TcpStream) -> Self {
        TcpSession { stream }
    }

    /// Connect to the first reachable address of `host:port`
    ///
    /// `io_timeout` bounds every later read and write. The socket gets
    /// `TCP_NODELAY` and keepalive probes.
    pub fn connect(host: &str, port: u16, connect_timeout: Duration, io_timeout: Duration) -> Result<Self> {
        let mut last_error = None;
        for addr in (host, port).to_socket_addrs()? {
            let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
            match socket.connect_timeout(&SockAddr::from(addr), connect_timeout) {
                Ok(()) => {
                    socket.set_nodelay(true)?;
                    socket.set_read_timeout(Some(io_timeout))?;
                    socket.set_write_timeout(Some(io_timeout))?;
                    socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEPALIVE_IDLE))?;
                    tracing::debug!(%addr, "connected");
                    return Ok(TcpSession::new(socket.into()));
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect failed");
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) if e.kind() == io::ErrorKind::TimedOut => Error::Timeout,
            Some(e) => Error::Io(e),
            None => Error::Parse(format!("no address for {}:{}", host, port)),
        })
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

impl Read for TcpSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl SessionOps for TcpSession {
    fn readable(&self, timeout: Duration) -> Result<bool> {
        poll_readable(self.stream.as_raw_fd(), timeout)
    }

    fn close(&mut self) -> Result<()> {
        shutdown(&self.stream)
    }
}

pub(crate) fn close_stream(stream: &TcpStream) -> Result<()> {
    shutdown(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_connect_and_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
        });

        let mut session =
            TcpSession::connect("127.0.0.1", port, Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        assert!(session.stream().nodelay().unwrap());
        assert!(session.readable(Duration::from_secs(1)).unwrap());

        let mut buf = [0u8; 5];
        session.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"Hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to find a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let result = TcpSession::connect("127.0.0.1", port, Duration::from_secs(1), Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_stale_after_peer_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = TcpStream::connect(addr).unwrap();
        let (peer, _) = listener.accept().unwrap();
        let mut session = TcpSession::new(stream);
        assert!(!session.is_stale());

        drop(peer);
        // Give the FIN time to arrive
        assert!(session.readable(Duration::from_secs(2)).unwrap());
        assert!(session.is_stale());
        session.close().unwrap();
    }
}
