//! HTTP connection
//!
//! A `Connection` owns one session and its framing buffers and carries one
//! request/response exchange at a time. It never retries anything itself;
//! any I/O failure closes it so it cannot be pooled afterwards.

use super::ascii::AsciiStream;
use super::body::BodyReader;
use super::parser::{read_header_block, read_status_line};
use super::session::SessionOps;
use super::trace::WireTrace;
use super::{Body, Error, Request, RequestBody, Response, Result};
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

pub struct Connection {
    io: AsciiStream<Box<dyn SessionOps>>,
    peer: String,
    target_prefix: Option<String>,
    trace: Arc<dyn WireTrace>,
    open: bool,
}

impl Connection {
    /// Wrap an established session
    pub fn new(session: Box<dyn SessionOps>, peer: impl Into<String>, trace: Arc<dyn WireTrace>) -> Self {
        Connection {
            io: AsciiStream::new(session),
            peer: peer.into(),
            target_prefix: None,
            trace,
            open: true,
        }
    }

    /// Send absolute-form request targets (`http://host:port/path`), as a
    /// plain HTTP proxy expects
    pub fn with_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_prefix = Some(prefix.into());
        self
    }

    /// Peer description used in logs
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write request line and headers; the blank line ends the header block
    pub fn send_request_header(&mut self, request: &Request) -> Result<()> {
        let line = request.line();
        let request_line = format!(
            "{} {}{} {}",
            line.method(),
            self.target_prefix.as_deref().unwrap_or(""),
            line.uri(),
            line.version()
        );
        let result = self.write_head(&request_line, request);
        self.check(result)
    }

    fn write_head(&mut self, request_line: &str, request: &Request) -> Result<()> {
        self.trace.sent(&self.peer, request_line);
        self.io.write_ascii_line(request_line)?;
        for header in request.headers().iter() {
            let header_line = header.to_string();
            self.trace.sent(&self.peer, &header_line);
            self.io.write_ascii_line(&header_line)?;
        }
        self.io.write_ascii_line("")?;
        Ok(())
    }

    /// Write an in-memory body; streamed bodies are written by the caller
    pub fn send_request_body(&mut self, request: &Request) -> Result<()> {
        if let RequestBody::Fixed(bytes) = request.request_body() {
            self.trace.sent_body(&self.peer, Some(bytes.len() as u64));
            let result = self.io.write_all(bytes).map_err(Error::from);
            self.check(result)?;
        }
        Ok(())
    }

    /// Read status line and header block; the body stays unread
    pub fn receive_response_header(&mut self) -> Result<Response> {
        let result = self.read_head();
        self.check(result)
    }

    fn read_head(&mut self) -> Result<Response> {
        let status = read_status_line(&mut self.io)?;
        self.trace.received(&self.peer, &status.to_string());
        let headers = read_header_block(&mut self.io)?;
        for header in headers.iter() {
            self.trace.received(&self.peer, &header.to_string());
        }
        Ok(Response::new(status, headers, None))
    }

    /// Select the body framing from the response headers
    ///
    /// Called only for responses that carry a body; the bytes are consumed
    /// later through a `BodyReader`.
    pub fn receive_response_body(&mut self, response: Response) -> Result<Response> {
        let body = Body::from_headers(response.headers());
        let body = self.check(body)?;
        Ok(response.with_body(body))
    }

    /// Reader over the body described by `body`, borrowing this connection
    pub fn body_reader(&mut self, body: Option<&Body>) -> BodyReader<&mut Self> {
        BodyReader::new(self, body)
    }

    pub fn flush(&mut self) -> Result<()> {
        let result = self.io.flush().map_err(Error::from);
        self.check(result)
    }

    /// Close the session; closing twice is a no-op
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.io.get_mut().close() {
                tracing::debug!(peer = %self.peer, error = %e, "close failed");
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open, with nothing buffered and nothing pending from the peer
    pub fn is_reusable(&self) -> bool {
        self.open && self.io.buffered_input() == 0 && !self.io.get_ref().is_stale()
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.close();
        }
        result
    }

    fn check_io<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if result.is_err() {
            self.close();
        }
        result
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.io.read(buf);
        self.check_io(result)
    }
}

impl BufRead for Connection {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if let Err(e) = self.io.fill_buf() {
            self.close();
            return Err(e);
        }
        Ok(self.io.buffered())
    }

    fn consume(&mut self, amt: usize) {
        self.io.consume(amt)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.io.write(buf);
        self.check_io(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.io.flush();
        self.check_io(result)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("open", &self.open)
            .finish()
    }
}
