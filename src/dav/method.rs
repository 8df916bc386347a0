//! One function per HTTP verb
//!
//! Each function allocates a connection from the root, performs a single
//! exchange and classifies the final status. Terminal statuses free the
//! connection before the error is returned; unexpected ones read the body
//! first so the error can carry it.
//!
//! | verb      | success       | classified                           |
//! |-----------|---------------|--------------------------------------|
//! | GET       | 200 (stream)  | 301 moved, 302 moved temporarily, 404/410 not found |
//! | HEAD      | 200           |                                      |
//! | PUT       | 200, 201, 204 |                                      |
//! | DELETE    | 200, 204      | 301 moved, 404 not found             |
//! | MKCOL     | 201           |                                      |
//! | MOVE      | 201, 204      | 301 moved, 404 not found             |
//! | PROPFIND  | 207           | 400/301 moved, 404 not found         |
//! | PROPPATCH | 200, 207      | 301 moved                            |
//!
//! Anything else is `DavError::Status`.

use crate::dav::{xml, DavError, MultiStatus, Name, Property, Result};
use crate::http::{
    self, status, BodyReader, ChunkedWriter, Connection, Header, Method, Request, Response, Root,
    StatusLine,
};
use bytes::Bytes;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// PROPFIND depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn full_url(root: &Root, uri: &str) -> String {
    format!("{}{}", root.prefix(), uri)
}

fn not_found(root: &Root, uri: &str, conn: Connection, response: &Response) -> DavError {
    root.free(Some(response), conn);
    DavError::NotFound {
        url: full_url(root, uri),
    }
}

fn moved(root: &Root, uri: &str, conn: Connection, response: &Response) -> DavError {
    root.free(Some(response), conn);
    DavError::MovedPermanently {
        url: full_url(root, uri),
    }
}

fn unexpected(root: &Root, method: Method, uri: &str, conn: Connection, response: Response) -> DavError {
    let line = response.status().clone();
    let body = root.finish(conn, response).ok();
    tracing::debug!(%method, uri, status = line.code(), "unexpected status");
    DavError::Status {
        method,
        url: full_url(root, uri),
        line,
        body,
    }
}

fn ok(root: &Root, conn: Connection, response: &Response) -> Result<()> {
    root.free(Some(response), conn);
    Ok(())
}

/// Start a download
pub fn get(root: &Arc<Root>, uri: &str) -> Result<GetStream> {
    let (conn, response) = root.exchange(&Request::new(Method::Get, uri))?;
    match response.status().code() {
        status::OK => Ok(GetStream::new(Arc::clone(root), conn, response)),
        status::MOVED_TEMPORARILY => {
            let location = response
                .headers()
                .get(Header::LOCATION)
                .unwrap_or_default()
                .to_string();
            root.free(Some(&response), conn);
            Err(DavError::MovedTemporarily { location })
        }
        status::MOVED_PERMANENTLY => Err(moved(root, uri, conn, &response)),
        status::NOT_FOUND | status::GONE => Err(not_found(root, uri, conn, &response)),
        _ => Err(unexpected(root, Method::Get, uri, conn, response)),
    }
}

/// Fetch the response head of `uri`
pub fn head(root: &Root, uri: &str) -> Result<Response> {
    let (conn, response) = root.exchange(&Request::new(Method::Head, uri))?;
    match response.status().code() {
        status::OK => {
            root.free(Some(&response), conn);
            Ok(response)
        }
        _ => Err(unexpected(root, Method::Head, uri, conn, response)),
    }
}

/// Start an upload; `length` selects `Content-Length` framing over chunked
pub fn put(root: &Arc<Root>, uri: &str, length: Option<u64>) -> Result<PutStream> {
    let request = Request::new(Method::Put, uri);
    let request = match length {
        Some(length) => request.streamed(length),
        None => request.chunked(),
    };
    let conn = root.allocate()?;
    let conn = root.send(conn, &request)?;
    Ok(PutStream::new(Arc::clone(root), uri, conn, length))
}

pub fn delete(root: &Root, uri: &str) -> Result<()> {
    let (conn, response) = root.exchange(&Request::new(Method::Delete, uri))?;
    match response.status().code() {
        status::OK | status::NO_CONTENT => ok(root, conn, &response),
        status::MOVED_PERMANENTLY => Err(moved(root, uri, conn, &response)),
        status::NOT_FOUND => Err(not_found(root, uri, conn, &response)),
        _ => Err(unexpected(root, Method::Delete, uri, conn, response)),
    }
}

pub fn mkcol(root: &Root, uri: &str) -> Result<()> {
    let (conn, response) = root.exchange(&Request::new(Method::Mkcol, uri))?;
    match response.status().code() {
        status::CREATED => ok(root, conn, &response),
        _ => Err(unexpected(root, Method::Mkcol, uri, conn, response)),
    }
}

/// Move `uri` to the absolute URL `destination`
pub fn move_to(root: &Root, uri: &str, destination: &str, overwrite: bool) -> Result<()> {
    let request = Request::new(Method::Move, uri)
        .header(Header::DESTINATION, destination)
        .header(Header::OVERWRITE, if overwrite { "T" } else { "F" });
    let (conn, response) = root.exchange(&request)?;
    match response.status().code() {
        status::CREATED | status::NO_CONTENT => ok(root, conn, &response),
        status::MOVED_PERMANENTLY => Err(moved(root, uri, conn, &response)),
        status::NOT_FOUND => Err(not_found(root, uri, conn, &response)),
        _ => Err(unexpected(root, Method::Move, uri, conn, response)),
    }
}

/// Ask for `names` at `depth`
pub fn propfind(root: &Root, uri: &str, depth: Depth, names: &[Name]) -> Result<Vec<MultiStatus>> {
    let body = xml::to_bytes(&xml::propfind(names))?;
    let request = Request::new(Method::Propfind, uri)
        .header(Header::DEPTH, depth.as_str())
        .body(xml::CONTENT_TYPE, body);
    let (conn, response) = root.exchange(&request)?;
    match response.status().code() {
        status::MULTI_STATUS => {
            let body = root.finish(conn, response)?;
            MultiStatus::parse(&body)
        }
        status::BAD_REQUEST | status::MOVED_PERMANENTLY => Err(moved(root, uri, conn, &response)),
        status::NOT_FOUND => Err(not_found(root, uri, conn, &response)),
        _ => Err(unexpected(root, Method::Propfind, uri, conn, response)),
    }
}

/// Set one property
///
/// A `207` answer is accepted only if it reports success for the property.
pub fn proppatch(root: &Root, uri: &str, property: &Property) -> Result<()> {
    let body = xml::to_bytes(&xml::propertyupdate(property))?;
    let request = Request::new(Method::Proppatch, uri).body(xml::CONTENT_TYPE, body);
    let (conn, response) = root.exchange(&request)?;
    match response.status().code() {
        status::OK => ok(root, conn, &response),
        status::MULTI_STATUS => {
            let version = response.status().version();
            let body = root.finish(conn, response)?;
            let records = MultiStatus::parse(&body)?;
            let record = MultiStatus::lookup_href(&records, uri, property.name())
                .or_else(|| MultiStatus::lookup(&records, property.name()))
                .ok_or_else(|| {
                    DavError::Protocol(format!("no status for property {}", property.name()))
                })?;
            if record.is_ok() {
                Ok(())
            } else {
                Err(DavError::Status {
                    method: Method::Proppatch,
                    url: full_url(root, uri),
                    line: StatusLine::new(version, record.status(), "")?,
                    body: Some(body),
                })
            }
        }
        status::MOVED_PERMANENTLY => Err(moved(root, uri, conn, &response)),
        _ => Err(unexpected(root, Method::Proppatch, uri, conn, response)),
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "stream closed")
}

/// Body of a successful GET
///
/// The connection goes back to the root exactly once: on `close`, on drop,
/// or when a read fails. Closing early drains the rest of the body so the
/// connection can be reused.
pub struct GetStream {
    root: Arc<Root>,
    response: Response,
    length: Option<u64>,
    body: Option<BodyReader<Connection>>,
}

impl GetStream {
    fn new(root: Arc<Root>, conn: Connection, mut response: Response) -> Self {
        let body = response.take_body();
        let length = body.as_ref().and_then(|b| u64::try_from(b.length()).ok());
        GetStream {
            root,
            response,
            length,
            body: Some(BodyReader::new(conn, body.as_ref())),
        }
    }

    /// Response head; the body descriptor has been taken over by the stream
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Declared `Content-Length`, if any
    pub fn content_length(&self) -> Option<u64> {
        self.length
    }

    pub fn is_closed(&self) -> bool {
        self.body.is_none()
    }

    /// Drain what is left and free the connection; later calls do nothing
    pub fn close(&mut self) -> Result<()> {
        let Some(mut body) = self.body.take() else {
            return Ok(());
        };
        let drained = body.drain();
        let conn = body.into_inner();
        match drained {
            Ok(_) => {
                self.root.free(Some(&self.response), conn);
                Ok(())
            }
            Err(e) => {
                self.root.free(None, conn);
                Err(http::Error::from_io(e).into())
            }
        }
    }
}

impl Read for GetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let body = self.body.as_mut().ok_or_else(closed)?;
        match body.read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                if let Some(body) = self.body.take() {
                    self.root.free(None, body.into_inner());
                }
                Err(e)
            }
        }
    }
}

impl Drop for GetStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close download");
        }
    }
}

impl fmt::Debug for GetStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetStream")
            .field("status", self.response.status())
            .field("length", &self.length)
            .field("closed", &self.is_closed())
            .finish()
    }
}

enum Sink {
    Chunked(ChunkedWriter<Connection>),
    Sized { conn: Connection, remaining: u64 },
}

impl Sink {
    fn into_connection(self) -> Connection {
        match self {
            Sink::Chunked(writer) => writer.into_inner(),
            Sink::Sized { conn, .. } => conn,
        }
    }
}

/// Body of a PUT in progress
///
/// `close` ends the body, reads the response and frees the connection.
/// It runs exactly once, whether called explicitly or on drop.
pub struct PutStream {
    root: Arc<Root>,
    uri: String,
    sink: Option<Sink>,
}

impl PutStream {
    fn new(root: Arc<Root>, uri: &str, conn: Connection, length: Option<u64>) -> Self {
        let sink = match length {
            Some(remaining) => Sink::Sized { conn, remaining },
            None => Sink::Chunked(ChunkedWriter::new(conn)),
        };
        PutStream {
            root,
            uri: uri.to_string(),
            sink: Some(sink),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    fn abort(&mut self) {
        if let Some(sink) = self.sink.take() {
            self.root.free(None, sink.into_connection());
        }
    }

    /// Finish the body and check the server accepted it
    pub fn close(&mut self) -> Result<()> {
        let Some(sink) = self.sink.take() else {
            return Ok(());
        };
        let conn = match sink {
            Sink::Chunked(mut writer) => {
                let finished = writer.finish();
                let conn = writer.into_inner();
                if let Err(e) = finished {
                    self.root.free(None, conn);
                    return Err(http::Error::from_io(e).into());
                }
                conn
            }
            Sink::Sized { mut conn, remaining } => {
                if remaining > 0 {
                    self.root.free(None, conn);
                    return Err(DavError::Protocol(format!(
                        "upload closed {} bytes short of its declared length",
                        remaining
                    )));
                }
                if let Err(e) = conn.flush() {
                    self.root.free(None, conn);
                    return Err(e.into());
                }
                conn
            }
        };

        let (conn, response) = self.root.receive(conn, false)?;
        match response.status().code() {
            status::OK | status::CREATED | status::NO_CONTENT => ok(&self.root, conn, &response),
            _ => Err(unexpected(&self.root, Method::Put, &self.uri, conn, response)),
        }
    }
}

impl Write for PutStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = match self.sink.as_mut().ok_or_else(closed)? {
            Sink::Chunked(writer) => writer.write(buf),
            Sink::Sized { conn, remaining } => {
                if buf.len() as u64 > *remaining {
                    Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "write exceeds declared length",
                    ))
                } else {
                    conn.write(buf).map(|n| {
                        *remaining -= n as u64;
                        n
                    })
                }
            }
        };
        if written.is_err() {
            self.abort();
        }
        written
    }

    fn flush(&mut self) -> io::Result<()> {
        let flushed = match self.sink.as_mut().ok_or_else(closed)? {
            Sink::Chunked(writer) => writer.flush(),
            Sink::Sized { conn, .. } => Write::flush(conn),
        };
        if flushed.is_err() {
            self.abort();
        }
        flushed
    }
}

impl Drop for PutStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(uri = %self.uri, error = %e, "failed to close upload");
        }
    }
}

impl fmt::Debug for PutStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutStream")
            .field("uri", &self.uri)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Read a whole download into memory
pub fn read_to_bytes(mut stream: GetStream) -> Result<Bytes> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .map_err(http::Error::from_io)?;
    stream.close()?;
    Ok(buf.into())
}
