//! Scripted HTTP/1.1 server for integration tests
//!
//! Each accepted connection gets its own thread that keeps reading requests
//! until the client hangs up or a reply asks to close. Every request is
//! recorded; the reply comes from the handler closure.

#![allow(dead_code)]

use davnode::http::ascii::read_ascii_line;
use davnode::http::parser::{parse_request_line, read_header_block};
use davnode::http::{message::reason_phrase, ChunkedReader, Header, HeaderList, Method};
use std::io::{BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderList,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    close: bool,
}

impl Reply {
    pub fn new(status: u16) -> Self {
        Reply {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            close: false,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// `207 Multi-Status` with an XML body
    pub fn multistatus(body: &str) -> Self {
        Reply::new(207)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body)
    }

    pub fn close(mut self) -> Self {
        self.close = true;
        self
    }
}

type Handler = dyn Fn(&Recorded) -> Reply + Send + Sync;

pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    connections: Arc<AtomicUsize>,
}

impl MockServer {
    pub fn start<F>(handler: F) -> MockServer
    where
        F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = Arc::clone(&requests);
        let accepted = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accepted.fetch_add(1, Ordering::SeqCst);
                let handler = Arc::clone(&handler);
                let recorded = Arc::clone(&recorded);
                thread::spawn(move || serve(stream, handler, recorded));
            }
        });

        MockServer {
            addr,
            requests,
            connections,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.addr.port(), path)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// `"METHOD uri"` for every request so far
    pub fn log(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.uri))
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn serve(stream: TcpStream, handler: Arc<Handler>, recorded: Arc<Mutex<Vec<Recorded>>>) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    loop {
        let Ok(Some(line)) = read_ascii_line(&mut reader) else {
            return;
        };
        let request_line = parse_request_line(&line).unwrap();
        let Ok(headers) = read_header_block(&mut reader) else {
            return;
        };

        // A client that gives up mid-body just closes the connection
        let mut body = Vec::new();
        let complete = if headers
            .get(Header::TRANSFER_ENCODING)
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
        {
            ChunkedReader::new(&mut reader).read_to_end(&mut body).is_ok()
        } else if let Some(length) = headers.get(Header::CONTENT_LENGTH) {
            body.resize(length.parse().unwrap(), 0);
            reader.read_exact(&mut body).is_ok()
        } else {
            true
        };
        if !complete {
            return;
        }

        let request = Recorded {
            method: request_line.method(),
            uri: request_line.uri().to_string(),
            headers,
            body,
        };
        recorded.lock().unwrap().push(request.clone());

        let reply = handler(&request);
        if write_reply(&mut writer, &request, &reply).is_err() || reply.close {
            return;
        }
    }
}

fn write_reply(writer: &mut TcpStream, request: &Recorded, reply: &Reply) -> std::io::Result<()> {
    let mut out = format!("HTTP/1.1 {} {}\r\n", reply.status, reason_phrase(reply.status));
    for (name, value) in &reply.headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    let framed = reply.headers.iter().any(|(name, _)| {
        name.eq_ignore_ascii_case(Header::CONTENT_LENGTH)
            || name.eq_ignore_ascii_case(Header::TRANSFER_ENCODING)
    });
    let bodiless = matches!(reply.status, 204 | 304) || reply.status < 200;
    if !framed && !bodiless {
        out.push_str(&format!("Content-Length: {}\r\n", reply.body.len()));
    }
    if reply.close {
        out.push_str("Connection: close\r\n");
    }
    out.push_str("\r\n");

    let mut bytes = out.into_bytes();
    if request.method != Method::Head && !bodiless {
        bytes.extend_from_slice(&reply.body);
    }
    writer.write_all(&bytes)?;
    writer.flush()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// Multistatus body with one response per `(href, collection)` pair
pub fn listing(entries: &[(&str, bool)]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><D:multistatus xmlns:D="DAV:">"#);
    for (href, collection) in entries {
        let kind = if *collection { "<D:collection/>" } else { "" };
        xml.push_str(&format!(
            "<D:response><D:href>{}</D:href><D:propstat><D:prop><D:resourcetype>{}</D:resourcetype></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>",
            href, kind
        ));
    }
    xml.push_str("</D:multistatus>");
    xml
}

/// Multistatus body reporting one property value for `href`
pub fn property(href: &str, name: &str, value: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:"><D:response><D:href>{href}</D:href><D:propstat><D:prop><D:{name}>{value}</D:{name}></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"#
    )
}
