//! HTTP message parsing
//!
//! This module parses request lines, status lines and header blocks from a
//! line-oriented reader.

use super::ascii::read_ascii_line;
use super::{Error, HeaderList, Method, RequestLine, Result, StatusLine, Version};
use std::io::BufRead;

/// Parse HTTP request line
///
/// Format: METHOD URI VERSION
/// Example: PROPFIND /dav/dir/ HTTP/1.1
pub fn parse_request_line(line: &str) -> Result<RequestLine> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() != 3 {
        return Err(Error::Parse(format!(
            "Invalid request line: expected 3 parts, got {}",
            parts.len()
        )));
    }

    let method = Method::from_str(parts[0])?;
    let version = Version::from_str(parts[2])?;

    Ok(RequestLine::new(method, parts[1], version))
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON
/// Example: HTTP/1.1 207 Multi-Status
pub fn parse_status_line(line: &str) -> Result<StatusLine> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: {:?}",
            line
        )));
    }

    let version = Version::from_str(parts[0])?;
    let code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::InvalidStatus(format!("Invalid status code: {}", parts[1])))?;
    let reason = parts.get(2).copied().unwrap_or("").trim();

    StatusLine::new(version, code, reason)
}

/// Read a status line, skipping nothing; end of stream is `ConnectionClosed`
pub fn read_status_line<R: BufRead + ?Sized>(reader: &mut R) -> Result<StatusLine> {
    match read_ascii_line(reader).map_err(Error::from_io)? {
        Some(line) => parse_status_line(&line),
        None => Err(Error::ConnectionClosed),
    }
}

/// Read header lines up to and including the blank line that ends them
pub fn read_header_block<R: BufRead + ?Sized>(reader: &mut R) -> Result<HeaderList> {
    let mut headers = HeaderList::new();
    loop {
        match read_ascii_line(reader).map_err(Error::from_io)? {
            Some(line) if line.is_empty() => return Ok(headers),
            Some(line) => headers.add_line(&line)?,
            None => {
                return Err(Error::Protocol(
                    "connection closed inside header block".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_line() {
        let line = parse_request_line("MKCOL /dav/new/ HTTP/1.1").unwrap();
        assert_eq!(line.method(), Method::Mkcol);
        assert_eq!(line.uri(), "/dav/new/");
        assert_eq!(line.version(), Version::Http11);
        assert!(parse_request_line("GET /").is_err());
    }

    #[test]
    fn test_parse_status_line() {
        let status = parse_status_line("HTTP/1.1 200 OK").unwrap();
        assert_eq!(status.version(), Version::Http11);
        assert_eq!(status.code(), 200);
        assert_eq!(status.reason(), "OK");

        // Without reason phrase
        let status = parse_status_line("HTTP/1.0 404").unwrap();
        assert_eq!(status.version(), Version::Http10);
        assert_eq!(status.reason(), "Not Found");

        let status = parse_status_line("HTTP/1.1 301 Moved Permanently").unwrap();
        assert_eq!(status.reason(), "Moved Permanently");

        assert!(parse_status_line("garbage").is_err());
        assert!(parse_status_line("HTTP/1.1 abc OK").is_err());
        assert!(parse_status_line("HTTP/2 200 OK").is_err());
    }

    #[test]
    fn test_read_head() {
        let mut input = &b"HTTP/1.1 207 Multi-Status\r\nContent-Type: text/xml\r\nDAV: 1\r\n\r\n<body"[..];
        let status = read_status_line(&mut input).unwrap();
        assert_eq!(status.code(), 207);
        let headers = read_header_block(&mut input).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("dav"), Some("1"));
        assert_eq!(input, b"<body");
    }

    #[test]
    fn test_truncated_head() {
        let mut input = &b""[..];
        assert!(matches!(read_status_line(&mut input), Err(Error::ConnectionClosed)));

        let mut input = &b"Content-Type: text/xml\r\n"[..];
        assert!(matches!(read_header_block(&mut input), Err(Error::Protocol(_))));
    }
}
