//! ASCII line framing
//!
//! `AsciiStream` buffers both directions of one transport and reads or
//! writes CRLF-terminated lines without over-reading past a line boundary,
//! so the body that follows a header block stays available to the body
//! readers.

use super::{CRLF, MAX_LINE};
use bytes::{Buf, BytesMut};
use std::io::{self, BufRead, Read, Write};

/// Size of the read and write buffers
pub const BUFFER_SIZE: usize = 8192;

/// Read one line terminated by CRLF or LF
///
/// Returns the line without its terminator, or `None` when the stream
/// ended before any byte of a new line. Bytes after the terminator are
/// left in the reader.
pub fn read_ascii_line<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = Vec::new();
    let mut seen_any = false;

    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            if !seen_any {
                return Ok(None);
            }
            break;
        }
        seen_any = true;

        let (taken, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos, true),
            None => (available.len(), false),
        };
        line.extend_from_slice(&available[..taken]);
        reader.consume(if done { taken + 1 } else { taken });

        if line.len() > MAX_LINE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {} bytes", MAX_LINE),
            ));
        }
        if done {
            break;
        }
    }

    if line.last() == Some(&b'\r') {
        line.pop();
    }
    if !line.is_ascii() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "non-ASCII bytes in protocol line",
        ));
    }
    // ASCII is valid UTF-8
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Buffered line-oriented view of one transport
pub struct AsciiStream<S> {
    inner: S,
    input: BytesMut,
    output: BytesMut,
}

impl<S: Read + Write> AsciiStream<S> {
    /// Create a new stream over a transport
    pub fn new(inner: S) -> Self {
        AsciiStream {
            inner,
            input: BytesMut::with_capacity(BUFFER_SIZE),
            output: BytesMut::with_capacity(BUFFER_SIZE),
        }
    }

    /// Read one line, see [`read_ascii_line`]
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        read_ascii_line(self)
    }

    /// Write `line` followed by CRLF; does not flush
    pub fn write_ascii_line(&mut self, line: &str) -> io::Result<()> {
        self.write_all(line.as_bytes())?;
        self.write_all(CRLF.as_bytes())
    }

    /// Bytes received but not consumed yet
    pub fn buffered_input(&self) -> usize {
        self.input.len()
    }

    /// Bytes received but not consumed yet, without reading more
    pub fn buffered(&self) -> &[u8] {
        &self.input[..]
    }

    /// Get a reference to the underlying transport
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the underlying transport
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the stream and return the transport; buffered bytes are lost
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn write_buffered(&mut self) -> io::Result<()> {
        if !self.output.is_empty() {
            self.inner.write_all(&self.output)?;
            self.output.clear();
        }
        Ok(())
    }
}

impl<S: Read + Write> Read for AsciiStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Large reads bypass the buffer once it is drained
        if self.input.is_empty() && buf.len() >= BUFFER_SIZE {
            return self.inner.read(buf);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<S: Read + Write> BufRead for AsciiStream<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.input.is_empty() {
            self.input.resize(BUFFER_SIZE, 0);
            match self.inner.read(&mut self.input[..]) {
                Ok(n) => self.input.truncate(n),
                Err(e) => {
                    self.input.clear();
                    return Err(e);
                }
            }
        }
        Ok(&self.input[..])
    }

    fn consume(&mut self, amt: usize) {
        self.input.advance(amt.min(self.input.len()));
    }
}

impl<S: Read + Write> Write for AsciiStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.output.len() + buf.len() > BUFFER_SIZE {
            self.write_buffered()?;
        }
        if buf.len() >= BUFFER_SIZE {
            self.inner.write(buf)
        } else {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_buffered()?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory duplex: reads from `input`, collects writes in `written`
    struct Duplex {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Duplex {
        fn new(input: &[u8]) -> Self {
            Duplex {
                input: Cursor::new(input.to_vec()),
                written: Vec::new(),
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_read_lines_crlf_and_lf() {
        let mut stream = AsciiStream::new(Duplex::new(b"HTTP/1.1 200 OK\r\nA: b\n\r\nbody"));
        assert_eq!(stream.read_line().unwrap().as_deref(), Some("HTTP/1.1 200 OK"));
        assert_eq!(stream.read_line().unwrap().as_deref(), Some("A: b"));
        assert_eq!(stream.read_line().unwrap().as_deref(), Some(""));

        // The body is still there, nothing was over-read
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"body");
        assert_eq!(stream.read_line().unwrap(), None);
    }

    #[test]
    fn test_line_split_across_fills() {
        // A reader that hands out one byte at a time
        let mut reader = io::BufReader::with_capacity(1, &b"abc\r\ndef"[..]);
        assert_eq!(read_ascii_line(&mut reader).unwrap().as_deref(), Some("abc"));
        assert_eq!(read_ascii_line(&mut reader).unwrap().as_deref(), Some("def"));
        assert_eq!(read_ascii_line(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_rejects_non_ascii() {
        let mut reader = &b"caf\xc3\xa9\r\n"[..];
        assert!(read_ascii_line(&mut reader).is_err());
    }

    #[test]
    fn test_rejects_long_line_in_one_fill() {
        let mut data = vec![b'a'; MAX_LINE + 10];
        data.extend_from_slice(b"\r\n");
        let mut reader = &data[..];
        let err = read_ascii_line(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let mut data = vec![b'a'; MAX_LINE];
        data.extend_from_slice(b"\n");
        assert_eq!(read_ascii_line(&mut &data[..]).unwrap().map(|line| line.len()), Some(MAX_LINE));
    }

    #[test]
    fn test_write_is_buffered_until_flush() {
        let mut stream = AsciiStream::new(Duplex::new(b""));
        stream.write_ascii_line("GET / HTTP/1.1").unwrap();
        stream.write_ascii_line("").unwrap();
        assert!(stream.get_ref().written.is_empty());

        stream.flush().unwrap();
        assert_eq!(stream.get_ref().written, b"GET / HTTP/1.1\r\n\r\n");
    }
}
