//! Response body reading
//!
//! `BodyReader` applies the framing recorded in a `Body` descriptor to the
//! connection's input, and knows how to drain whatever is left so the
//! connection can carry the next exchange.

use super::chunked::ChunkedReader;
use super::message::{Body, Framing};
use super::window::WindowReader;
use std::io::{self, BufRead, Read};

pub enum BodyReader<R: BufRead> {
    Chunked(ChunkedReader<R>),
    Window(WindowReader<R>),
    UntilClose(R),
    Empty(R),
}

impl<R: BufRead> BodyReader<R> {
    /// Wrap `reader` according to `body`; `None` means the response has no body
    pub fn new(reader: R, body: Option<&Body>) -> Self {
        match body.map(Body::framing) {
            None => BodyReader::Empty(reader),
            Some(Framing::Chunked) => BodyReader::Chunked(ChunkedReader::new(reader)),
            Some(Framing::Length(n)) => BodyReader::Window(WindowReader::new(reader, n)),
            Some(Framing::UntilClose) => BodyReader::UntilClose(reader),
        }
    }

    /// Read and discard the rest of the body
    pub fn drain(&mut self) -> io::Result<u64> {
        match self {
            BodyReader::Chunked(r) => io::copy(r, &mut io::sink()),
            BodyReader::Window(r) => {
                let left = r.remaining();
                r.close()?;
                Ok(left)
            }
            BodyReader::UntilClose(r) => io::copy(r, &mut io::sink()),
            BodyReader::Empty(_) => Ok(0),
        }
    }

    /// Read the whole body into memory
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Return the underlying reader
    pub fn into_inner(self) -> R {
        match self {
            BodyReader::Chunked(r) => r.into_inner(),
            BodyReader::Window(r) => r.into_inner(),
            BodyReader::UntilClose(r) | BodyReader::Empty(r) => r,
        }
    }
}

impl<R: BufRead> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BodyReader::Chunked(r) => r.read(buf),
            BodyReader::Window(r) => r.read(buf),
            BodyReader::UntilClose(r) => r.read(buf),
            BodyReader::Empty(_) => Ok(0),
        }
    }
}
