//! Length-bounded input
//!
//! `WindowReader` exposes exactly `Content-Length` bytes of the underlying
//! stream. Closing it early skips the unread part of the window, so the next
//! response on the same connection starts at the right byte.

use std::io::{self, Read};

pub struct WindowReader<R: Read> {
    reader: R,
    remaining: u64,
}

impl<R: Read> WindowReader<R> {
    /// Create a window over the next `length` bytes of `reader`
    pub fn new(reader: R, length: u64) -> Self {
        WindowReader {
            reader,
            remaining: length,
        }
    }

    /// Bytes of the window not read yet
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Discard the unread rest of the window
    pub fn close(&mut self) -> io::Result<()> {
        let mut scratch = [0u8; 4096];
        while self.remaining > 0 {
            self.read(&mut scratch)?;
        }
        Ok(())
    }

    /// Get a mutable reference to the underlying reader
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume the window and return the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Read for WindowReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(buf.len());
        let n = self.reader.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("premature end of body, {} bytes missing", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
