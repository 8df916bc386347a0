//! Chunked transfer encoding support
//!
//! This module provides stream wrappers that encode and decode HTTP chunked
//! transfer encoding.

use super::ascii::read_ascii_line;
use super::{Result, CRLF};
use std::io::{self, BufRead, Read, Write};

/// Chunked encoder
///
/// Every non-empty `write` becomes one chunk; `finish` emits the
/// terminating zero-length chunk.
pub struct ChunkedWriter<W: Write> {
    writer: W,
    finished: bool,
}

impl<W: Write> ChunkedWriter<W> {
    /// Create a new chunked encoder
    pub fn new(writer: W) -> Self {
        ChunkedWriter {
            writer,
            finished: false,
        }
    }

    /// Write the final chunk (0-sized chunk); later calls do nothing
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.finished {
            self.finished = true;
            write!(self.writer, "0{}{}", CRLF, CRLF)?;
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Get a reference to the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Get a mutable reference to the underlying writer
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consume the encoder and return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Write for ChunkedWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after final chunk",
            ));
        }
        if data.is_empty() {
            return Ok(0);
        }

        // Write chunk size in hex
        write!(self.writer, "{:x}{}", data.len(), CRLF)?;

        // Write chunk data
        self.writer.write_all(data)?;

        // Write trailing CRLF
        self.writer.write_all(CRLF.as_bytes())?;

        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Complete,
}

/// Chunked decoder
///
/// Yields the payload of a chunked body and reports end-of-body once the
/// zero-length chunk and its trailer have been read. A stream that ends
/// before that is an `UnexpectedEof` error, never a silent truncation.
pub struct ChunkedReader<R: BufRead> {
    reader: R,
    state: DecoderState,
    remaining: u64,
}

impl<R: BufRead> ChunkedReader<R> {
    /// Create a new chunked decoder
    pub fn new(reader: R) -> Self {
        ChunkedReader {
            reader,
            state: DecoderState::ChunkSize,
            remaining: 0,
        }
    }

    /// Check if the terminating chunk was read
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }

    /// Get a mutable reference to the underlying reader
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume the decoder and return the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn next_line(&mut self) -> io::Result<String> {
        read_ascii_line(&mut self.reader)?.ok_or_else(|| premature("chunk header"))
    }

    fn read_chunk_size(&mut self) -> io::Result<()> {
        let line = self.next_line()?;
        // Chunk extensions (after semicolon) are ignored
        let size_str = line.split(';').next().unwrap_or("").trim();
        self.remaining = u64::from_str_radix(size_str, 16).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid chunk size: {:?}", size_str),
            )
        })?;

        if self.remaining == 0 {
            // Trailer headers are skipped up to the empty line
            loop {
                if self.next_line()?.is_empty() {
                    break;
                }
            }
            self.state = DecoderState::Complete;
        } else {
            self.state = DecoderState::ChunkData;
        }
        Ok(())
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                DecoderState::ChunkSize => self.read_chunk_size()?,
                DecoderState::ChunkData => {
                    let max = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(buf.len());
                    let n = self.reader.read(&mut buf[..max])?;
                    if n == 0 {
                        return Err(premature("chunk data"));
                    }
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = DecoderState::ChunkEnd;
                    }
                    return Ok(n);
                }
                DecoderState::ChunkEnd => {
                    let line = self.next_line()?;
                    if !line.is_empty() {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "Expected CRLF after chunk",
                        ));
                    }
                    self.state = DecoderState::ChunkSize;
                }
                DecoderState::Complete => return Ok(0),
            }
        }
    }
}

fn premature(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("premature end of chunked body in {}", what),
    )
}

/// Decode complete chunked body from bytes
pub fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    ChunkedReader::new(input)
        .read_to_end(&mut output)
        .map_err(super::Error::from_io)?;
    Ok(output)
}

/// Encode data as chunked body
pub fn encode_chunked_body(data: &[u8], chunk_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut encoder = ChunkedWriter::new(&mut output);

    for chunk in data.chunks(chunk_size.max(1)) {
        encoder.write_all(chunk)?;
    }

    encoder.finish()?;

    Ok(output)
}
