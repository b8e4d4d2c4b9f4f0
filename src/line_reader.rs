use std::mem;

use tracing::trace;

use crate::error::Error;

const CRLF: &[u8] = b"\r\n";

/// Byte accumulator sitting between the transport and the parser.
///
/// Each `read_*` method consumes bytes from `buffer[*cursor..]`, advances
/// `cursor`, and yields a unit only once it is complete. Incomplete units
/// stay buffered until the next call, so a request may be delivered in
/// pieces of any size.
///
/// Every consumed byte counts against `max_size`, whatever is being read.
#[derive(Debug)]
pub struct LineReader {
    accumulator: Vec<u8>,
    length_counter: usize,
    max_size: usize,
}

impl LineReader {
    pub fn new(max_size: usize) -> Self {
        Self { accumulator: Vec::new(), length_counter: 0, max_size }
    }

    /// Total number of bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.length_counter
    }

    /// Bytes held back while waiting for the rest of a unit.
    pub fn buffered(&self) -> usize {
        self.accumulator.len()
    }

    fn take_byte(&mut self, buffer: &[u8], cursor: &mut usize) -> Result<u8, Error> {
        let byte = buffer[*cursor];
        *cursor += 1;
        self.length_counter += 1;
        if self.length_counter > self.max_size {
            trace!(max_size = self.max_size, "request size limit exceeded");
            return Err(Error::RequestTooLarge)
        }
        self.accumulator.push(byte);
        Ok(byte)
    }

    fn is_end_of_line(&self) -> bool {
        self.accumulator.ends_with(CRLF)
    }

    /// Reads up to and including the next CRLF. A bare LF does not end a line.
    pub fn read_line(&mut self, buffer: &[u8], cursor: &mut usize) -> Result<Option<Vec<u8>>, Error> {
        while *cursor < buffer.len() {
            self.take_byte(buffer, cursor)?;
            if self.is_end_of_line() {
                return Ok(Some(mem::take(&mut self.accumulator)))
            }
        }
        Ok(None)
    }

    /// Reads exactly `expected_size` opaque bytes followed by a CRLF.
    ///
    /// The returned chunk data does not include the CRLF.
    pub fn read_chunk(
        &mut self,
        expected_size: usize,
        buffer: &[u8],
        cursor: &mut usize,
    ) -> Result<Option<Vec<u8>>, Error> {
        while *cursor < buffer.len() {
            let byte = self.take_byte(buffer, cursor)?;
            let len = self.accumulator.len();
            if len == expected_size + 1 && byte != b'\r' {
                return Err(Error::InvalidChunkTerminator)
            }
            if len == expected_size + CRLF.len() {
                if !self.is_end_of_line() {
                    return Err(Error::InvalidChunkTerminator)
                }
                let mut chunk = mem::take(&mut self.accumulator);
                chunk.truncate(expected_size);
                return Ok(Some(chunk))
            }
        }
        Ok(None)
    }

    /// Reads payload bytes until a CRLF, `limit` bytes, or the end of
    /// `buffer`, whichever comes first.
    ///
    /// Unlike the other methods this always yields what it has read, since
    /// the payload has no structure worth waiting for.
    pub fn read_payload(&mut self, limit: usize, buffer: &[u8], cursor: &mut usize) -> Result<Vec<u8>, Error> {
        while *cursor < buffer.len() && self.accumulator.len() < limit {
            self.take_byte(buffer, cursor)?;
            if self.is_end_of_line() {
                break
            }
        }
        Ok(mem::take(&mut self.accumulator))
    }
}
