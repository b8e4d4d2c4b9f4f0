use std::mem;

use crate::character_types::is_whitespace_byte;
use crate::error::Error;
use crate::message::Part;
use crate::parse_header_field;

/// What a multipart line is, relative to the delimiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineKind {
    Delimiter,
    CloseDelimiter,
    Other,
}

#[derive(Debug, Default)]
struct PartProgress {
    part: Part,
    in_headers: bool,
    header_count: usize,
}

/// Splits a multipart payload into parts, one line at a time.
///
/// Lines are given without their CRLF. The preamble before the first
/// delimiter and the epilogue after the closing delimiter are skipped.
#[derive(Debug)]
pub struct MultipartSplitter {
    delimiter: String,
    max_part_headers: usize,
    current: Option<PartProgress>,
    parts: Vec<Part>,
    closed: bool,
}

impl MultipartSplitter {
    /// `delimiter` is the whole delimiter line, `"--" + boundary`.
    /// Each part may carry up to `max_part_headers` header fields.
    pub fn new(delimiter: String, max_part_headers: usize) -> Self {
        MultipartSplitter {
            delimiter,
            max_part_headers,
            current: None,
            parts: Vec::new(),
            closed: false,
        }
    }

    /// `true` once the closing delimiter went by.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // transport padding may follow a delimiter (RFC 2046, section 5.1.1)
    fn classify(&self, line: &[u8]) -> LineKind {
        let padding = line.iter().rev().take_while(|b| is_whitespace_byte(**b)).count();
        let line = &line[..line.len() - padding];
        let delimiter = self.delimiter.as_bytes();

        if line == delimiter {
            LineKind::Delimiter
        } else if line.len() == delimiter.len() + 2 && line.starts_with(delimiter) && line.ends_with(b"--") {
            LineKind::CloseDelimiter
        } else {
            LineKind::Other
        }
    }

    fn close_part(&mut self) {
        if let Some(mut progress) = self.current.take() {
            // the CRLF before a delimiter belongs to the delimiter
            if progress.part.content.ends_with(b"\r\n") {
                let len = progress.part.content.len();
                progress.part.content.truncate(len - 2);
            }
            self.parts.push(progress.part);
        }
    }

    pub fn push_line(&mut self, line: &[u8]) -> Result<(), Error> {
        if self.closed {
            return Ok(())
        }

        match self.classify(line) {
            LineKind::CloseDelimiter => {
                self.close_part();
                self.closed = true;
            }
            LineKind::Delimiter => {
                self.close_part();
                self.current = Some(PartProgress { in_headers: true, ..PartProgress::default() });
            }
            LineKind::Other => {
                let max_part_headers = self.max_part_headers;
                let progress = match self.current.as_mut() {
                    Some(progress) => progress,
                    None => return Ok(()),
                };

                if progress.in_headers && line.is_empty() {
                    progress.in_headers = false;
                } else if progress.in_headers {
                    progress.header_count += 1;
                    if progress.header_count > max_part_headers {
                        return Err(Error::TooManyHeaders)
                    }
                    let (name, value) = parse_header_field(line)?;
                    progress.part.headers.set(name, value);
                } else {
                    progress.part.content.extend_from_slice(line);
                    progress.part.content.extend_from_slice(b"\r\n");
                }
            }
        }
        Ok(())
    }

    /// Feeds a whole payload that is already in memory.
    pub fn push_body(&mut self, body: &[u8]) -> Result<(), Error> {
        let mut rest = body;
        while !rest.is_empty() && !self.closed {
            match rest.windows(2).position(|w| w == b"\r\n") {
                Some(end) => {
                    self.push_line(&rest[..end])?;
                    rest = &rest[end + 2..];
                }
                None => {
                    self.push_line(rest)?;
                    break
                }
            }
        }
        Ok(())
    }

    pub fn take_parts(&mut self) -> Vec<Part> {
        mem::take(&mut self.parts)
    }
}
