#![forbid(unsafe_code)]

//! An incremental, strict HTTP/1.1 request parser for an nginx-like server
//!
//! See [RFC 7230](https://tools.ietf.org/html/rfc7230).
//!
//! The transport hands over whatever it reads from the socket, in pieces of
//! any size, and the parser turns them into a [`RequestMessage`]. Nothing is
//! ever written back: a failure is returned as an [`Error`] carrying the
//! status code of the response to send.
//!
//! # Simple example
//!
//! ```
//! use webserv_request::{Config, RequestParser};
//!
//! let mut parser = RequestParser::new(&Config::DEFAULT);
//! parser.feed(b"GET /index.html HTTP/1.1\r\nHo").unwrap();
//! assert!(!parser.is_finished());
//! parser.feed(b"st: example.com\r\n\r\n").unwrap();
//! assert!(parser.is_finished());
//!
//! let request = parser.into_request().unwrap();
//! assert_eq!(request.method(), http::Method::GET);
//! assert_eq!(request.target(), "/index.html");
//! assert_eq!(request.header_value("host"), Some("example.com"));
//! ```
//!
//! # Rejecting a request
//!
//! ```
//! use webserv_request::{Config, Error, parse_request};
//!
//! let err = parse_request(b"POST /form HTTP/1.1\r\nHost: x\r\n\r\n", &Config::DEFAULT).unwrap_err();
//! assert_eq!(err, Error::LengthRequired);
//! assert_eq!(err.status(), http::StatusCode::LENGTH_REQUIRED);
//!
//! let response = webserv_request::unparse_response_sync(&webserv_request::error_response(&err));
//! assert!(response.starts_with(b"HTTP/1.1 411 Length Required\r\n"));
//! ```

use std::io;
use std::mem;
use std::str;

use http::{
    Method,
    StatusCode,
    Version,
};
use tracing::{debug, trace};

mod character_types;
use character_types::{
    is_header_value_byte,
    is_token,
    is_whitespace_byte,
    trim_whitespace,
};

mod error;
pub use error::Error;

mod line_reader;
pub use line_reader::LineReader;

mod message;
pub use message::{
    canonical_header_name,
    HeaderFields,
    Part,
    RequestMessage,
};

mod multipart;
use multipart::MultipartSplitter;

mod parse_headers;
use parse_headers::Framing;

mod uri;
pub use uri::parse_request_target;

mod unparse;
pub use unparse::{
    error_response,
    unparse_response_head,
    unparse_response_sync,
};


/// Parser configuration.
///
/// Mostly used for limiting lengths (and prevents DoS attacks).
/// You should always use `DEFAULT` unless you really know what
/// you are doing.
#[derive(Copy, Clone, Debug)]
pub struct Config {

    /// Every byte of a request, from the request line to the last
    /// trailer, counts against this limit
    pub max_request_size: usize,

    /// Ceiling for a declared `Content-Length`, a single chunk size and
    /// the decoded length of a chunked payload
    pub max_payload_length: usize,

    /// The “request target” is the thing between the method name and the HTTP version
    /// in the first line. Usually it’s an URI (but not always).
    pub max_request_target_length: usize,

    /// How many header fields are allowed, trailers included. Each part of
    /// a multipart body gets the same allowance for its own headers.
    pub max_header_count: usize,

    /// Size of the reads performed by `read_request`
    pub read_buffer_size: usize,
}

impl Config {
    /// Should be sane defaults, suitable for most users.
    pub const DEFAULT: Config = Config {
        max_request_size: 2 * 1024 * 1024,
        max_payload_length: 1024 * 1024,
        max_request_target_length: 4 * 1024,
        max_header_count: 64,
        read_buffer_size: 4 * 1024,
    };
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}


const SUPPORTED_METHODS: &[Method] = &[
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
    Method::PATCH,
];

fn longest_method_length() -> usize {
    SUPPORTED_METHODS.iter().map(|m| m.as_str().len()).max().unwrap_or(0)
}

/// Methods are case-sensitive. A token longer than any supported method
/// is answered with 501, any other unknown token with 400.
fn parse_method(token: &[u8]) -> Result<Method, Error> {
    if token.len() > longest_method_length() {
        return Err(Error::MethodNotImplemented)
    }
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str().as_bytes() == token)
        .cloned()
        .ok_or(Error::UnknownMethod)
}

fn parse_version(token: &[u8]) -> Result<Version, Error> {
    match token {
        b"HTTP/1.0" => Ok(Version::HTTP_10),
        b"HTTP/1.1" => Ok(Version::HTTP_11),
        [b'H', b'T', b'T', b'P', b'/', maj, b'.', min]
            if maj.is_ascii_digit() && min.is_ascii_digit() => Err(Error::UnsupportedVersion),
        _ => Err(Error::InvalidVersion),
    }
}

/// Splits `name: value` on the first colon. Folded lines (starting with
/// whitespace) fail because the name must be a token.
fn parse_header_field(line: &[u8]) -> Result<(&str, &str), Error> {
    let colon = line.iter().position(|b| *b == b':').ok_or(Error::InvalidHeader)?;
    let name = &line[..colon];
    let value = trim_whitespace(&line[colon + 1..]);

    // `_` would fold into `-` once canonicalized
    if !is_token(name) || name.contains(&b'_') {
        return Err(Error::InvalidHeader)
    }
    if !value.iter().all(|b| is_header_value_byte(*b)) {
        return Err(Error::InvalidHeader)
    }

    let name = str::from_utf8(name).map_err(|_| Error::InvalidHeader)?;
    let value = str::from_utf8(value).map_err(|_| Error::InvalidHeader)?;
    Ok((name, value))
}

/// Only the leading hex digits count, chunk extensions are ignored.
fn parse_chunk_size(line: &[u8], config: &Config) -> Result<usize, Error> {
    let digits = line.iter().take_while(|b| b.is_ascii_hexdigit()).count();
    if digits == 0 {
        return Err(Error::InvalidChunkSize)
    }

    let digits_str = str::from_utf8(&line[..digits]).map_err(|_| Error::InvalidChunkSize)?;
    let size = u64::from_str_radix(digits_str, 16).map_err(|_| Error::ChunkTooLarge)?;

    if size > config.max_payload_length as u64 {
        Err(Error::ChunkTooLarge)
    } else {
        Ok(size as usize)
    }
}

fn strip_crlf(mut line: Vec<u8>) -> Vec<u8> {
    line.truncate(line.len().saturating_sub(2));
    line
}


/// Parsing states, in the only order they can be visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    RequestLine,
    Header,
    Payload,
    ChunkedPayload,
    MultipartPayload,
    Trailer,
    Finished,
}

/// Everything the parser tracks for one request, besides the request
/// itself.
#[derive(Debug)]
struct Session {
    state: State,
    framing: Framing,
    remaining_payload: u64,
    /// `None` while waiting for a chunk-size line
    chunk_remaining: Option<usize>,
    decoded_body: Vec<u8>,
    /// Set for `multipart/*` requests
    multipart: Option<MultipartSplitter>,
    header_count: usize,
    failure: Option<StatusCode>,
}

impl Session {
    fn new() -> Self {
        Session {
            state: State::RequestLine,
            framing: Framing::NotFound,
            remaining_payload: 0,
            chunk_remaining: None,
            decoded_body: Vec::new(),
            multipart: None,
            header_count: 0,
            failure: None,
        }
    }
}

/// Incremental request parser.
///
/// One parser handles exactly one request. Feed it bytes as they arrive
/// until [`is_finished`](RequestParser::is_finished) returns `true`, then
/// take the request with [`into_request`](RequestParser::into_request).
/// The first error ends parsing for good.
#[derive(Debug)]
pub struct RequestParser {
    config: Config,
    reader: LineReader,
    session: Session,
    request: RequestMessage,
}

impl RequestParser {
    pub fn new(config: &Config) -> Self {
        RequestParser {
            config: *config,
            reader: LineReader::new(config.max_request_size),
            session: Session::new(),
            request: RequestMessage::new(),
        }
    }

    pub fn state(&self) -> State {
        self.session.state
    }

    /// `true` once the request is complete or has been rejected.
    pub fn is_finished(&self) -> bool {
        self.session.state == State::Finished
    }

    /// The status of the error that ended parsing, if any.
    pub fn failure(&self) -> Option<StatusCode> {
        self.session.failure
    }

    /// The parsed request, available once parsing finished successfully.
    pub fn request(&self) -> Option<&RequestMessage> {
        if self.is_finished() && self.session.failure.is_none() {
            Some(&self.request)
        } else {
            None
        }
    }

    pub fn into_request(self) -> Option<RequestMessage> {
        if self.is_finished() && self.session.failure.is_none() {
            Some(self.request)
        } else {
            None
        }
    }

    /// Consumes bytes from `buffer` and returns how many were used.
    ///
    /// All of `buffer` is used unless the request ends inside it: the
    /// remaining bytes belong to whatever follows on the connection.
    /// Once finished, the parser consumes nothing.
    pub fn feed(&mut self, buffer: &[u8]) -> Result<usize, Error> {
        let mut cursor = 0;
        while cursor < buffer.len() && !self.is_finished() {
            match self.step(buffer, &mut cursor) {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => return Err(self.raise(error)),
            }
        }
        Ok(cursor)
    }

    fn raise(&mut self, error: Error) -> Error {
        debug!(status = %error.status(), %error, state = ?self.session.state, "rejecting request");
        self.session.failure = Some(error.status());
        self.session.state = State::Finished;
        error
    }

    fn transition(&mut self, next: State) {
        trace!(from = ?self.session.state, to = ?next, "parser transition");
        self.session.state = next;
    }

    fn consume_payload_bytes(&mut self, count: usize) -> Result<(), Error> {
        self.session.remaining_payload = self.session.remaining_payload
            .checked_sub(count as u64)
            .ok_or(Error::PayloadOverrun)?;
        Ok(())
    }

    /// Reads the next unit for the current state and dispatches it.
    /// Returns `false` if `buffer` ran out before a unit was complete.
    fn step(&mut self, buffer: &[u8], cursor: &mut usize) -> Result<bool, Error> {
        let unit = match (self.session.state, self.session.chunk_remaining) {
            (State::ChunkedPayload, Some(size)) => self.reader.read_chunk(size, buffer, cursor)?,
            (State::Payload, _) => {
                let limit = usize::try_from(self.session.remaining_payload).unwrap_or(usize::MAX);
                let payload = self.reader.read_payload(limit, buffer, cursor)?;
                self.consume_payload_bytes(payload.len())?;
                Some(payload)
            }
            (State::MultipartPayload, _) if self.multipart_closed() => {
                // epilogue up to the declared length
                let limit = usize::try_from(self.session.remaining_payload).unwrap_or(usize::MAX);
                let epilogue = self.reader.read_payload(limit, buffer, cursor)?;
                self.consume_payload_bytes(epilogue.len())?;
                Some(epilogue)
            }
            (State::MultipartPayload, _) => match self.reader.read_line(buffer, cursor)? {
                Some(line) => {
                    if self.session.framing == Framing::ContentLength {
                        self.consume_payload_bytes(line.len())?;
                    }
                    Some(strip_crlf(line))
                }
                None => None,
            },
            _ => self.reader.read_line(buffer, cursor)?.map(strip_crlf),
        };

        match unit {
            Some(unit) => {
                self.dispatch(unit)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn dispatch(&mut self, unit: Vec<u8>) -> Result<(), Error> {
        trace!(state = ?self.session.state, len = unit.len(), "dispatching unit");
        match self.session.state {
            State::RequestLine => self.parse_request_line(&unit),
            State::Header => self.parse_header(&unit),
            State::Payload => self.parse_payload(&unit),
            State::ChunkedPayload => self.decode_chunked(&unit),
            State::MultipartPayload => self.parse_multipart_payload(&unit),
            State::Trailer => self.parse_trailer(&unit),
            State::Finished => Ok(()),
        }
    }

    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), Error> {
        if line.iter().any(|b| b.is_ascii_control() && !is_whitespace_byte(*b)) {
            return Err(Error::InvalidRequestLine)
        }

        let segments: Vec<&[u8]> = line
            .split(|b| is_whitespace_byte(*b))
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() != 3 {
            return Err(Error::InvalidRequestLine)
        }

        let method = parse_method(segments[0])?;
        let uri = parse_request_target(segments[1], &method, &self.config)?;
        let target = str::from_utf8(segments[1]).map_err(|_| Error::InvalidRequestTarget)?;
        let version = parse_version(segments[2])?;

        self.request.set_method(method);
        self.request.set_target(target.to_owned(), uri);
        self.request.set_version(version);
        self.transition(State::Header);
        Ok(())
    }

    fn count_header(&mut self) -> Result<(), Error> {
        self.session.header_count += 1;
        if self.session.header_count > self.config.max_header_count {
            return Err(Error::TooManyHeaders)
        }
        Ok(())
    }

    fn parse_header(&mut self, line: &[u8]) -> Result<(), Error> {
        if line.is_empty() {
            return self.finish_headers()
        }
        self.count_header()?;
        let (name, value) = parse_header_field(line)?;
        self.request.set_header(name, value);
        Ok(())
    }

    /// Runs once, on the edge between the header section and the payload:
    /// decides the framing and the state that reads the payload.
    fn finish_headers(&mut self) -> Result<(), Error> {
        // multipart detection goes first, a multipart body delimits itself
        let delimiter = match self.request.header_value("Content-Type") {
            Some(content_type) => parse_headers::multipart_delimiter(content_type)?,
            None => None,
        };
        let framing = self.determine_framing(delimiter.is_some())?;
        debug!(
            ?framing,
            remaining = self.session.remaining_payload,
            multipart = delimiter.is_some(),
            "request head parsed"
        );

        self.session.framing = framing;
        let next = match framing {
            Framing::Chunked => {
                self.session.chunk_remaining = None;
                self.session.decoded_body.clear();
                State::ChunkedPayload
            }
            Framing::ContentLength if self.session.remaining_payload == 0 => State::Finished,
            _ if delimiter.is_some() => State::MultipartPayload,
            Framing::ContentLength => State::Payload,
            Framing::NotFound => State::Finished,
        };
        if next != State::Finished {
            self.session.multipart = delimiter
                .map(|delimiter| MultipartSplitter::new(delimiter, self.config.max_header_count));
        }
        self.transition(next);
        Ok(())
    }

    fn determine_framing(&mut self, multipart: bool) -> Result<Framing, Error> {
        let content_length = self.request.header_value("Content-Length").map(str::to_owned);
        let transfer_encoding = self.request.header_value("Transfer-Encoding").map(str::to_owned);

        match (content_length, transfer_encoding) {
            // Transfer-Encoding overrides Content-Length
            (_, Some(te)) => match parse_headers::parse_transfer_encoding(&te)? {
                Framing::Chunked => Ok(Framing::Chunked),
                _ => Err(Error::LengthRequired),
            },

            (Some(cl), None) => {
                let length = parse_headers::parse_content_length(&cl)?;
                if length > self.config.max_payload_length as u64 {
                    return Err(Error::ContentTooLarge)
                }
                self.request.update_header("Content-Length", &length.to_string());
                self.session.remaining_payload = length;
                Ok(Framing::ContentLength)
            }

            (None, None) => {
                if !multipart && *self.request.method() == Method::POST {
                    return Err(Error::LengthRequired)
                }
                Ok(Framing::NotFound)
            }
        }
    }

    fn parse_payload(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.request.append_body(payload);
        if self.session.remaining_payload == 0 {
            self.transition(State::Finished);
        }
        Ok(())
    }

    fn decode_chunked(&mut self, unit: &[u8]) -> Result<(), Error> {
        match self.session.chunk_remaining {
            Some(size) => {
                self.session.decoded_body.extend_from_slice(unit);
                if self.session.decoded_body.len() > self.config.max_payload_length {
                    return Err(Error::ContentTooLarge)
                }
                let left = size.saturating_sub(unit.len());
                self.session.chunk_remaining = if left == 0 { None } else { Some(left) };
                Ok(())
            }
            None => {
                let size = parse_chunk_size(unit, &self.config)?;
                if size == 0 {
                    self.finish_chunked()
                } else {
                    self.session.chunk_remaining = Some(size);
                    Ok(())
                }
            }
        }
    }

    /// On the last chunk: the decoded payload replaces the chunked framing,
    /// so the request reads as if it had been sent with a `Content-Length`.
    fn finish_chunked(&mut self) -> Result<(), Error> {
        if let Some(trailer) = self.request.header_value("Trailer") {
            parse_headers::check_trailer_declaration(trailer)?;
        }

        let decoded = mem::take(&mut self.session.decoded_body);
        if let Some(mut splitter) = self.session.multipart.take() {
            splitter.push_body(&decoded)?;
            if !decoded.is_empty() && !splitter.is_closed() {
                return Err(Error::UnterminatedMultipart)
            }
            for part in splitter.take_parts() {
                self.request.push_part(part);
            }
        }
        self.request.update_header("Content-Length", &decoded.len().to_string());
        self.request.append_body(&decoded);

        match self.request.header_value("Transfer-Encoding").and_then(parse_headers::strip_chunked) {
            Some(codings) => self.request.update_header("Transfer-Encoding", &codings),
            None => {
                self.request.remove_header("Transfer-Encoding");
            }
        }

        // the trailer section always follows, if only as an empty line
        self.transition(State::Trailer);
        Ok(())
    }

    fn parse_trailer(&mut self, line: &[u8]) -> Result<(), Error> {
        if line.is_empty() {
            self.transition(State::Finished);
            return Ok(())
        }
        self.count_header()?;
        let (name, value) = parse_header_field(line)?;

        let declared = self.request
            .header_value("Trailer")
            .map_or(false, |trailer| parse_headers::is_declared_trailer(trailer, name));
        if declared {
            self.request.set_header(name, value);
        } else {
            trace!(name, "ignoring undeclared trailer field");
        }
        Ok(())
    }

    fn multipart_closed(&self) -> bool {
        self.session.multipart.as_ref().map_or(false, MultipartSplitter::is_closed)
    }

    /// The raw multipart payload is kept as the body; parts are collected
    /// on the side. Under `Content-Length` framing the epilogue is read up
    /// to the declared length, so it is never taken for the next request.
    fn parse_multipart_payload(&mut self, unit: &[u8]) -> Result<(), Error> {
        if self.multipart_closed() {
            self.request.append_body(unit);
            if self.session.remaining_payload == 0 {
                self.transition(State::Finished);
            }
            return Ok(())
        }

        self.request.append_body(unit);
        self.request.append_body(b"\r\n");

        if let Some(splitter) = self.session.multipart.as_mut() {
            splitter.push_line(unit)?;
            if splitter.is_closed() {
                for part in splitter.take_parts() {
                    self.request.push_part(part);
                }
            }
        }

        if self.multipart_closed() {
            let done = self.session.framing != Framing::ContentLength || self.session.remaining_payload == 0;
            if done {
                self.transition(State::Finished);
            }
            return Ok(())
        }
        self.check_multipart_remaining()
    }

    fn check_multipart_remaining(&self) -> Result<(), Error> {
        if self.session.framing == Framing::ContentLength && self.session.remaining_payload == 0 {
            return Err(Error::UnterminatedMultipart)
        }
        Ok(())
    }
}


/// Parses a complete request held in one buffer.
///
/// Fails with `UnexpectedEof` if `source` ends before the request does.
/// Bytes after the end of the request are ignored.
pub fn parse_request(source: &[u8], config: &Config) -> Result<RequestMessage, Error> {
    let mut parser = RequestParser::new(config);
    parser.feed(source)?;
    parser.into_request().ok_or(Error::UnexpectedEof)
}

/// Reads one request from a blocking stream.
///
/// Reads are `config.read_buffer_size` bytes long, so bytes following the
/// request in the last read are lost. Use `RequestParser` directly on
/// connections that may carry more than one request.
pub fn read_request<S: io::Read>(mut stream: S, config: &Config) -> Result<RequestMessage, Error> {
    let mut parser = RequestParser::new(config);
    let mut buffer = vec![0u8; config.read_buffer_size.max(1)];

    while !parser.is_finished() {
        let size = match stream.read(&mut buffer) {
            Ok(0) => return Err(Error::UnexpectedEof),
            Ok(size) => size,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::from_io(err)),
        };
        trace!(size, "read from stream");
        parser.feed(&buffer[..size])?;
    }

    parser.into_request().ok_or(Error::UnexpectedEof)
}
