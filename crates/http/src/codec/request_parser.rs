//! Incremental HTTP request parser.
//!
//! The parser consumes a connection's read [`Buffer`] and keeps its state between calls, so a
//! request may arrive split at any byte boundary across many readiness events.
//!
//! # State Machine
//!
//! ```text
//! RequestLine --> Headers --> Body --> Done
//!      |             |         |
//!      +-------------+---------+-----> BadRequest
//! ```
//!
//! - `RequestLine`: waits for a CRLF-terminated `METHOD SP PATH SP HTTP/VERSION` line.
//! - `Headers`: decodes the header block with [`HeaderDecoder`].
//! - `Body`: waits until `Content-Length` bytes are buffered, takes them as one chunk, and
//!   decodes url-encoded forms.
//! - `Done` and `BadRequest` are terminal; [`RequestParser::reset`] starts the next request.
//!
//! Bytes are only consumed from the buffer once a whole element has been recognized, so an
//! incomplete element is simply retried on the next call.

use std::mem;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::uri::PathAndQuery;
use http::{HeaderMap, Method, Version};
use tracing::trace;

use crate::buffer::Buffer;
use crate::codec::header::{HeaderDecoder, MAX_HEADER_BYTES};
use crate::ensure;
use crate::protocol::{FormData, ParseError, Request};
use crate::utils::find_crlf;

/// Maximum accepted `Content-Length`
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Paths served as `{path}.html` when requested without the suffix
const DEFAULT_HTML: [&str; 6] = ["/index", "/welcome", "/video", "/picture", "/register", "/login"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    #[default]
    RequestLine,
    Headers,
    Body,
    Done,
    BadRequest,
}

impl ParseState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ParseState::Done | ParseState::BadRequest)
    }
}

#[derive(Debug, Default)]
pub struct RequestParser {
    state: ParseState,
    header_decoder: HeaderDecoder,
    request: Request,
    content_length: usize,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Prepares the parser for the next request on the same connection.
    pub fn reset(&mut self) {
        self.state = ParseState::RequestLine;
        self.request = Request::default();
        self.content_length = 0;
    }

    /// Advances over the bytes buffered in `src`.
    ///
    /// Returns `Ok(Some(request))` once a request is complete (state `Done`), `Ok(None)` when
    /// more bytes are needed, and an error on malformed input (state `BadRequest`). Calling it
    /// again in a terminal state without [`RequestParser::reset`] is an error.
    pub fn parse(&mut self, src: &mut Buffer) -> Result<Option<Request>, ParseError> {
        ensure!(!self.state.is_terminal(), ParseError::Terminated(self.state));

        match self.advance(src) {
            Ok(request) => Ok(request),
            Err(e) => {
                self.state = ParseState::BadRequest;
                Err(e)
            }
        }
    }

    fn advance(&mut self, src: &mut Buffer) -> Result<Option<Request>, ParseError> {
        loop {
            match self.state {
                ParseState::RequestLine => {
                    let Some(line_end) = find_crlf(src.peek()) else {
                        ensure!(
                            src.readable_bytes() <= MAX_HEADER_BYTES,
                            ParseError::too_large_header(src.readable_bytes(), MAX_HEADER_BYTES)
                        );
                        return Ok(None);
                    };
                    self.parse_request_line(&src.peek()[..line_end])?;
                    src.retrieve_until(line_end + 2);
                    self.state = ParseState::Headers;
                }

                ParseState::Headers => {
                    let Some((headers, consumed)) = self.header_decoder.decode(src.peek())? else {
                        return Ok(None);
                    };
                    src.retrieve(consumed);
                    self.content_length = body_length(&headers)?;
                    self.request.headers = headers;
                    self.state = if self.content_length > 0 { ParseState::Body } else { ParseState::Done };
                }

                ParseState::Body => {
                    if src.readable_bytes() < self.content_length {
                        return Ok(None);
                    }
                    let body = Bytes::copy_from_slice(&src.peek()[..self.content_length]);
                    src.retrieve(self.content_length);
                    if self.request.is_form_post() {
                        self.request.form = FormData::parse(&body)?;
                    }
                    self.request.body = body;
                    self.state = ParseState::Done;
                }

                ParseState::Done => {
                    let request = mem::take(&mut self.request);
                    trace!(method = %request.method(), path = request.path(), "parsed request");
                    return Ok(Some(request));
                }

                ParseState::BadRequest => return Err(ParseError::Terminated(self.state)),
            }
        }
    }

    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::invalid_request_line("not valid utf-8"))?;

        let mut parts = line.split(' ');
        let (Some(method), Some(target), Some(version), None) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::invalid_request_line(line));
        };

        ensure!(!method.is_empty(), ParseError::InvalidMethod);
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;

        let version = match version.strip_prefix("HTTP/") {
            Some("1.1") => Version::HTTP_11,
            Some("1.0") => Version::HTTP_10,
            _ => return Err(ParseError::InvalidVersion(version.to_string())),
        };

        let target = target.parse::<PathAndQuery>().map_err(|_| ParseError::InvalidUri)?;
        ensure!(target.path().starts_with('/'), ParseError::InvalidUri);

        self.request.method = method;
        self.request.version = version;
        self.request.path = normalize_path(target.path());
        self.request.query = target.query().map(str::to_string);
        Ok(())
    }
}

/// `/` becomes `/index.html`; a bare default page name gets its `.html` suffix.
fn normalize_path(path: &str) -> String {
    if path == "/" {
        return "/index.html".to_string();
    }
    if DEFAULT_HTML.contains(&path) {
        return format!("{path}.html");
    }
    path.to_string()
}

/// Length of the body announced by the headers.
///
/// Bodies are only delimited by `Content-Length`; any `Transfer-Encoding` is rejected.
fn body_length(headers: &HeaderMap) -> Result<usize, ParseError> {
    ensure!(!headers.contains_key(TRANSFER_ENCODING), ParseError::UnsupportedTransferEncoding);

    let mut values = headers.get_all(CONTENT_LENGTH).iter();
    let Some(value) = values.next() else {
        return Ok(0);
    };
    ensure!(values.all(|other| other == value), ParseError::invalid_content_length("conflicting values"));

    let value = value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
    let length = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ParseError::invalid_content_length(format!("value {value} is not u64")))?;
    ensure!(length <= MAX_BODY_BYTES, ParseError::too_large_body(length, MAX_BODY_BYTES));

    usize::try_from(length).map_err(|_| ParseError::too_large_body(length, MAX_BODY_BYTES))
}
