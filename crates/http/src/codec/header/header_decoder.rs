//! Decoder for the header block that follows the request line.
//!
//! The block is handed to `httparse::parse_headers`, which validates field syntax and stops at
//! the empty line. The decoder enforces two limits:
//!
//! - at most [`MAX_HEADER_NUM`] fields;
//! - at most [`MAX_HEADER_BYTES`] bytes for the whole block, checked both on a complete block
//!   and while a partial block is still being buffered.

use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::Status;
use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;

/// Maximum number of headers allowed in a request
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes a header block into an [`HeaderMap`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecoder;

impl HeaderDecoder {
    /// Attempts to decode the header block at the start of `src`.
    ///
    /// Returns the headers with the number of bytes they occupied (terminating empty line
    /// included), or `Ok(None)` if the block is not complete yet.
    pub fn decode(&self, src: &[u8]) -> Result<Option<(HeaderMap, usize)>, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];

        let parsed = httparse::parse_headers(src, &mut headers).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e),
        })?;

        match parsed {
            Status::Complete((consumed, fields)) => {
                trace!(header_size = consumed, header_count = fields.len(), "parsed header block");
                ensure!(consumed <= MAX_HEADER_BYTES, ParseError::too_large_header(consumed, MAX_HEADER_BYTES));

                let mut map = HeaderMap::with_capacity(fields.len());
                for field in fields {
                    let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(ParseError::invalid_header)?;
                    let value = HeaderValue::from_bytes(field.value).map_err(ParseError::invalid_header)?;
                    map.append(name, value);
                }
                Ok(Some((map, consumed)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}
