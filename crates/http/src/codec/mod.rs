//! Request parsing and response building.
//!
//! - Request side:
//!   - [`RequestParser`]: incremental state machine from buffered bytes to a
//!     [`Request`](crate::protocol::Request)
//!   - header block decoding via [`HeaderDecoder`]
//!
//! - Response side:
//!   - [`ResponseBuilder`]: resolves the path, chooses the status and produces the body
//!   - head serialization via [`HeaderEncoder`]
//!
//! # Example
//!
//! ```
//! use micro_httpd::buffer::Buffer;
//! use micro_httpd::codec::RequestParser;
//!
//! let mut buffer = Buffer::new();
//! buffer.append(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n");
//!
//! let mut parser = RequestParser::new();
//! let request = parser.parse(&mut buffer).unwrap().unwrap();
//! assert_eq!(request.path(), "/index.html");
//! assert!(request.keep_alive());
//! ```

mod header;
mod request_parser;
mod response_builder;

pub use header::{HeaderDecoder, HeaderEncoder, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use request_parser::{ParseState, RequestParser, MAX_BODY_BYTES};
pub use response_builder::{default_error_pages, ResponseBuilder};
