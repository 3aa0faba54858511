//! Header block decoding and response head encoding.
//!
//! - [`HeaderDecoder`]: parses the request header block with `httparse` and enforces the
//!   header count and size limits.
//! - [`HeaderEncoder`]: writes the status line and header fields of a response into a
//!   [`Buffer`](crate::buffer::Buffer).

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_decoder::MAX_HEADER_BYTES;
pub use header_decoder::MAX_HEADER_NUM;
pub use header_encoder::HeaderEncoder;
