//! Client connection state.
//!
//! - [`HttpConnection`]: socket, read buffer, parser, keep-alive flag and pending response of
//!   one client. The reactor drives its reads and writes; a worker runs
//!   [`HttpConnection::process`].
//! - [`MessageWriter`]: the pending response as two segments (serialized head and payload)
//!   sent with vectored writes.

mod http_connection;
mod message_writer;

pub use http_connection::{HttpConnection, ProcessOutcome, ReadStatus, WriteStatus};
pub use message_writer::MessageWriter;
