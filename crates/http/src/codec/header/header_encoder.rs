//! Serializes a [`ResponseHead`] into a connection's write [`Buffer`].
//!
//! The status line always announces `HTTP/1.1`, with the reason phrase taken from the fixed
//! status table. Header fields are written in insertion order, followed by the empty line that
//! ends the head.

use bytes::BufMut;

use crate::buffer::Buffer;
use crate::protocol::{reason_phrase, ResponseHead};

/// Reserved up front so a typical head is written without growing the buffer
const INIT_HEADER_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl HeaderEncoder {
    pub fn encode(&self, head: &ResponseHead, dst: &mut Buffer) {
        dst.ensure_writable(INIT_HEADER_SIZE);

        let status = head.status();
        let reason = reason_phrase(status).or_else(|| status.canonical_reason()).unwrap_or("Unknown");

        dst.put_slice(b"HTTP/1.1 ");
        dst.put_slice(status.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(reason.as_bytes());
        dst.put_slice(b"\r\n");

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
    }
}
