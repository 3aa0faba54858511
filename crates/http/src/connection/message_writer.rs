use std::io::{self, IoSlice, Write};

use bytes::Buf;

use crate::buffer::Buffer;
use crate::protocol::Payload;

/// Pending response bytes of one connection.
///
/// Segment 0 is the serialized head in `buffer`, segment 1 the [`Payload`]. Each
/// [`MessageWriter::write_to`] issues a single vectored write over both; accepted bytes drain
/// segment 0 first.
#[derive(Debug)]
pub struct MessageWriter {
    buffer: Buffer,
    payload: Option<Payload>,
}

impl MessageWriter {
    pub fn with_capacity(buffer_size: usize) -> Self {
        Self { buffer: Buffer::with_capacity(buffer_size), payload: None }
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = Some(payload);
    }

    /// Bytes still to send across both segments.
    pub fn remaining(&self) -> usize {
        self.buffer.readable_bytes() + self.payload.as_ref().map_or(0, Buf::remaining)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Drops pending bytes and releases the payload.
    pub fn clear(&mut self) {
        self.buffer.retrieve_all();
        self.payload = None;
    }

    /// One vectored write attempt; returns how many bytes the writer accepted.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        let written = {
            let body = self.payload.as_ref().map_or(&[][..], Buf::chunk);
            writer.write_vectored(&[IoSlice::new(self.buffer.peek()), IoSlice::new(body)])?
        };
        self.advance(written);

        if self.is_empty() {
            self.clear();
        }
        Ok(written)
    }

    fn advance(&mut self, mut written: usize) {
        let head = written.min(self.buffer.readable_bytes());
        self.buffer.retrieve(head);
        written -= head;

        if written > 0 {
            if let Some(payload) = &mut self.payload {
                payload.advance(written);
            }
        }
    }
}
