//! Growable byte buffer with independent read and write cursors.
//!
//! A [`Buffer`] is the unit of I/O staging for a connection: socket reads land in it, the
//! request parser consumes from it, and the response head is serialized into it before
//! being sent with a vectored write.
//!
//! ```text
//! +-------------------+------------------+------------------+
//! | prependable bytes |  readable bytes  |  writable bytes  |
//! |                   |     (content)    |                  |
//! +-------------------+------------------+------------------+
//! 0      <=       read_pos    <=     write_pos    <=     capacity
//! ```
//!
//! When a write needs more room than the writable tail offers, the buffer first tries to
//! reclaim the prependable region by moving the readable bytes to the front. Only when that
//! is not enough does it reallocate, which keeps long-lived keep-alive connections doing
//! many small reads from growing without bound.
//!
//! The buffer implements [`bytes::Buf`] and [`bytes::BufMut`], so encoders can write into it
//! with `put_slice` and consumers can drain it with `advance`.

use std::io::{self, IoSliceMut, Read, Write};

use bytes::buf::UninitSlice;
use bytes::{Buf, BufMut};

/// Initial capacity of a freshly created buffer.
const INIT_BUFFER_SIZE: usize = 1024;

/// Size of the stack scratch region used as the second segment of a vectored read.
const SCRATCH_SIZE: usize = 64 * 1024;

/// Minimal headroom handed out by [`BufMut::chunk_mut`] when the buffer is full.
const MIN_CHUNK_SIZE: usize = 64;

/// A growable byte region with a read cursor and a write cursor.
///
/// Invariant: `read_pos <= write_pos <= capacity`. The readable region is
/// `[read_pos, write_pos)`.
#[derive(Debug, Clone)]
pub struct Buffer {
    storage: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::with_capacity(INIT_BUFFER_SIZE)
    }
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { storage: vec![0; capacity], read_pos: 0, write_pos: 0 }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes that can be written without growing or compacting.
    #[inline]
    pub fn writable_bytes(&self) -> usize {
        self.storage.len() - self.write_pos
    }

    /// Bytes available to read.
    #[inline]
    pub fn readable_bytes(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Already consumed bytes in front of the read cursor, reclaimable by compaction.
    #[inline]
    pub fn prependable_bytes(&self) -> usize {
        self.read_pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.readable_bytes() == 0
    }

    /// Returns the readable region without consuming it.
    #[inline]
    pub fn peek(&self) -> &[u8] {
        &self.storage[self.read_pos..self.write_pos]
    }

    /// Consumes `len` readable bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`Buffer::readable_bytes`].
    pub fn retrieve(&mut self, len: usize) {
        assert!(len <= self.readable_bytes(), "retrieve {len} bytes but only {} readable", self.readable_bytes());
        self.read_pos += len;
    }

    /// Consumes everything in front of `index`, an offset into [`Buffer::peek`].
    pub fn retrieve_until(&mut self, index: usize) {
        self.retrieve(index);
    }

    /// Discards all content and rewinds both cursors.
    pub fn retrieve_all(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Copies out the readable region and then empties the buffer.
    pub fn retrieve_all_to_vec(&mut self) -> Vec<u8> {
        let bytes = self.peek().to_vec();
        self.retrieve_all();
        bytes
    }

    /// Returns the writable tail, to be followed by [`Buffer::has_written`].
    #[inline]
    pub fn begin_write(&mut self) -> &mut [u8] {
        &mut self.storage[self.write_pos..]
    }

    /// Marks `len` bytes of the writable tail as written.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`Buffer::writable_bytes`].
    pub fn has_written(&mut self, len: usize) {
        assert!(len <= self.writable_bytes(), "has_written {len} bytes but only {} writable", self.writable_bytes());
        self.write_pos += len;
    }

    /// Makes sure at least `len` bytes can be written.
    pub fn ensure_writable(&mut self, len: usize) {
        if self.writable_bytes() < len {
            self.make_space(len);
        }
        debug_assert!(self.writable_bytes() >= len);
    }

    pub fn append(&mut self, data: &[u8]) {
        self.ensure_writable(data.len());
        self.storage[self.write_pos..self.write_pos + data.len()].copy_from_slice(data);
        self.has_written(data.len());
    }

    /// Performs one vectored read from `reader`.
    ///
    /// The first segment is the writable tail, the second a 64 KiB stack scratch region whose
    /// content is appended afterwards. Returns the number of bytes read; `Ok(0)` means the
    /// peer has closed its side.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        let mut scratch = [0u8; SCRATCH_SIZE];
        let writable = self.writable_bytes();

        let len = {
            let mut segments =
                [IoSliceMut::new(&mut self.storage[self.write_pos..]), IoSliceMut::new(&mut scratch)];
            reader.read_vectored(&mut segments)?
        };

        if len <= writable {
            self.has_written(len);
        } else {
            self.write_pos = self.storage.len();
            self.append(&scratch[..len - writable]);
        }
        Ok(len)
    }

    /// Writes the readable region to `writer`, consuming whatever was accepted.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        let len = writer.write(self.peek())?;
        self.retrieve(len);
        Ok(len)
    }

    fn make_space(&mut self, len: usize) {
        if self.writable_bytes() + self.prependable_bytes() < len {
            self.storage.resize(self.write_pos + len + 1, 0);
        } else {
            let readable = self.readable_bytes();
            self.storage.copy_within(self.read_pos..self.write_pos, 0);
            self.read_pos = 0;
            self.write_pos = readable;
        }
    }
}

impl Buf for Buffer {
    #[inline]
    fn remaining(&self) -> usize {
        self.readable_bytes()
    }

    #[inline]
    fn chunk(&self) -> &[u8] {
        self.peek()
    }

    #[inline]
    fn advance(&mut self, cnt: usize) {
        self.retrieve(cnt);
    }
}

// SAFETY: `chunk_mut` only hands out the initialized writable tail of `storage`, and
// `advance_mut` moves the write cursor inside that tail.
unsafe impl BufMut for Buffer {
    #[inline]
    fn remaining_mut(&self) -> usize {
        isize::MAX as usize - self.write_pos
    }

    #[inline]
    unsafe fn advance_mut(&mut self, cnt: usize) {
        self.has_written(cnt);
    }

    #[inline]
    fn chunk_mut(&mut self) -> &mut UninitSlice {
        if self.writable_bytes() == 0 {
            self.ensure_writable(MIN_CHUNK_SIZE);
        }
        UninitSlice::new(self.begin_write())
    }

    #[inline]
    fn put_slice(&mut self, src: &[u8]) {
        self.append(src);
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `limit` bytes per call, like a congested socket.
    struct ChokedWriter {
        limit: usize,
        written: Vec<u8>,
    }

    impl Write for ChokedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let len = buf.len().min(self.limit);
            self.written.extend_from_slice(&buf[..len]);
            Ok(len)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn append_then_read_back_in_order() {
        let chunks: [&[u8]; 4] = [b"GET ", b"/index.html", b" HTTP/1.1\r\n", &[0u8, 255, 13, 10]];
        let mut buffer = Buffer::with_capacity(4);

        let mut expected = Vec::new();
        for chunk in chunks {
            buffer.append(chunk);
            expected.extend_from_slice(chunk);
            assert_eq!(buffer.readable_bytes(), expected.len());
        }

        assert_eq!(buffer.peek(), &expected[..]);
        assert_eq!(buffer.retrieve_all_to_vec(), expected);
        assert!(buffer.is_empty());
    }

    #[test]
    fn ensure_writable_always_leaves_room() {
        let mut buffer = Buffer::with_capacity(10);
        for len in [0, 1, 10, 11, 1000, 3] {
            buffer.append(&[b'x'; 7]);
            buffer.retrieve(3);
            buffer.ensure_writable(len);
            assert!(buffer.writable_bytes() >= len);
        }
    }

    #[test]
    fn grows_when_prependable_space_is_not_enough() {
        let mut buffer = Buffer::with_capacity(10);
        buffer.append(&[b'x'; 1000]);

        assert_eq!(buffer.readable_bytes(), 1000);
        assert!(buffer.capacity() >= 1000);
        assert!(buffer.peek().iter().all(|b| *b == b'x'));
    }

    #[test]
    fn compacts_instead_of_growing_when_possible() {
        let mut buffer = Buffer::with_capacity(16);
        buffer.append(b"0123456789abcdef");
        buffer.retrieve(10);
        assert_eq!(buffer.prependable_bytes(), 10);

        buffer.append(b"ghijklmn");

        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.prependable_bytes(), 0);
        assert_eq!(buffer.peek(), b"abcdefghijklmn");
    }

    #[test]
    fn read_from_spills_into_scratch() {
        let source: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader = &source[..];
        let mut buffer = Buffer::with_capacity(8);

        let mut total = 0;
        loop {
            let len = buffer.read_from(&mut reader).unwrap();
            if len == 0 {
                break;
            }
            total += len;
        }

        assert_eq!(total, source.len());
        assert_eq!(buffer.peek(), &source[..]);
    }

    #[test]
    fn read_from_reports_eof() {
        let mut reader: &[u8] = &[];
        let mut buffer = Buffer::new();
        assert_eq!(buffer.read_from(&mut reader).unwrap(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn write_to_advances_by_partial_writes() {
        let mut buffer = Buffer::new();
        buffer.append(b"HTTP/1.1 200 OK\r\n\r\n");
        let mut writer = ChokedWriter { limit: 5, written: Vec::new() };

        assert_eq!(buffer.write_to(&mut writer).unwrap(), 5);
        assert_eq!(buffer.readable_bytes(), 14);

        while !buffer.is_empty() {
            buffer.write_to(&mut writer).unwrap();
        }
        assert_eq!(writer.written, b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn buf_and_buf_mut_views() {
        let mut buffer = Buffer::with_capacity(2);
        buffer.put_slice(b"Content-Length: ");
        buffer.put_u8(b'7');
        write!(buffer, "\r\n").unwrap();

        assert_eq!(buffer.remaining(), 19);
        assert_eq!(buffer.chunk(), b"Content-Length: 7\r\n");

        buffer.advance(16);
        assert_eq!(buffer.chunk(), b"7\r\n");

        let end = buffer.peek().iter().position(|b| *b == b'\r').unwrap();
        buffer.retrieve_until(end);
        assert_eq!(buffer.peek(), b"\r\n");
    }

    #[test]
    #[should_panic(expected = "only 3 readable")]
    fn retrieve_past_readable_panics() {
        let mut buffer = Buffer::new();
        buffer.append(b"abc");
        buffer.retrieve(4);
    }
}
