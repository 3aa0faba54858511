use bytes::{Buf, Bytes};
use memmap2::Mmap;

/// The body segment of a response.
///
/// Static files are sent straight from a read-only mapping; inline bodies (error pages built in
/// memory, empty files) are owned bytes. The mapping is released when the payload is dropped.
#[derive(Debug)]
pub enum Payload {
    OwnedBytes(Bytes),
    BorrowedRegion(MappedRegion),
}

impl Payload {
    pub fn empty() -> Self {
        Payload::OwnedBytes(Bytes::new())
    }

    /// Total unsent length.
    pub fn len(&self) -> usize {
        self.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::OwnedBytes(bytes)
    }
}

impl From<Mmap> for Payload {
    fn from(map: Mmap) -> Self {
        Payload::BorrowedRegion(MappedRegion::new(map))
    }
}

impl Buf for Payload {
    fn remaining(&self) -> usize {
        match self {
            Payload::OwnedBytes(bytes) => bytes.remaining(),
            Payload::BorrowedRegion(region) => region.remaining(),
        }
    }

    fn chunk(&self) -> &[u8] {
        match self {
            Payload::OwnedBytes(bytes) => bytes.chunk(),
            Payload::BorrowedRegion(region) => region.chunk(),
        }
    }

    fn advance(&mut self, cnt: usize) {
        match self {
            Payload::OwnedBytes(bytes) => bytes.advance(cnt),
            Payload::BorrowedRegion(region) => region.advance(cnt),
        }
    }
}

/// A read-only file mapping with a send cursor.
#[derive(Debug)]
pub struct MappedRegion {
    map: Mmap,
    offset: usize,
}

impl MappedRegion {
    pub fn new(map: Mmap) -> Self {
        Self { map, offset: 0 }
    }
}

impl Buf for MappedRegion {
    fn remaining(&self) -> usize {
        self.map.len() - self.offset
    }

    fn chunk(&self) -> &[u8] {
        &self.map[self.offset..]
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.remaining(), "advance {cnt} bytes but only {} remaining", self.remaining());
        self.offset += cnt;
    }
}
