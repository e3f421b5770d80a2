//! The backing byte region and its partitioning into a block chain.
//!
//! [`Arena`] owns the caller's buffer and knows how to read and write
//! headers at given offsets. It has no policy: splitting, merging and
//! searching live in the heap modules on top of it.

use crate::header::{BlockHeader, HEADER_SIZE};

/// A fixed-capacity byte region carved into a contiguous block chain.
///
/// Only the first `capacity` bytes of the storage are managed.
pub(crate) struct Arena<S> {
    storage: S,
    capacity: usize,
}

impl<S> Arena<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Wrap `storage`. The caller has checked `capacity <= storage.len()`.
    pub fn new(storage: S, capacity: usize) -> Self {
        Self { storage, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes(&self) -> &[u8] {
        &self.storage.as_ref()[..self.capacity]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let capacity = self.capacity;
        &mut self.storage.as_mut()[..capacity]
    }

    pub fn base_ptr(&mut self) -> *mut u8 {
        self.storage.as_mut().as_mut_ptr()
    }

    /// Install a single free block spanning the whole arena.
    pub fn format(&mut self) {
        let size = (self.capacity - HEADER_SIZE) as u32;
        self.write_header(0, BlockHeader::free(size));
    }

    pub fn read_header(&self, at: usize) -> Option<BlockHeader> {
        BlockHeader::decode(self.bytes().get(at..)?, at)
    }

    /// Write `header` at `at`.
    ///
    /// # Panics
    ///
    /// Panics if the header would extend past the arena. Callers only
    /// write at offsets derived from the chain.
    pub fn write_header(&mut self, at: usize, header: BlockHeader) {
        self.bytes_mut()[at..at + HEADER_SIZE].copy_from_slice(&header.encode(at));
    }

    /// Destroy the header at `at` so stale handles cannot resolve to it.
    pub fn scrub_header(&mut self, at: usize) {
        self.bytes_mut()[at..at + HEADER_SIZE].fill(0);
    }

    pub fn payload(&self, at: usize, header: BlockHeader) -> &[u8] {
        let start = at + HEADER_SIZE;
        &self.bytes()[start..start + header.payload_len()]
    }

    pub fn payload_mut(&mut self, at: usize, header: BlockHeader) -> &mut [u8] {
        let start = at + HEADER_SIZE;
        &mut self.bytes_mut()[start..start + header.payload_len()]
    }

    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            bytes: self.bytes(),
            at: 0,
        }
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

/// Offset of the block following the one at `at`.
pub(crate) fn next_block(at: usize, header: BlockHeader) -> usize {
    at + HEADER_SIZE + header.payload_len()
}

/// One block of the chain as seen by a read-only traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block header from the start of the arena.
    pub offset: usize,
    /// Payload bytes, excluding the header.
    pub size: usize,
    /// Whether the block is available for allocation.
    pub is_free: bool,
}

impl BlockInfo {
    /// Offset of the first payload byte.
    pub fn payload_offset(&self) -> usize {
        self.offset + HEADER_SIZE
    }

    /// Offset one past the last payload byte.
    pub fn end(&self) -> usize {
        self.payload_offset() + self.size
    }
}

/// Iterator over the block chain from the arena start.
///
/// Stops early at the first header that does not decode or that claims
/// more bytes than the arena has; [`Heap::verify`](crate::Heap::verify)
/// reports such chains as corrupt.
pub struct Blocks<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let end = self.bytes.len();
        if self.at >= end {
            return None;
        }
        let header = match BlockHeader::decode(&self.bytes[self.at..], self.at) {
            Some(h) => h,
            None => {
                self.at = end;
                return None;
            }
        };
        let info = BlockInfo {
            offset: self.at,
            size: header.payload_len(),
            is_free: !header.used,
        };
        if info.end() > end {
            self.at = end;
            return None;
        }
        self.at = info.end();
        Some(info)
    }
}
