//! The heap engine: lifecycle, handle validation and shared block surgery.
//!
//! The public operations are spread over sibling modules, each adding an
//! `impl` block to [`Heap`]:
//!
//! - `alloc`: first-fit [`Heap::allocate`]
//! - `reclaim`: [`Heap::free`] and [`Heap::reallocate`]
//! - `defrag`: the coalescing pass, [`Heap::defragment`]
//! - [`monitor`](crate::monitor): [`Heap::report`]

use std::fmt;

use tracing::{debug, trace, warn};

use crate::arena::{next_block, Arena, Blocks};
use crate::config::HeapConfig;
use crate::error::HeapError;
use crate::handle::Handle;
use crate::header::{align_up, BlockHeader, ALIGN, HEADER_SIZE};

/// A first-fit heap over a single caller-supplied byte buffer.
///
/// `S` is any owned or borrowed byte storage: `Vec<u8>`, `Box<[u8]>`,
/// `[u8; N]`, `&mut [u8]`. All bookkeeping lives in-band in the buffer;
/// the heap never allocates memory of its own.
///
/// Not internally synchronised. Every mutating operation takes
/// `&mut self`; callers sharing a heap across threads or with interrupt
/// context wrap it in their own lock.
pub struct Heap<S> {
    pub(crate) arena: Arena<S>,
    pub(crate) config: HeapConfig,
}

impl<S> Heap<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Take ownership of `buffer` and install one free block spanning
    /// `config.capacity` bytes.
    ///
    /// # Errors
    ///
    /// - [`HeapError::Config`] if the config does not fit the buffer.
    /// - [`HeapError::ArenaTooSmall`] if the capacity cannot hold a header.
    pub fn init(buffer: S, config: HeapConfig) -> Result<Self, HeapError> {
        config.validate(buffer.as_ref().len())?;
        if config.capacity < HEADER_SIZE {
            return Err(HeapError::ArenaTooSmall {
                capacity: config.capacity,
                header: HEADER_SIZE,
            });
        }
        let mut arena = Arena::new(buffer, config.capacity);
        arena.format();
        debug!(
            capacity = config.capacity,
            min_split_payload = config.min_split_payload,
            junk_fill = config.junk_fill,
            "heap initialised"
        );
        Ok(Self { arena, config })
    }

    /// [`init`](Self::init) managing the whole buffer with default tuning.
    pub fn new(buffer: S) -> Result<Self, HeapError> {
        let len = buffer.as_ref().len();
        Self::init(buffer, HeapConfig::new(len))
    }

    /// Drop every block and reinstall the single spanning free block.
    ///
    /// All outstanding handles become invalid. Their headers are scrubbed,
    /// so using one afterwards is reported as
    /// [`HeapError::InvalidHandle`] unless its payload was since reused.
    pub fn reset(&mut self) {
        let capacity = self.arena.capacity();
        let mut at = 0;
        let mut scrubbed = 0usize;
        while at < capacity {
            let Some(header) = self.arena.read_header(at) else {
                break;
            };
            let next = next_block(at, header);
            self.arena.scrub_header(at);
            scrubbed += 1;
            at = next;
        }
        self.arena.format();
        debug!(scrubbed, "heap reset");
    }

    /// Tear the heap down and hand the buffer back.
    pub fn into_inner(self) -> S {
        self.arena.into_storage()
    }

    /// Number of arena bytes under management.
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// The configuration this heap was initialised with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Raw pointer to the first arena byte.
    ///
    /// Payload addresses are `base_ptr() + handle.offset()`; this is how
    /// pointer-based front ends translate between handles and addresses.
    pub fn base_ptr(&mut self) -> *mut u8 {
        self.arena.base_ptr()
    }

    /// Walk the block chain from the arena start.
    pub fn blocks(&self) -> Blocks<'_> {
        self.arena.blocks()
    }

    /// Check that every header decodes and that the chain spans exactly
    /// `[0, capacity)`.
    pub fn verify(&self) -> Result<(), HeapError> {
        let capacity = self.arena.capacity();
        let mut at = 0;
        while at < capacity {
            if at % ALIGN != 0 {
                return Err(HeapError::CorruptChain { offset: at });
            }
            let header = self
                .arena
                .read_header(at)
                .ok_or(HeapError::CorruptChain { offset: at })?;
            let next = next_block(at, header);
            if next > capacity {
                return Err(HeapError::CorruptChain { offset: at });
            }
            at = next;
        }
        Ok(())
    }

    /// Payload of a live block.
    pub fn payload(&self, handle: Handle) -> Result<&[u8], HeapError> {
        let (at, header) = self.live_block(handle)?;
        Ok(self.arena.payload(at, header))
    }

    /// Mutable payload of a live block.
    pub fn payload_mut(&mut self, handle: Handle) -> Result<&mut [u8], HeapError> {
        let (at, header) = self.live_block(handle)?;
        Ok(self.arena.payload_mut(at, header))
    }

    /// Payload size recorded for `handle`.
    ///
    /// # Errors
    ///
    /// [`HeapError::InvalidHandle`] under the same rules as
    /// [`free`](Self::free).
    pub fn try_get_size(&self, handle: Handle) -> Result<usize, HeapError> {
        self.live_block(handle).map(|(_, header)| header.payload_len())
    }

    /// Payload size recorded for `handle`, or `0` if the handle is not
    /// recognised.
    pub fn get_size(&self, handle: Handle) -> usize {
        self.locate(handle)
            .map(|(_, header)| header.payload_len())
            .unwrap_or(0)
    }

    /// Resolve a handle to its header without logging.
    ///
    /// Accepts the handle only if the header offset is aligned and in
    /// range, the bytes there form a well-tagged header, the block fits the
    /// arena, and the block is in use.
    pub(crate) fn locate(&self, handle: Handle) -> Option<(usize, BlockHeader)> {
        let at = handle.header_offset()?;
        if at % ALIGN != 0 {
            return None;
        }
        let header = self.arena.read_header(at)?;
        if !header.used || next_block(at, header) > self.arena.capacity() {
            return None;
        }
        Some((at, header))
    }

    pub(crate) fn live_block(&self, handle: Handle) -> Result<(usize, BlockHeader), HeapError> {
        self.locate(handle).ok_or_else(|| {
            warn!(offset = handle.offset(), "rejected handle");
            HeapError::InvalidHandle {
                offset: handle.offset(),
            }
        })
    }

    /// Cut the block at `at` down to `keep` payload bytes, turning the
    /// tail into a new free block, if the tail can hold a header plus
    /// `min_split_payload` bytes. Returns the header now at `at`.
    ///
    /// `keep` must be a multiple of [`ALIGN`] so the tail header stays
    /// aligned.
    pub(crate) fn split_tail(&mut self, at: usize, header: BlockHeader, keep: usize) -> BlockHeader {
        let size = header.payload_len();
        let threshold = keep
            .saturating_add(HEADER_SIZE)
            .saturating_add(self.config.min_split_payload);
        if size < threshold {
            return header;
        }
        let tail_at = at + HEADER_SIZE + keep;
        let tail = BlockHeader::free((size - keep - HEADER_SIZE) as u32);
        let head = BlockHeader {
            size: keep as u32,
            used: header.used,
        };
        self.arena.write_header(at, head);
        self.arena.write_header(tail_at, tail);
        trace!(
            offset = at,
            kept = keep,
            tail_offset = tail_at,
            tail_size = tail.size,
            "split block"
        );
        head
    }

    pub(crate) fn fill_payload(&mut self, at: usize, header: BlockHeader, byte: u8) {
        self.arena.payload_mut(at, header).fill(byte);
    }

    pub(crate) fn largest_free(&self) -> usize {
        self.blocks()
            .filter(|b| b.is_free)
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }
}

/// Payload bytes actually carved for a request of `requested` bytes.
///
/// Rounded up to [`ALIGN`], never less than `ALIGN`. `None` on overflow.
pub(crate) fn carve_size(requested: usize) -> Option<usize> {
    align_up(requested).map(|n| n.max(ALIGN))
}

impl<S> fmt::Debug for Heap<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("capacity", &self.arena.capacity())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
