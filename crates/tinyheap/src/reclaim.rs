//! Reclaimer: `free` and `reallocate`.
//!
//! Freeing never merges neighbours; that is left to
//! [`Heap::defragment`] so the release path stays O(1).

use tracing::{debug, trace};

use crate::arena::next_block;
use crate::config::{JUNK_ALLOC, JUNK_FREE};
use crate::error::HeapError;
use crate::handle::Handle;
use crate::header::{BlockHeader, HEADER_SIZE};
use crate::heap::{carve_size, Heap};

impl<S> Heap<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Return a block to the heap.
    ///
    /// # Errors
    ///
    /// [`HeapError::InvalidHandle`] if `handle` does not name a live block
    /// payload. An immediate double free is caught; a double free after the
    /// same address was handed out again is not.
    pub fn free(&mut self, handle: Handle) -> Result<(), HeapError> {
        let (at, header) = self.live_block(handle)?;
        self.release(at, header);
        Ok(())
    }

    fn release(&mut self, at: usize, header: BlockHeader) {
        let freed = BlockHeader::free(header.size);
        self.arena.write_header(at, freed);
        if self.config.junk_fill {
            self.fill_payload(at, freed, JUNK_FREE);
        }
        trace!(offset = at, size = header.size, "freed block");
    }

    /// Resize a block, preserving its contents up to the smaller size.
    ///
    /// - Same size: returns `handle`.
    /// - Smaller: shrinks in place, splitting off the tail when it is
    ///   large enough to be useful. Returns `handle`.
    /// - Larger: absorbs directly following free blocks in place when they
    ///   provide enough room. Returns `handle`.
    /// - Otherwise allocates a new block, copies the old payload, frees the
    ///   old block and returns the new handle.
    ///
    /// # Errors
    ///
    /// - [`HeapError::InvalidHandle`] as for [`free`](Self::free).
    /// - [`HeapError::OutOfMemory`] if the block has to move and no free
    ///   block is large enough. The original block and its contents are
    ///   left exactly as they were.
    pub fn reallocate(&mut self, handle: Handle, new_size: usize) -> Result<Handle, HeapError> {
        let (at, header) = self.live_block(handle)?;
        let old_size = header.payload_len();

        if new_size == old_size {
            return Ok(handle);
        }
        if new_size < old_size {
            if let Some(keep) = carve_size(new_size) {
                let head = self.split_tail(at, header, keep);
                self.junk_split_tail(at, head, header);
            }
            return Ok(handle);
        }
        if self.grow_in_place(at, header, new_size) {
            return Ok(handle);
        }

        let moved = self.allocate(new_size)?;
        let src = handle.offset();
        self.arena
            .bytes_mut()
            .copy_within(src..src + old_size, moved.offset());
        self.release(at, header);
        debug!(
            from = src,
            to = moved.offset(),
            old_size,
            new_size,
            "relocated block"
        );
        Ok(moved)
    }

    /// Extend the used block at `at` over the run of free blocks right
    /// after it, if that yields at least `new_size` bytes. Excess beyond
    /// the carved size is split back off.
    fn grow_in_place(&mut self, at: usize, header: BlockHeader, new_size: usize) -> bool {
        let capacity = self.arena.capacity();
        let mut available = header.payload_len();
        let mut end = next_block(at, header);
        let mut absorbed = 0usize;

        while available < new_size && end < capacity {
            match self.arena.read_header(end) {
                Some(next) if !next.used => {
                    absorbed += 1;
                    available += HEADER_SIZE + next.payload_len();
                    end = next_block(end, next);
                }
                _ => break,
            }
        }
        if available < new_size {
            return false;
        }

        // Second walk over the same run, now committed.
        let mut stale = next_block(at, header);
        for _ in 0..absorbed {
            let Some(next) = self.arena.read_header(stale) else {
                break;
            };
            self.arena.scrub_header(stale);
            stale = next_block(stale, next);
        }
        let grown = BlockHeader::used(available as u32);
        self.arena.write_header(at, grown);
        let head = match carve_size(new_size) {
            Some(keep) => self.split_tail(at, grown, keep),
            None => grown,
        };
        if self.config.junk_fill {
            let start = at + HEADER_SIZE;
            self.arena.bytes_mut()[start + header.payload_len()..start + head.payload_len()]
                .fill(JUNK_ALLOC);
        }
        self.junk_split_tail(at, head, grown);
        trace!(offset = at, absorbed, new_size, "grew block in place");
        true
    }

    /// After `before` at `at` was cut down to `head`, junk-fill the free
    /// tail block the split created, if any.
    fn junk_split_tail(&mut self, at: usize, head: BlockHeader, before: BlockHeader) {
        if !self.config.junk_fill || head.size == before.size {
            return;
        }
        let tail_at = next_block(at, head);
        if let Some(tail) = self.arena.read_header(tail_at) {
            self.fill_payload(tail_at, tail, JUNK_FREE);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{HeapConfig, JUNK_ALLOC, JUNK_FREE};
    use crate::error::HeapError;
    use crate::handle::Handle;
    use crate::header::HEADER_SIZE;
    use crate::Heap;

    fn heap(capacity: usize) -> Heap<Vec<u8>> {
        Heap::new(vec![0u8; capacity]).unwrap()
    }

    // ── free ────────────────────────────────────────────────────────

    #[test]
    fn free_marks_block_free_without_merging() {
        let mut heap = heap(1024);
        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(64).unwrap();
        heap.free(a).unwrap();
        heap.free(b).unwrap();
        let free: Vec<_> = heap.blocks().filter(|b| b.is_free).collect();
        assert_eq!(free.len(), 3);
    }

    #[test]
    fn double_free_is_rejected() {
        let mut heap = heap(256);
        let h = heap.allocate(16).unwrap();
        heap.free(h).unwrap();
        assert_eq!(
            heap.free(h),
            Err(HeapError::InvalidHandle { offset: h.offset() })
        );
    }

    #[test]
    fn foreign_offsets_are_rejected() {
        let mut heap = heap(256);
        let h = heap.allocate(16).unwrap();
        for bad in [0, 1, h.offset() + 4, h.offset() + 8, 255, 4096] {
            assert!(
                matches!(
                    heap.free(Handle::from_offset(bad)),
                    Err(HeapError::InvalidHandle { .. })
                ),
                "offset {bad} accepted"
            );
        }
        heap.free(h).unwrap();
    }

    #[test]
    fn free_of_never_allocated_block_is_rejected() {
        let mut heap = heap(256);
        // Offset of the initial free block's payload.
        assert!(heap.free(Handle::from_offset(HEADER_SIZE)).is_err());
    }

    #[test]
    fn junk_fill_marks_freed_payload() {
        let mut heap =
            Heap::init(vec![0u8; 256], HeapConfig::new(256).with_junk_fill(true)).unwrap();
        let h = heap.allocate(24).unwrap();
        heap.payload_mut(h).unwrap().fill(1);
        heap.free(h).unwrap();
        let start = h.offset();
        let bytes = heap.into_inner();
        assert!(bytes[start..start + 24].iter().all(|&b| b == JUNK_FREE));
    }

    #[test]
    fn header_bytes_copied_into_payload_are_not_a_handle() {
        let mut heap = heap(1024);
        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(200).unwrap();
        let c = heap.allocate(64).unwrap();
        let b_at = b.offset() - HEADER_SIZE;
        let real: [u8; HEADER_SIZE] = heap.arena.bytes()[b_at..b_at + HEADER_SIZE]
            .try_into()
            .unwrap();
        heap.payload_mut(a).unwrap()[48..56].copy_from_slice(&real);

        let planted = Handle::from_offset(a.offset() + 56);
        assert!(matches!(
            heap.reallocate(planted, 8),
            Err(HeapError::InvalidHandle { .. })
        ));
        assert!(matches!(
            heap.free(planted),
            Err(HeapError::InvalidHandle { .. })
        ));
        assert_eq!(heap.get_size(planted), 0);

        heap.verify().unwrap();
        assert_eq!(heap.get_size(b), 200);
        heap.free(b).unwrap();
        heap.free(c).unwrap();
        heap.free(a).unwrap();
    }

    // ── reallocate ─────────────────────────────────────────────────

    #[test]
    fn same_size_is_noop() {
        let mut heap = heap(512);
        let h = heap.allocate(64).unwrap();
        assert_eq!(heap.reallocate(h, 64).unwrap(), h);
        assert_eq!(heap.get_size(h), 64);
    }

    #[test]
    fn shrink_keeps_address_and_splits_tail() {
        let mut heap = heap(512);
        let h = heap.allocate(256).unwrap();
        let _guard = heap.allocate(16).unwrap();
        let blocks_before = heap.blocks().count();
        assert_eq!(heap.reallocate(h, 64).unwrap(), h);
        assert_eq!(heap.get_size(h), 64);
        assert_eq!(heap.blocks().count(), blocks_before + 1);
        heap.verify().unwrap();
    }

    #[test]
    fn small_shrink_leaves_block_oversized() {
        let mut heap = heap(512);
        let h = heap.allocate(64).unwrap();
        assert_eq!(heap.reallocate(h, 60).unwrap(), h);
        assert_eq!(heap.get_size(h), 64);
    }

    #[test]
    fn shrink_preserves_prefix() {
        let mut heap = heap(512);
        let h = heap.allocate(128).unwrap();
        for (i, b) in heap.payload_mut(h).unwrap().iter_mut().enumerate() {
            *b = i as u8;
        }
        let h = heap.reallocate(h, 32).unwrap();
        let expected: Vec<u8> = (0..32).collect();
        assert_eq!(heap.payload(h).unwrap(), &expected[..]);
    }

    #[test]
    fn grow_absorbs_free_neighbour_in_place() {
        let mut heap = heap(1024);
        let h = heap.allocate(64).unwrap();
        heap.payload_mut(h).unwrap().fill(0x5A);
        let grown = heap.reallocate(h, 400).unwrap();
        assert_eq!(grown, h);
        assert!(heap.get_size(h) >= 400);
        assert!(heap.payload(h).unwrap()[..64].iter().all(|&b| b == 0x5A));
        heap.verify().unwrap();
    }

    #[test]
    fn grow_in_place_splits_off_excess() {
        let mut heap = heap(1024);
        let h = heap.allocate(64).unwrap();
        assert_eq!(heap.reallocate(h, 128).unwrap(), h);
        assert_eq!(heap.get_size(h), 128);
        let blocks: Vec<_> = heap.blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].is_free);
        assert_eq!(blocks[1].offset, HEADER_SIZE + 128);
    }

    #[test]
    fn grow_absorbs_run_of_free_blocks() {
        let mut heap = heap(1024);
        let h = heap.allocate(32).unwrap();
        let a = heap.allocate(32).unwrap();
        let b = heap.allocate(32).unwrap();
        let _wall = heap.allocate(32).unwrap();
        heap.free(a).unwrap();
        heap.free(b).unwrap();
        // 32 + (8 + 32) + (8 + 32) = 112 bytes reachable without moving.
        assert_eq!(heap.reallocate(h, 112).unwrap(), h);
        assert_eq!(heap.get_size(h), 112);
        // The absorbed headers are gone; stale handles cannot resolve.
        assert!(heap.free(a).is_err());
        assert!(heap.free(b).is_err());
        heap.verify().unwrap();
    }

    #[test]
    fn grow_blocked_by_used_neighbour_relocates_and_copies() {
        let mut heap = heap(1024);
        let h = heap.allocate(32).unwrap();
        let _wall = heap.allocate(32).unwrap();
        for (i, b) in heap.payload_mut(h).unwrap().iter_mut().enumerate() {
            *b = (i * 3) as u8;
        }
        let moved = heap.reallocate(h, 200).unwrap();
        assert_ne!(moved, h);
        let expected: Vec<u8> = (0..32).map(|i| (i * 3) as u8).collect();
        assert_eq!(&heap.payload(moved).unwrap()[..32], &expected[..]);
        // The old block was released.
        assert!(heap.payload(h).is_err());
        heap.verify().unwrap();
    }

    #[test]
    fn failed_relocation_leaves_original_untouched() {
        let mut heap = heap(256);
        let h = heap.allocate(64).unwrap();
        let _wall = heap.allocate(16).unwrap();
        heap.payload_mut(h).unwrap().fill(0xC3);
        let before: Vec<_> = heap.blocks().collect();

        let err = heap.reallocate(h, 1000).unwrap_err();
        assert!(matches!(err, HeapError::OutOfMemory { requested: 1000, .. }));
        assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
        assert!(heap.payload(h).unwrap().iter().all(|&b| b == 0xC3));
    }

    #[test]
    fn reallocate_rejects_invalid_handle() {
        let mut heap = heap(256);
        assert!(matches!(
            heap.reallocate(Handle::from_offset(3), 10),
            Err(HeapError::InvalidHandle { offset: 3 })
        ));
    }

    #[test]
    fn junk_fill_marks_tail_split_off_by_shrink() {
        let mut heap =
            Heap::init(vec![0u8; 512], HeapConfig::new(512).with_junk_fill(true)).unwrap();
        let h = heap.allocate(256).unwrap();
        heap.payload_mut(h).unwrap().fill(0x11);
        assert_eq!(heap.reallocate(h, 64).unwrap(), h);
        assert!(heap.payload(h).unwrap().iter().all(|&b| b == 0x11));

        let tail = heap.blocks().nth(1).unwrap();
        assert!(tail.is_free);
        let bytes = heap.into_inner();
        assert!(bytes[tail.payload_offset()..tail.end()]
            .iter()
            .all(|&b| b == JUNK_FREE));
    }

    #[test]
    fn junk_fill_marks_bytes_gained_in_place() {
        let mut heap =
            Heap::init(vec![0u8; 1024], HeapConfig::new(1024).with_junk_fill(true)).unwrap();
        let h = heap.allocate(64).unwrap();
        heap.payload_mut(h).unwrap().fill(0x22);
        assert_eq!(heap.reallocate(h, 200).unwrap(), h);

        let payload = heap.payload(h).unwrap();
        assert!(payload[..64].iter().all(|&b| b == 0x22));
        assert!(payload[64..].iter().all(|&b| b == JUNK_ALLOC));

        let tail = heap.blocks().nth(1).unwrap();
        assert!(tail.is_free);
        let bytes = heap.into_inner();
        assert!(bytes[tail.payload_offset()..tail.end()]
            .iter()
            .all(|&b| b == JUNK_FREE));
    }

    #[test]
    fn shrink_to_zero_keeps_handle_valid() {
        let mut heap = heap(256);
        let h = heap.allocate(128).unwrap();
        assert_eq!(heap.reallocate(h, 0).unwrap(), h);
        heap.free(h).unwrap();
        heap.verify().unwrap();
    }
}
