//! Allocator core: first-fit search and carve-out.

use tracing::trace;

use crate::config::JUNK_ALLOC;
use crate::error::HeapError;
use crate::handle::Handle;
use crate::header::BlockHeader;
use crate::heap::{carve_size, Heap};

impl<S> Heap<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Allocate a block with at least `size` payload bytes.
    ///
    /// Scans the chain from the arena start and takes the first free block
    /// whose payload is at least `size`. If that block is large enough to
    /// leave a useful remainder (a header plus
    /// [`min_split_payload`](crate::HeapConfig::min_split_payload) bytes
    /// after carving `size` rounded up to [`ALIGN`](crate::ALIGN)), the
    /// remainder becomes a new free block; otherwise the whole block is
    /// handed out.
    ///
    /// The payload is not initialised. `size == 0` is allowed and yields a
    /// minimum-size block that must still be freed.
    ///
    /// # Errors
    ///
    /// [`HeapError::OutOfMemory`] if no free block is large enough.
    /// Free blocks are not coalesced automatically, so running
    /// [`defragment`](Self::defragment) before retrying may help.
    pub fn allocate(&mut self, size: usize) -> Result<Handle, HeapError> {
        let Some(block) = self.blocks().find(|b| b.is_free && b.size >= size) else {
            return Err(HeapError::OutOfMemory {
                requested: size,
                largest_free: self.largest_free(),
            });
        };

        let at = block.offset;
        let mut header = BlockHeader::used(block.size as u32);
        self.arena.write_header(at, header);
        if let Some(carve) = carve_size(size) {
            header = self.split_tail(at, header, carve);
        }
        if self.config.junk_fill {
            self.fill_payload(at, header, JUNK_ALLOC);
        }

        trace!(
            offset = at,
            requested = size,
            granted = header.size,
            "allocated block"
        );
        Ok(Handle::from_header(at))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{HeapConfig, JUNK_ALLOC};
    use crate::error::HeapError;
    use crate::header::HEADER_SIZE;
    use crate::Heap;

    fn heap(capacity: usize) -> Heap<Vec<u8>> {
        Heap::new(vec![0u8; capacity]).unwrap()
    }

    #[test]
    fn first_allocation_sits_after_first_header() {
        let mut heap = heap(1024);
        let h = heap.allocate(100).unwrap();
        assert_eq!(h.offset(), HEADER_SIZE);
        assert!(heap.get_size(h) >= 100);
    }

    #[test]
    fn split_leaves_free_remainder() {
        let mut heap = heap(1024);
        let h = heap.allocate(100).unwrap();
        let blocks: Vec<_> = heap.blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert!(!blocks[0].is_free);
        assert_eq!(blocks[0].size, 104);
        assert!(blocks[1].is_free);
        assert_eq!(blocks[1].offset, HEADER_SIZE + 104);
        assert_eq!(blocks[1].size, 1024 - 2 * HEADER_SIZE - 104);
        assert_eq!(heap.get_size(h), 104);
    }

    #[test]
    fn small_remainder_is_not_split() {
        // 64-byte arena: 56 payload. Carving 40 leaves 16, which cannot
        // hold a header plus the default 16-byte minimum.
        let mut heap = heap(64);
        let h = heap.allocate(40).unwrap();
        assert_eq!(heap.get_size(h), 56);
        assert_eq!(heap.blocks().count(), 1);
    }

    #[test]
    fn min_split_threshold_is_tunable() {
        let mut heap = Heap::init(vec![0u8; 64], HeapConfig::new(64).with_min_split_payload(8))
            .unwrap();
        let h = heap.allocate(40).unwrap();
        assert_eq!(heap.get_size(h), 40);
        let blocks: Vec<_> = heap.blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].size, 8);
    }

    #[test]
    fn first_fit_reuses_earliest_hole() {
        let mut heap = heap(1024);
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(200).unwrap();
        heap.free(a).unwrap();
        let c = heap.allocate(50).unwrap();
        assert_eq!(c, a);
        assert!(c.offset() < b.offset());
    }

    #[test]
    fn first_fit_skips_holes_that_are_too_small() {
        let mut heap = heap(1024);
        let a = heap.allocate(32).unwrap();
        let _b = heap.allocate(32).unwrap();
        heap.free(a).unwrap();
        let c = heap.allocate(64).unwrap();
        assert!(c.offset() > a.offset());
    }

    #[test]
    fn whole_arena_request_succeeds_exactly() {
        let capacity = 1024;
        let mut heap = heap(capacity);
        let h = heap.allocate(capacity - HEADER_SIZE).unwrap();
        assert_eq!(heap.get_size(h), capacity - HEADER_SIZE);

        let mut heap = self::heap(capacity);
        let err = heap.allocate(capacity - HEADER_SIZE + 1).unwrap_err();
        assert_eq!(
            err,
            HeapError::OutOfMemory {
                requested: capacity - HEADER_SIZE + 1,
                largest_free: capacity - HEADER_SIZE
            }
        );
    }

    #[test]
    fn unaligned_capacity_whole_request() {
        let capacity = 1021;
        let mut heap = heap(capacity);
        let h = heap.allocate(capacity - HEADER_SIZE).unwrap();
        assert_eq!(heap.get_size(h), capacity - HEADER_SIZE);
        heap.verify().unwrap();
    }

    #[test]
    fn zero_size_allocation_is_freeable() {
        let mut heap = heap(256);
        let h = heap.allocate(0).unwrap();
        assert!(heap.get_size(h) > 0);
        heap.free(h).unwrap();
    }

    #[test]
    fn zero_size_allocation_in_header_only_arena() {
        let mut heap = heap(HEADER_SIZE);
        let h = heap.allocate(0).unwrap();
        assert_eq!(heap.get_size(h), 0);
        assert!(heap.allocate(0).is_err());
        heap.free(h).unwrap();
    }

    #[test]
    fn exhaustion_reports_out_of_memory() {
        let mut heap = heap(256);
        let mut handles = Vec::new();
        while let Ok(h) = heap.allocate(32) {
            handles.push(h);
        }
        assert!(!handles.is_empty());
        assert!(matches!(
            heap.allocate(32),
            Err(HeapError::OutOfMemory { requested: 32, .. })
        ));
        heap.verify().unwrap();
    }

    #[test]
    fn huge_request_is_out_of_memory_not_panic() {
        let mut heap = heap(256);
        assert!(matches!(
            heap.allocate(usize::MAX),
            Err(HeapError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn junk_fill_marks_new_payload() {
        let mut heap =
            Heap::init(vec![0u8; 256], HeapConfig::new(256).with_junk_fill(true)).unwrap();
        let h = heap.allocate(24).unwrap();
        assert!(heap.payload(h).unwrap().iter().all(|&b| b == JUNK_ALLOC));
    }
}
