//! Read-only statistics over the block chain.

use crate::header::HEADER_SIZE;
use crate::heap::Heap;

/// Point-in-time heap statistics produced by [`Heap::report`].
///
/// All byte counts are payload bytes unless stated otherwise. For a
/// consistent chain `used + free + header_overhead == total`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeapStats {
    /// Arena capacity in bytes.
    pub total: usize,
    /// Payload bytes in used blocks.
    pub used: usize,
    /// Payload bytes in free blocks.
    pub free: usize,
    /// Bytes taken by block headers.
    pub header_overhead: usize,
    /// Number of used blocks.
    pub used_blocks: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Payload size of the largest free block.
    pub largest_free: usize,
    /// `1 - largest_free / free`, or `0.0` when nothing is free.
    ///
    /// `0.0` means all free memory is one block; values near `1.0` mean
    /// it is scattered across many small ones.
    pub fragmentation_ratio: f64,
}

impl HeapStats {
    /// Percentage of payload-capable bytes in use, `0..=100`.
    ///
    /// Zero for an arena with no payload bytes.
    pub fn used_pct(&self) -> u8 {
        let payload = self.total.saturating_sub(self.header_overhead) as u64;
        if payload == 0 {
            return 0;
        }
        let free_pct = (self.free as u64 * 100) / payload;
        100u64.saturating_sub(free_pct) as u8
    }

    /// Fragmentation ratio as a rounded percentage, `0..=100`.
    pub fn frag_pct(&self) -> u8 {
        (self.fragmentation_ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

impl<S> Heap<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Walk the chain once and summarise it. Never mutates the heap.
    pub fn report(&self) -> HeapStats {
        let mut stats = HeapStats {
            total: self.arena.capacity(),
            used: 0,
            free: 0,
            header_overhead: 0,
            used_blocks: 0,
            free_blocks: 0,
            largest_free: 0,
            fragmentation_ratio: 0.0,
        };
        for block in self.blocks() {
            stats.header_overhead += HEADER_SIZE;
            if block.is_free {
                stats.free += block.size;
                stats.free_blocks += 1;
                stats.largest_free = stats.largest_free.max(block.size);
            } else {
                stats.used += block.size;
                stats.used_blocks += 1;
            }
        }
        if stats.free > 0 {
            stats.fragmentation_ratio = 1.0 - stats.largest_free as f64 / stats.free as f64;
        }
        stats
    }
}
