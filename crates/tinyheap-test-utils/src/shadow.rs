//! A checking model that drives a real [`Heap`] and cross-examines it.
//!
//! [`ShadowHeap`] keeps its own list of live allocations, stamps every
//! payload with a per-allocation byte pattern, and after every operation
//! asserts:
//!
//! - the chain verifies and spans the arena exactly;
//! - `used + free + header_overhead == total`;
//! - every live allocation is a used block at least as large as requested,
//!   no two live payloads overlap, and no other block is in use;
//! - every live payload still holds its pattern;
//! - a failed allocation really had no free block large enough;
//! - after a defragment no two free blocks are adjacent.
//!
//! Violations panic with the step number and operation, which is what the
//! property tests want.

use tinyheap::{Handle, Heap, HeapConfig, HeapError};

use crate::workload::Op;

struct Live {
    handle: Handle,
    requested: usize,
    seed: u8,
}

/// Per-operation outcome counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowStats {
    pub allocs: usize,
    pub alloc_failures: usize,
    pub frees: usize,
    pub reallocs: usize,
    pub realloc_moves: usize,
    pub realloc_failures: usize,
    pub defrags: usize,
    pub merged_headers: usize,
}

pub struct ShadowHeap {
    heap: Heap<Vec<u8>>,
    live: Vec<Live>,
    next_seed: u8,
    step: usize,
    stats: ShadowStats,
}

impl ShadowHeap {
    /// Model over a fresh `capacity`-byte heap with default tuning.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(HeapConfig::new(capacity))
    }

    /// # Panics
    ///
    /// Panics if the heap cannot be initialised with `config`.
    pub fn with_config(config: HeapConfig) -> Self {
        let buffer = vec![0u8; config.capacity];
        let heap = match Heap::init(buffer, config) {
            Ok(heap) => heap,
            Err(e) => panic!("shadow heap init failed: {e}"),
        };
        Self {
            heap,
            live: Vec::new(),
            next_seed: 1,
            step: 0,
            stats: ShadowStats::default(),
        }
    }

    pub fn heap(&self) -> &Heap<Vec<u8>> {
        &self.heap
    }

    pub fn stats(&self) -> ShadowStats {
        self.stats
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Apply every op in `ops`, checking after each.
    pub fn run(&mut self, ops: impl IntoIterator<Item = Op>) {
        for op in ops {
            self.apply(op);
        }
    }

    /// Apply one op, then check all invariants.
    pub fn apply(&mut self, op: Op) {
        self.step += 1;
        match op {
            Op::Alloc { size } => self.alloc(size, op),
            Op::Free { slot } => self.free(slot),
            Op::Realloc { slot, size } => self.realloc(slot, size, op),
            Op::Defrag => {
                let merged = self.heap.defragment();
                self.stats.defrags += 1;
                self.stats.merged_headers += merged;
                self.check_no_adjacent_free(op);
            }
        }
        self.check(op);
    }

    /// Free everything still live, defragment, and check the heap is back
    /// to a single free block.
    pub fn drain(&mut self) {
        while !self.live.is_empty() {
            self.apply(Op::Free { slot: 0 });
        }
        self.apply(Op::Defrag);
        let blocks: Vec<_> = self.heap.blocks().collect();
        assert_eq!(blocks.len(), 1, "drained heap is not one block: {blocks:?}");
        assert!(blocks[0].is_free);
    }

    fn alloc(&mut self, size: usize, op: Op) {
        match self.heap.allocate(size) {
            Ok(handle) => {
                let seed = self.take_seed();
                self.stamp(handle, size, seed);
                self.live.push(Live {
                    handle,
                    requested: size,
                    seed,
                });
                self.stats.allocs += 1;
            }
            Err(HeapError::OutOfMemory { largest_free, .. }) => {
                let actual = self.heap.report().largest_free;
                assert_eq!(largest_free, actual, "step {}: {op:?}", self.step);
                assert!(
                    actual < size,
                    "step {}: {op:?} failed with a {actual}-byte free block",
                    self.step
                );
                self.stats.alloc_failures += 1;
            }
            Err(e) => panic!("step {}: {op:?} -> unexpected {e}", self.step),
        }
    }

    fn free(&mut self, slot: usize) {
        if self.live.is_empty() {
            return;
        }
        let live = self.live.swap_remove(slot % self.live.len());
        if let Err(e) = self.heap.free(live.handle) {
            panic!("step {}: free {} -> {e}", self.step, live.handle);
        }
        self.stats.frees += 1;
    }

    fn realloc(&mut self, slot: usize, size: usize, op: Op) {
        if self.live.is_empty() {
            return;
        }
        let index = slot % self.live.len();
        let old = self.live[index].handle;
        match self.heap.reallocate(old, size) {
            Ok(handle) => {
                let entry = &mut self.live[index];
                let kept = entry.requested.min(size);
                let seed = entry.seed;
                entry.handle = handle;
                entry.requested = size;
                if handle != old {
                    self.stats.realloc_moves += 1;
                }
                self.stats.reallocs += 1;
                self.check_pattern(handle, kept, seed, op);
                self.stamp(handle, size, seed);
            }
            Err(HeapError::OutOfMemory { .. }) => {
                self.stats.realloc_failures += 1;
            }
            Err(e) => panic!("step {}: {op:?} -> unexpected {e}", self.step),
        }
    }

    fn take_seed(&mut self) -> u8 {
        let seed = self.next_seed;
        self.next_seed = self.next_seed.wrapping_add(37) | 1;
        seed
    }

    fn stamp(&mut self, handle: Handle, len: usize, seed: u8) {
        let step = self.step;
        let payload = match self.heap.payload_mut(handle) {
            Ok(p) => p,
            Err(e) => panic!("step {step}: payload_mut {handle} -> {e}"),
        };
        for (i, b) in payload[..len].iter_mut().enumerate() {
            *b = pattern(seed, i);
        }
    }

    fn check_pattern(&self, handle: Handle, len: usize, seed: u8, op: Op) {
        let payload = match self.heap.payload(handle) {
            Ok(p) => p,
            Err(e) => panic!("step {}: {op:?}: payload {handle} -> {e}", self.step),
        };
        if let Some(i) = (0..len).find(|&i| payload[i] != pattern(seed, i)) {
            panic!(
                "step {}: {op:?}: {handle} byte {i} is {:#04x}, expected {:#04x}",
                self.step,
                payload[i],
                pattern(seed, i)
            );
        }
    }

    fn check(&self, op: Op) {
        let step = self.step;
        if let Err(e) = self.heap.verify() {
            panic!("step {step}: {op:?} left a corrupt chain: {e}");
        }

        let stats = self.heap.report();
        assert_eq!(
            stats.used + stats.free + stats.header_overhead,
            stats.total,
            "step {step}: {op:?} broke byte conservation"
        );
        assert_eq!(
            stats.used_blocks,
            self.live.len(),
            "step {step}: {op:?}: heap and model disagree on live blocks"
        );

        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(self.live.len());
        for live in &self.live {
            let size = match self.heap.try_get_size(live.handle) {
                Ok(size) => size,
                Err(e) => panic!("step {step}: {op:?}: live {} -> {e}", live.handle),
            };
            assert!(
                size >= live.requested,
                "step {step}: {op:?}: {} holds {size} < {}",
                live.handle,
                live.requested
            );
            spans.push((live.handle.offset(), live.handle.offset() + size));
            self.check_pattern(live.handle, live.requested, live.seed, op);
        }
        spans.sort_unstable();
        for pair in spans.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "step {step}: {op:?}: payloads {:?} and {:?} overlap",
                pair[0],
                pair[1]
            );
        }
    }

    fn check_no_adjacent_free(&self, op: Op) {
        let blocks: Vec<_> = self.heap.blocks().collect();
        for pair in blocks.windows(2) {
            assert!(
                !(pair[0].is_free && pair[1].is_free),
                "step {}: {op:?} left adjacent free blocks at {} and {}",
                self.step,
                pair[0].offset,
                pair[1].offset
            );
        }
    }
}

fn pattern(seed: u8, i: usize) -> u8 {
    seed.wrapping_add((i as u8).wrapping_mul(31))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{generate, WorkloadProfile};

    #[test]
    fn replays_every_profile_cleanly() {
        for profile in WorkloadProfile::ALL {
            let mut shadow = ShadowHeap::new(4096);
            shadow.run(generate(profile, 42, 2000));
            shadow.drain();
        }
    }

    #[test]
    fn tight_arena_exercises_failures() {
        let mut shadow = ShadowHeap::new(512);
        shadow.run(generate(WorkloadProfile::MIXED, 9, 2000));
        let stats = shadow.stats();
        assert!(stats.alloc_failures > 0);
        assert!(stats.allocs > 0);
        shadow.drain();
    }

    #[test]
    fn junk_fill_does_not_disturb_live_data() {
        let config = HeapConfig::new(2048).with_junk_fill(true);
        let mut shadow = ShadowHeap::with_config(config);
        shadow.run(generate(WorkloadProfile::MIXED, 5, 1500));
        shadow.drain();
    }

    #[test]
    fn ops_on_empty_model_are_ignored() {
        let mut shadow = ShadowHeap::new(256);
        shadow.apply(Op::Free { slot: 3 });
        shadow.apply(Op::Realloc { slot: 0, size: 10 });
        assert_eq!(shadow.stats(), ShadowStats::default());
    }
}
