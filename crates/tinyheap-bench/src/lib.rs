//! Benchmark profiles and an unchecked workload driver for tinyheap.
//!
//! - [`BenchProfile`]: arena size + operation mix + stream length
//! - [`replay`]: apply a pre-generated op stream to a heap as fast as
//!   possible, without the shadow model's checking
//!
//! Op streams come from [`tinyheap_test_utils::workload`], so benchmark
//! runs replay the same operations a property test would.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tinyheap::{Handle, Heap, HeapError};
use tinyheap_test_utils::workload::generate;
use tinyheap_test_utils::{Op, WorkloadProfile};

/// A named benchmark setup.
#[derive(Clone, Copy, Debug)]
pub struct BenchProfile {
    /// Arena capacity in bytes.
    pub capacity: usize,
    /// Operation mix.
    pub workload: WorkloadProfile,
    /// Number of ops per replay.
    pub ops: usize,
}

impl BenchProfile {
    /// Label for benchmark IDs.
    pub fn name(&self) -> String {
        format!("{}_{}k", self.workload.name, self.capacity / 1024)
    }

    /// The op stream for `seed`.
    pub fn ops(&self, seed: u64) -> Vec<Op> {
        generate(self.workload, seed, self.ops)
    }

    /// A fresh heap over a zeroed buffer of this profile's capacity.
    pub fn heap(&self) -> Heap<Vec<u8>> {
        match Heap::new(vec![0u8; self.capacity]) {
            Ok(heap) => heap,
            Err(e) => panic!("bench profile {} cannot build a heap: {e}", self.name()),
        }
    }
}

/// Small-object churn in an 8 KiB arena, typical of a UI object pool.
pub fn small_profile() -> BenchProfile {
    BenchProfile {
        capacity: 8 * 1024,
        workload: WorkloadProfile::SMALL_OBJECTS,
        ops: 2_000,
    }
}

/// Mixed sizes with resizing and periodic defragmentation in 64 KiB.
pub fn reference_profile() -> BenchProfile {
    BenchProfile {
        capacity: 64 * 1024,
        workload: WorkloadProfile::MIXED,
        ops: 10_000,
    }
}

/// Pure alloc/free churn in 256 KiB, to measure long first-fit scans.
pub fn churn_profile() -> BenchProfile {
    BenchProfile {
        capacity: 256 * 1024,
        workload: WorkloadProfile::CHURN,
        ops: 20_000,
    }
}

/// Every built-in profile.
pub fn all_profiles() -> Vec<BenchProfile> {
    vec![small_profile(), reference_profile(), churn_profile()]
}

/// What happened during a [`replay`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Successful allocations, including reallocations from nothing.
    pub allocs: usize,
    /// Allocations and reallocations refused for lack of space.
    pub out_of_memory: usize,
    /// Reallocations that moved the block.
    pub moves: usize,
    /// Headers absorbed by defragmentation.
    pub merged: usize,
    /// Largest number of simultaneously live blocks.
    pub peak_live: usize,
}

/// Drive `heap` through `ops`. Live handles are kept in a plain vector and
/// `slot` draws are reduced modulo its length.
///
/// # Panics
///
/// Panics if the heap rejects a handle it handed out, which would be a
/// heap bug.
pub fn replay(heap: &mut Heap<Vec<u8>>, ops: &[Op]) -> ReplaySummary {
    let mut live: Vec<Handle> = Vec::new();
    let mut summary = ReplaySummary::default();
    for &op in ops {
        match op {
            Op::Alloc { size } => match heap.allocate(size) {
                Ok(h) => {
                    live.push(h);
                    summary.allocs += 1;
                }
                Err(HeapError::OutOfMemory { .. }) => summary.out_of_memory += 1,
                Err(e) => panic!("allocate({size}) -> {e}"),
            },
            Op::Free { slot } => {
                if !live.is_empty() {
                    let h = live.swap_remove(slot % live.len());
                    if let Err(e) = heap.free(h) {
                        panic!("free({h}) -> {e}");
                    }
                }
            }
            Op::Realloc { slot, size } => {
                if !live.is_empty() {
                    let i = slot % live.len();
                    match heap.reallocate(live[i], size) {
                        Ok(h) => {
                            if h != live[i] {
                                summary.moves += 1;
                            }
                            live[i] = h;
                        }
                        Err(HeapError::OutOfMemory { .. }) => summary.out_of_memory += 1,
                        Err(e) => panic!("reallocate({}, {size}) -> {e}", live[i]),
                    }
                }
            }
            Op::Defrag => summary.merged += heap.defragment(),
        }
        summary.peak_live = summary.peak_live.max(live.len());
    }
    summary
}
