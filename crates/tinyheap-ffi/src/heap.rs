//! Heap lifecycle and allocation FFI.
//!
//! Each instance lives in its own `Arc<Mutex<Heap>>`, so the global
//! `HEAPS` table lock is held only for handle lookup and different heaps
//! can be used from different threads concurrently.

use std::sync::{Arc, Mutex};

use tinyheap::{Handle, Heap, HeapConfig, HeapStats};

use crate::arena::RawArena;
use crate::handle::InstanceTable;
use crate::status::TinyheapStatus;

type HeapArc = Arc<Mutex<Heap<RawArena>>>;

static HEAPS: Mutex<InstanceTable<HeapArc>> = Mutex::new(InstanceTable::new());

fn get_heap(handle: u64) -> Option<HeapArc> {
    HEAPS.lock().ok()?.get(handle).cloned()
}

/// Payload address for `handle`.
fn address(heap: &mut Heap<RawArena>, handle: Handle) -> *mut u8 {
    heap.base_ptr().wrapping_add(handle.offset())
}

/// Handle for a payload address, if it lies inside the arena at all.
/// The heap still validates it.
fn handle_at(heap: &mut Heap<RawArena>, ptr: *mut u8) -> Option<Handle> {
    let offset = (ptr as usize).checked_sub(heap.base_ptr() as usize)?;
    (offset <= heap.capacity()).then_some(Handle::from_offset(offset))
}

/// Heap statistics in C layout, filled by [`tinyheap_monitor`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TinyheapMonitor {
    /// Arena capacity in bytes.
    pub total_size: u64,
    /// Payload bytes in free blocks.
    pub free_size: u64,
    /// Payload bytes in used blocks.
    pub used_size: u64,
    /// Bytes taken by block headers.
    pub header_overhead: u64,
    /// Payload size of the largest free block.
    pub free_biggest_size: u64,
    /// Number of free blocks.
    pub free_cnt: u32,
    /// Number of used blocks.
    pub used_cnt: u32,
    /// Percentage of payload-capable bytes in use, 0..=100.
    pub used_pct: u8,
    /// Fragmentation as a percentage, 0..=100.
    pub frag_pct: u8,
}

// 5×u64 + 2×u32 + 2×u8 + 6 bytes padding = 56 bytes, align 8.
const _: () = assert!(std::mem::size_of::<TinyheapMonitor>() == 56);
const _: () = assert!(std::mem::align_of::<TinyheapMonitor>() == 8);

impl TinyheapMonitor {
    fn from_stats(s: &HeapStats) -> Self {
        Self {
            total_size: s.total as u64,
            free_size: s.free as u64,
            used_size: s.used as u64,
            header_overhead: s.header_overhead as u64,
            free_biggest_size: s.largest_free as u64,
            free_cnt: s.free_blocks as u32,
            used_cnt: s.used_blocks as u32,
            used_pct: s.used_pct(),
            frag_pct: s.frag_pct(),
        }
    }
}

/// Create a heap over `len` bytes at `buf`.
///
/// `buf` must be 8-byte aligned and stay valid and untouched by the
/// caller, except through pointers returned by this API, until
/// [`tinyheap_destroy`]. `min_split` is the smallest free remainder worth
/// splitting off; `junk_fill != 0` enables debug fill patterns.
///
/// On success writes the instance handle to `heap_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tinyheap_init(
    buf: *mut u8,
    len: usize,
    min_split: usize,
    junk_fill: u8,
    heap_out: *mut u64,
) -> i32 {
    ffi_guard!({
        if heap_out.is_null() {
            return TinyheapStatus::InvalidArgument as i32;
        }
        // SAFETY: validity and exclusivity of `buf` are the caller's contract.
        let arena = match unsafe { RawArena::new(buf, len) } {
            Some(a) => a,
            None => return TinyheapStatus::InvalidArgument as i32,
        };
        let config = HeapConfig::new(len)
            .with_min_split_payload(min_split)
            .with_junk_fill(junk_fill != 0);
        let heap = match Heap::init(arena, config) {
            Ok(h) => h,
            Err(e) => return TinyheapStatus::from(&e) as i32,
        };

        let handle = ffi_lock!(HEAPS).insert(Arc::new(Mutex::new(heap)));
        // SAFETY: heap_out is non-null and valid per caller contract.
        unsafe { *heap_out = handle };
        TinyheapStatus::Ok as i32
    })
}

/// Destroy a heap instance. The buffer goes back to the caller; every
/// pointer obtained from this heap becomes dangling.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tinyheap_destroy(heap: u64) -> i32 {
    ffi_guard!({
        match ffi_lock!(HEAPS).remove(heap) {
            Some(_) => TinyheapStatus::Ok as i32,
            None => TinyheapStatus::InvalidHandle as i32,
        }
    })
}

/// Allocate at least `size` bytes and write the payload address to
/// `ptr_out`. Nothing is written on failure.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tinyheap_alloc(heap: u64, size: usize, ptr_out: *mut *mut u8) -> i32 {
    ffi_guard!({
        if ptr_out.is_null() {
            return TinyheapStatus::InvalidArgument as i32;
        }
        let heap_arc = match get_heap(heap) {
            Some(arc) => arc,
            None => return TinyheapStatus::InvalidHandle as i32,
        };
        let mut heap = ffi_lock!(heap_arc);
        match heap.allocate(size) {
            Ok(h) => {
                let ptr = address(&mut heap, h);
                // SAFETY: ptr_out is non-null and valid per caller contract.
                unsafe { *ptr_out = ptr };
                TinyheapStatus::Ok as i32
            }
            Err(e) => TinyheapStatus::from(&e) as i32,
        }
    })
}

/// Free the block whose payload starts at `ptr`. A null `ptr` is a no-op.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tinyheap_free(heap: u64, ptr: *mut u8) -> i32 {
    ffi_guard!({
        let heap_arc = match get_heap(heap) {
            Some(arc) => arc,
            None => return TinyheapStatus::InvalidHandle as i32,
        };
        if ptr.is_null() {
            return TinyheapStatus::Ok as i32;
        }
        let mut heap = ffi_lock!(heap_arc);
        let handle = match handle_at(&mut heap, ptr) {
            Some(h) => h,
            None => return TinyheapStatus::InvalidHandle as i32,
        };
        match heap.free(handle) {
            Ok(()) => TinyheapStatus::Ok as i32,
            Err(e) => TinyheapStatus::from(&e) as i32,
        }
    })
}

/// Resize the block at `ptr` to `new_size` bytes and write the (possibly
/// moved) payload address to `ptr_out`. A null `ptr` allocates.
///
/// On failure nothing is written and the original block is unchanged.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tinyheap_realloc(
    heap: u64,
    ptr: *mut u8,
    new_size: usize,
    ptr_out: *mut *mut u8,
) -> i32 {
    ffi_guard!({
        if ptr_out.is_null() {
            return TinyheapStatus::InvalidArgument as i32;
        }
        let heap_arc = match get_heap(heap) {
            Some(arc) => arc,
            None => return TinyheapStatus::InvalidHandle as i32,
        };
        let mut heap = ffi_lock!(heap_arc);
        let result = if ptr.is_null() {
            heap.allocate(new_size)
        } else {
            match handle_at(&mut heap, ptr) {
                Some(h) => heap.reallocate(h, new_size),
                None => return TinyheapStatus::InvalidHandle as i32,
            }
        };
        match result {
            Ok(h) => {
                let moved = address(&mut heap, h);
                // SAFETY: ptr_out is non-null and valid per caller contract.
                unsafe { *ptr_out = moved };
                TinyheapStatus::Ok as i32
            }
            Err(e) => TinyheapStatus::from(&e) as i32,
        }
    })
}

/// Merge adjacent free blocks. Writes the number of absorbed headers to
/// `merged_out` unless it is null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tinyheap_defrag(heap: u64, merged_out: *mut u64) -> i32 {
    ffi_guard!({
        let heap_arc = match get_heap(heap) {
            Some(arc) => arc,
            None => return TinyheapStatus::InvalidHandle as i32,
        };
        let merged = ffi_lock!(heap_arc).defragment();
        if !merged_out.is_null() {
            // SAFETY: merged_out is non-null and valid per caller contract.
            unsafe { *merged_out = merged as u64 };
        }
        TinyheapStatus::Ok as i32
    })
}

/// Fill `out` with current heap statistics.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tinyheap_monitor(heap: u64, out: *mut TinyheapMonitor) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return TinyheapStatus::InvalidArgument as i32;
        }
        let heap_arc = match get_heap(heap) {
            Some(arc) => arc,
            None => return TinyheapStatus::InvalidHandle as i32,
        };
        let stats = ffi_lock!(heap_arc).report();
        // SAFETY: out is non-null and valid per caller contract.
        unsafe { *out = TinyheapMonitor::from_stats(&stats) };
        TinyheapStatus::Ok as i32
    })
}

/// Payload size of the block at `ptr`.
///
/// Returns 0 for a null pointer, an unknown heap, or a pointer that is not
/// a live payload address. A zero-size block cannot be told apart from
/// those cases.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tinyheap_get_size(heap: u64, ptr: *mut u8) -> u32 {
    ffi_guard_or!(0, {
        if ptr.is_null() {
            return 0;
        }
        get_heap(heap)
            .and_then(|arc| {
                let mut heap = arc.lock().ok()?;
                let handle = handle_at(&mut heap, ptr)?;
                Some(heap.get_size(handle) as u32)
            })
            .unwrap_or(0)
    })
}
