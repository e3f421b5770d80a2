//! Caller-owned arena storage.
//!
//! The C side keeps ownership of the buffer; the heap only borrows it
//! between `tinyheap_init` and `tinyheap_destroy`. [`RawArena`] presents
//! that borrow to the engine as byte storage, building a fresh slice on
//! every access instead of holding one across calls.

use std::ptr::NonNull;
use std::slice;

use tinyheap::ALIGN;

pub(crate) struct RawArena {
    ptr: NonNull<u8>,
    len: usize,
}

impl RawArena {
    /// Returns `None` for a null or misaligned pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes, and no
    /// other Rust reference to that memory may exist, until the returned
    /// value is dropped.
    #[allow(unsafe_code)]
    pub unsafe fn new(ptr: *mut u8, len: usize) -> Option<Self> {
        let ptr = NonNull::new(ptr)?;
        if ptr.as_ptr() as usize % ALIGN != 0 {
            return None;
        }
        Some(Self { ptr, len })
    }
}

// SAFETY: the buffer is owned exclusively by the heap instance while it
// exists, and every access goes through that instance's mutex.
#[allow(unsafe_code)]
unsafe impl Send for RawArena {}

impl AsRef<[u8]> for RawArena {
    #[allow(unsafe_code)]
    fn as_ref(&self) -> &[u8] {
        // SAFETY: upheld by the contract of `RawArena::new`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl AsMut<[u8]> for RawArena {
    #[allow(unsafe_code)]
    fn as_mut(&mut self) -> &mut [u8] {
        // SAFETY: upheld by the contract of `RawArena::new`; `&mut self`
        // guarantees this is the only slice alive.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}
