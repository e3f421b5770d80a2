//! C ABI for the tinyheap heap manager.
//!
//! Mirrors the classic `init / alloc / free / realloc / defrag / monitor /
//! get_size` surface. Heap instances are referenced by `u64` slot+generation
//! handles, so a destroyed or never-created instance is reported as
//! `TINYHEAP_STATUS_INVALID_HANDLE` rather than dereferenced. Allocations
//! cross the boundary as real payload addresses inside the caller's buffer.
//!
//! Every exported function catches panics and reports them as
//! `TINYHEAP_STATUS_PANICKED`. This is the only crate in the workspace that
//! contains `unsafe` code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run `$body` (which evaluates to an `i32` status) with panics converted
/// to [`TinyheapStatus::Panicked`](crate::status::TinyheapStatus::Panicked).
macro_rules! ffi_guard {
    ($body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| -> i32 { $body })) {
            Ok(status) => status,
            Err(_) => $crate::status::TinyheapStatus::Panicked as i32,
        }
    };
}

/// Like `ffi_guard!` for functions that return a plain value, using
/// `$fallback` if the body panics.
macro_rules! ffi_guard_or {
    ($fallback:expr, $body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(value) => value,
            Err(_) => $fallback,
        }
    };
}

/// Lock a mutex inside an `ffi_guard!` body, returning
/// `InternalError` from the body if the lock is poisoned.
macro_rules! ffi_lock {
    ($mutex:expr) => {
        match $mutex.lock() {
            Ok(guard) => guard,
            Err(_) => return $crate::status::TinyheapStatus::InternalError as i32,
        }
    };
}

mod arena;
mod handle;
pub mod heap;
pub mod status;

pub use heap::{
    tinyheap_alloc, tinyheap_defrag, tinyheap_destroy, tinyheap_free, tinyheap_get_size,
    tinyheap_init, tinyheap_monitor, tinyheap_realloc, TinyheapMonitor,
};
pub use status::TinyheapStatus;
