//! C-compatible status codes.
//!
//! [`TinyheapStatus`] is returned by every status-returning C function.
//! `Ok` is zero; every failure is negative. Values are ABI-stable.

use tinyheap::HeapError;

/// Status code returned by the C API.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TinyheapStatus {
    /// Success.
    Ok = 0,
    /// Heap instance handle or allocation pointer not recognised.
    InvalidHandle = -1,
    /// No free block large enough for the request.
    OutOfMemory = -2,
    /// Buffer cannot hold even one block header.
    ArenaTooSmall = -3,
    /// Heap configuration rejected.
    ConfigError = -4,
    /// An argument is null, misaligned, or otherwise unusable.
    InvalidArgument = -5,
    /// Internal error (e.g. poisoned mutex after a prior panic).
    InternalError = -6,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&HeapError> for TinyheapStatus {
    fn from(e: &HeapError) -> Self {
        match e {
            HeapError::ArenaTooSmall { .. } => TinyheapStatus::ArenaTooSmall,
            HeapError::OutOfMemory { .. } => TinyheapStatus::OutOfMemory,
            HeapError::InvalidHandle { .. } => TinyheapStatus::InvalidHandle,
            HeapError::Config(_) => TinyheapStatus::ConfigError,
            HeapError::CorruptChain { .. } => TinyheapStatus::InternalError,
        }
    }
}
