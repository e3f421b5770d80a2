//! First-fit heap manager over a single fixed-size byte arena.
//!
//! The caller hands over one pre-sized buffer; every block carved from it
//! carries an 8-byte in-band header, so the heap itself never allocates.
//! Blocks are found by a linear first-fit scan, oversized blocks are split,
//! and free neighbours are only merged when [`Heap::defragment`] runs.
//!
//! ```text
//! [hdr|payload ....][hdr|payload ..][hdr|free ..........]
//! 0                                                   capacity
//! ```
//!
//! # Example
//!
//! ```
//! use tinyheap::Heap;
//!
//! let mut heap = Heap::new(vec![0u8; 1024])?;
//! let a = heap.allocate(100)?;
//! heap.payload_mut(a)?[..5].copy_from_slice(b"hello");
//!
//! let a = heap.reallocate(a, 300)?;
//! assert_eq!(&heap.payload(a)?[..5], b"hello");
//!
//! heap.free(a)?;
//! heap.defragment();
//! assert_eq!(heap.report().free_blocks, 1);
//! # Ok::<(), tinyheap::HeapError>(())
//! ```
//!
//! # Handles
//!
//! A [`Handle`] is the payload's offset into the arena. The heap validates
//! every handle it is given (alignment, header tag and check word, in-use
//! flag) and answers [`HeapError::InvalidHandle`] when it cannot vouch for
//! it. Detection is best effort: a stale handle whose address was handed
//! out again is indistinguishable from the new owner's.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod alloc;
pub mod arena;
pub mod config;
mod defrag;
pub mod error;
pub mod handle;
pub mod header;
pub mod heap;
pub mod monitor;
mod reclaim;

// Public re-exports for the primary API surface.
pub use arena::{BlockInfo, Blocks};
pub use config::{ConfigError, HeapConfig, JUNK_ALLOC, JUNK_FREE};
pub use error::HeapError;
pub use handle::Handle;
pub use header::{ALIGN, HEADER_SIZE};
pub use heap::Heap;
pub use monitor::HeapStats;
