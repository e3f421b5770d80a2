//! Heap error types.

use std::error::Error;
use std::fmt;

use crate::config::ConfigError;

/// Errors returned by [`Heap`](crate::Heap) operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// The arena cannot hold even a single block header.
    ArenaTooSmall {
        /// Capacity that was offered, in bytes.
        capacity: usize,
        /// Size of one block header, in bytes.
        header: usize,
    },
    /// No free block is large enough for the request.
    ///
    /// Recoverable: the caller may free memory or run
    /// [`Heap::defragment`](crate::Heap::defragment) and retry.
    OutOfMemory {
        /// Number of payload bytes requested.
        requested: usize,
        /// Largest free payload available at the time of the request.
        largest_free: usize,
    },
    /// The handle does not name the payload of a live block.
    ///
    /// Only cheaply verifiable cases are caught; a double free of a block
    /// that has since been handed out again is indistinguishable from a
    /// legitimate free and is the caller's responsibility.
    InvalidHandle {
        /// Payload offset carried by the rejected handle.
        offset: usize,
    },
    /// The heap configuration failed validation.
    Config(ConfigError),
    /// [`Heap::verify`](crate::Heap::verify) found a broken block chain.
    CorruptChain {
        /// Offset of the first header that failed to check out.
        offset: usize,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArenaTooSmall { capacity, header } => {
                write!(
                    f,
                    "arena too small: {capacity} bytes cannot hold a {header}-byte block header"
                )
            }
            Self::OutOfMemory {
                requested,
                largest_free,
            } => {
                write!(
                    f,
                    "out of memory: requested {requested} bytes, largest free block {largest_free} bytes"
                )
            }
            Self::InvalidHandle { offset } => {
                write!(f, "invalid handle: no live block payload at offset {offset}")
            }
            Self::Config(e) => write!(f, "config: {e}"),
            Self::CorruptChain { offset } => {
                write!(f, "corrupt block chain at offset {offset}")
            }
        }
    }
}

impl Error for HeapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for HeapError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
