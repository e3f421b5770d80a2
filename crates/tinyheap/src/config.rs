//! Heap configuration parameters and validation.

use std::error::Error;
use std::fmt;

use crate::header::HEADER_SIZE;

/// Configuration for a [`Heap`](crate::Heap).
///
/// Validated by [`Heap::init`](crate::Heap::init); immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Number of arena bytes managed, counted from the start of the buffer.
    ///
    /// Must not exceed the buffer length. Bytes past `capacity` are never
    /// touched.
    pub capacity: usize,

    /// Smallest payload a split-off free remainder may have.
    ///
    /// A block is only split when the leftover can hold a header plus at
    /// least this many bytes; otherwise the caller gets the whole block.
    /// Larger values mean fewer, bigger free slivers at the cost of more
    /// internal fragmentation. Default: 16.
    pub min_split_payload: usize,

    /// Fill payloads with [`JUNK_ALLOC`] on allocation and [`JUNK_FREE`]
    /// on release. Debug aid for spotting reads of uninitialised or
    /// released memory. Default: off.
    pub junk_fill: bool,
}

/// Byte pattern written into freshly allocated payloads when
/// [`HeapConfig::junk_fill`] is set.
pub const JUNK_ALLOC: u8 = 0xAA;

/// Byte pattern written into released payloads when
/// [`HeapConfig::junk_fill`] is set.
pub const JUNK_FREE: u8 = 0xBB;

impl HeapConfig {
    /// Default minimum split remainder, in bytes.
    pub const DEFAULT_MIN_SPLIT_PAYLOAD: usize = 16;

    /// Largest capacity whose single spanning block still fits the
    /// header's 32-bit size field.
    pub const MAX_CAPACITY: usize = (u32::MAX as usize).saturating_add(HEADER_SIZE);

    /// Create a config managing `capacity` bytes with default tuning.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            min_split_payload: Self::DEFAULT_MIN_SPLIT_PAYLOAD,
            junk_fill: false,
        }
    }

    /// Set the minimum split remainder.
    pub fn with_min_split_payload(mut self, bytes: usize) -> Self {
        self.min_split_payload = bytes;
        self
    }

    /// Enable or disable junk filling.
    pub fn with_junk_fill(mut self, enabled: bool) -> Self {
        self.junk_fill = enabled;
        self
    }

    /// Check this config against a backing buffer of `buffer_len` bytes.
    ///
    /// Arena-too-small is not a config error: it is reported by
    /// [`Heap::init`](crate::Heap::init) as
    /// [`HeapError::ArenaTooSmall`](crate::HeapError::ArenaTooSmall).
    pub fn validate(&self, buffer_len: usize) -> Result<(), ConfigError> {
        if self.capacity > buffer_len {
            return Err(ConfigError::CapacityExceedsBuffer {
                capacity: self.capacity,
                buffer_len,
            });
        }
        if self.capacity > Self::MAX_CAPACITY {
            return Err(ConfigError::CapacityTooLarge {
                capacity: self.capacity,
                max: Self::MAX_CAPACITY,
            });
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Errors detected by [`HeapConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `capacity` is larger than the buffer handed to the heap.
    CapacityExceedsBuffer {
        /// Configured capacity.
        capacity: usize,
        /// Actual buffer length.
        buffer_len: usize,
    },
    /// `capacity` cannot be described by a block header.
    CapacityTooLarge {
        /// Configured capacity.
        capacity: usize,
        /// Largest supported capacity.
        max: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceedsBuffer {
                capacity,
                buffer_len,
            } => write!(
                f,
                "capacity {capacity} exceeds buffer length {buffer_len}"
            ),
            Self::CapacityTooLarge { capacity, max } => {
                write!(f, "capacity {capacity} exceeds maximum of {max}")
            }
        }
    }
}

impl Error for ConfigError {}
