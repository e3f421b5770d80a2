//! Allocation handles.
//!
//! A [`Handle`] is the byte offset of a block's payload inside the arena.
//! The block header sits exactly [`HEADER_SIZE`] bytes before it, so the
//! header is recovered by subtraction; the heap validates that arithmetic
//! on every call instead of trusting it.

use std::fmt;

use crate::header::HEADER_SIZE;

/// Opaque reference to an allocated block's payload.
///
/// Handles are plain offsets: they carry no lifetime and no generation.
/// Holding a handle past [`Heap::free`](crate::Heap::free) or
/// [`Heap::reset`](crate::Heap::reset) is a caller error that the heap
/// detects only when cheaply possible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct Handle {
    offset: usize,
}

impl Handle {
    pub(crate) fn from_header(header_offset: usize) -> Self {
        Self {
            offset: header_offset + HEADER_SIZE,
        }
    }

    /// Rebuild a handle from a raw payload offset.
    ///
    /// Used at boundaries where handles travel as integers or pointers.
    /// The heap validates the offset before acting on it.
    pub fn from_offset(offset: usize) -> Self {
        Self { offset }
    }

    /// Byte offset of the payload from the start of the arena.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset of the block header, if the handle is not below the first
    /// possible payload.
    pub(crate) fn header_offset(&self) -> Option<usize> {
        self.offset.checked_sub(HEADER_SIZE)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(+{})", self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_one_header_before_payload() {
        let h = Handle::from_header(32);
        assert_eq!(h.offset(), 32 + HEADER_SIZE);
        assert_eq!(h.header_offset(), Some(32));
    }

    #[test]
    fn offset_below_first_payload_has_no_header() {
        assert_eq!(Handle::from_offset(HEADER_SIZE - 1).header_offset(), None);
        assert_eq!(Handle::from_offset(HEADER_SIZE).header_offset(), Some(0));
    }

    #[test]
    fn display_shows_offset() {
        assert_eq!(Handle::from_offset(24).to_string(), "Handle(+24)");
    }
}
