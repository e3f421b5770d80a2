//! In-band block header protocol.
//!
//! Every block starts with an 8-byte header followed by its payload:
//!
//! ```text
//! offset  0        4       5       6          8
//!         ┌────────┬───────┬───────┬──────────┬──────────────────────┐
//!         │ size   │ flags │ tag   │ check    │ payload (size bytes) │
//!         │ u32 LE │ u8    │ 0xB7  │ u16 LE   │                      │
//!         └────────┴───────┴───────┴──────────┴──────────────────────┘
//!                                             ▲
//!                                             └── handle offset
//! ```
//!
//! The next block starts at `offset + HEADER_SIZE + size`; there are no
//! stored links. The tag byte and check word let the heap reject most
//! offsets that do not point at a real header without walking the chain.
//! The check word also covers the header's own offset, so header bytes
//! copied into a payload do not decode anywhere but where they were
//! written.

/// Size of a block header in bytes. Fixed per build.
pub const HEADER_SIZE: usize = 8;

/// Alignment of every block start, and the granularity of carved sizes.
pub const ALIGN: usize = 8;

const TAG: u8 = 0xB7;
const FLAG_USED: u8 = 0b0000_0001;
const CHECK_SEED: u16 = 0x5A3C;
// Odd, so multiplication is a bijection on u16: block starts less than
// 512 KiB apart never share a position term.
const POSITION_MUL: u16 = 0x9E37;

/// Round `n` up to the next multiple of [`ALIGN`].
///
/// Returns `None` on overflow.
pub(crate) fn align_up(n: usize) -> Option<usize> {
    n.checked_add(ALIGN - 1).map(|v| v & !(ALIGN - 1))
}

/// Decoded form of a block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    /// Payload bytes following the header.
    pub size: u32,
    /// Whether the payload is currently handed out.
    pub used: bool,
}

impl BlockHeader {
    pub fn free(size: u32) -> Self {
        Self { size, used: false }
    }

    pub fn used(size: u32) -> Self {
        Self { size, used: true }
    }

    pub fn payload_len(&self) -> usize {
        self.size as usize
    }

    fn flags(&self) -> u8 {
        if self.used {
            FLAG_USED
        } else {
            0
        }
    }

    fn check(size: u32, flags: u8, at: usize) -> u16 {
        let folded = (size as u16) ^ ((size >> 16) as u16);
        let position = ((at / ALIGN) as u16).wrapping_mul(POSITION_MUL);
        folded.rotate_left(5) ^ ((flags as u16) << 8) ^ position ^ CHECK_SEED
    }

    /// Encode for storage at arena offset `at`.
    pub fn encode(&self, at: usize) -> [u8; HEADER_SIZE] {
        let flags = self.flags();
        let size = self.size.to_le_bytes();
        let check = Self::check(self.size, flags, at).to_le_bytes();
        [
            size[0], size[1], size[2], size[3], flags, TAG, check[0], check[1],
        ]
    }

    /// Decode the first [`HEADER_SIZE`] bytes of `bytes`, read from arena
    /// offset `at`.
    ///
    /// Returns `None` if fewer bytes are given or the bytes do not form a
    /// well-tagged header written at `at`.
    pub fn decode(bytes: &[u8], at: usize) -> Option<Self> {
        let raw: &[u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
        let size = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let flags = raw[4];
        if raw[5] != TAG || flags & !FLAG_USED != 0 {
            return None;
        }
        let check = u16::from_le_bytes([raw[6], raw[7]]);
        if check != Self::check(size, flags, at) {
            return None;
        }
        Some(Self {
            size,
            used: flags & FLAG_USED != 0,
        })
    }
}
