//! Coalescing pass over the block chain.

use tracing::debug;

use crate::arena::next_block;
use crate::header::{BlockHeader, HEADER_SIZE};
use crate::heap::Heap;

impl<S> Heap<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Merge every run of adjacent free blocks into one block.
    ///
    /// A single linear pass: each free block swallows the free blocks that
    /// directly follow it, and their headers are destroyed. Used blocks
    /// never move, so every live handle stays valid.
    ///
    /// Returns the number of headers absorbed. A second call immediately
    /// after returns `0`.
    pub fn defragment(&mut self) -> usize {
        let capacity = self.arena.capacity();
        let mut absorbed = 0;
        let mut at = 0;

        while at < capacity {
            let Some(header) = self.arena.read_header(at) else {
                break;
            };
            if header.used {
                at = next_block(at, header);
                continue;
            }

            let mut merged = header.payload_len();
            let mut next = next_block(at, header);
            while next < capacity {
                match self.arena.read_header(next) {
                    Some(follower) if !follower.used => {
                        let after = next_block(next, follower);
                        self.arena.scrub_header(next);
                        merged += HEADER_SIZE + follower.payload_len();
                        absorbed += 1;
                        next = after;
                    }
                    _ => break,
                }
            }
            if merged != header.payload_len() {
                self.arena
                    .write_header(at, BlockHeader::free(merged as u32));
            }
            at = next;
        }

        debug!(absorbed, "defragmented heap");
        absorbed
    }
}
