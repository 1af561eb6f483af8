//! Stream position bookkeeping for buffered bytes
//!
//! The stream decoder receives chunks that do not line up with frames, and
//! keeps the unparsed tail of a chunk around until the next call. The
//! [`PositionMap`] remembers which absolute stream offset every pending byte came
//! from, so records report the offset in the original stream even when their
//! bytes were served from the internal cache.

use crate::types::{DecoderError, Result};

const DEFAULT_CAPACITY: usize = 32;
const MAX_CAPACITY: usize = 1 << 31;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PosBlock {
    /// Stream position of the first byte in this block
    position: i64,
    /// Number of contiguous bytes
    length: usize,
}

/// Circular FIFO of (position, length) blocks
///
/// Appending a block that continues where the previous one ended merges the
/// two, so a stream fed in order only ever holds a single entry.
#[derive(Debug, Clone)]
pub struct PositionMap {
    blocks: Vec<PosBlock>,
    count: usize,
    head: usize,
    tail: usize,
    mask: usize,
    end_position: i64,
}

impl PositionMap {
    /// Create a position map with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a position map; `capacity` is rounded up to a power of two (minimum 2)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(2, MAX_CAPACITY).next_power_of_two();
        Self {
            blocks: vec![PosBlock::default(); capacity],
            count: 0,
            head: 0,
            tail: 0,
            mask: capacity - 1,
            end_position: 0,
        }
    }

    /// Position of the oldest pending byte, or the next expected position if empty
    pub fn current_position(&self) -> i64 {
        if self.count == 0 {
            self.end_position
        } else {
            self.blocks[self.head].position
        }
    }

    /// Total number of bytes described by the map
    pub fn len(&self) -> usize {
        (0..self.count)
            .map(|i| self.blocks[(self.head + i) & self.mask].length)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of blocks currently held
    pub fn blocks(&self) -> usize {
        self.count
    }

    /// Number of blocks that fit before the next reallocation
    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Record `length` bytes starting at stream `position`
    pub fn append(&mut self, position: i64, length: usize) -> Result<()> {
        if length == 0 {
            return Ok(());
        }

        if self.count == 0 {
            self.count = 1;
            self.head = 0;
            self.tail = 0;
        } else if position == self.end_position {
            self.blocks[self.tail].length += length;
            self.end_position += length as i64;
            return Ok(());
        } else {
            if self.count == self.blocks.len() {
                self.grow()?;
            }
            self.count += 1;
            self.tail = (self.tail + 1) & self.mask;
        }

        self.blocks[self.tail] = PosBlock { position, length };
        self.end_position = position + length as i64;
        Ok(())
    }

    fn grow(&mut self) -> Result<()> {
        let capacity = self.blocks.len();
        if capacity >= MAX_CAPACITY {
            return Err(DecoderError::PositionMapOverflow(capacity));
        }

        // Unwrap the ring so the head lands at index 0
        let mut blocks = Vec::with_capacity(capacity * 2);
        blocks.extend_from_slice(&self.blocks[self.head..]);
        blocks.extend_from_slice(&self.blocks[..self.head]);
        blocks.resize(capacity * 2, PosBlock::default());

        log::trace!("Position map grown to {} blocks", capacity * 2);
        self.blocks = blocks;
        self.mask = capacity * 2 - 1;
        self.head = 0;
        self.tail = self.count - 1;
        Ok(())
    }

    /// Remove `length` bytes from the front, oldest blocks first
    pub fn consume(&mut self, length: usize) {
        let mut remaining = length;
        while remaining > 0 {
            if self.count == 0 {
                debug_assert!(
                    false,
                    "Consuming more data {} than available {}",
                    length,
                    length - remaining
                );
                return;
            }

            let head = &mut self.blocks[self.head];
            if head.length <= remaining {
                remaining -= head.length;
                self.count -= 1;
                self.head = (self.head + 1) & self.mask;
            } else {
                head.length -= remaining;
                head.position += remaining as i64;
                return;
            }
        }
    }

    /// Drop every block; the next expected position is kept
    pub fn clear(&mut self) {
        self.count = 0;
        self.head = 0;
        self.tail = 0;
    }
}

impl Default for PositionMap {
    fn default() -> Self {
        Self::new()
    }
}
