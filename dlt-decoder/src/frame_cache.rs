//! Byte cache for frames that straddle input chunks

use crate::header::{MAX_PACKET_SIZE, MAX_STORAGE_HEADER_SIZE};
use crate::types::{DecoderError, Result};

/// Fixed-capacity buffer holding the bytes of an incomplete frame
///
/// The buffer is allocated once and reused. Consuming from the front only
/// advances the start offset; pending bytes are moved back to offset 0 when an
/// append would otherwise run past the end.
#[derive(Debug, Clone)]
pub struct FrameCache {
    buffer: Vec<u8>,
    start: usize,
    length: usize,
    locked: bool,
}

impl FrameCache {
    /// Create a cache able to hold two frames of up to `max_frame` bytes each
    pub fn new(max_frame: usize) -> Self {
        Self {
            buffer: vec![0; max_frame * 2],
            start: 0,
            length: 0,
            locked: false,
        }
    }

    /// Create a cache sized for the largest DLT frame including a storage header
    pub fn for_dlt() -> Self {
        Self::new(MAX_STORAGE_HEADER_SIZE + MAX_PACKET_SIZE)
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Pending bytes
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[self.start..self.start + self.length]
    }

    /// Add bytes behind the pending data
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if self.locked {
            return Err(DecoderError::CacheLocked);
        }
        if data.is_empty() {
            return Ok(());
        }

        let requested = self.length + data.len();
        if requested > self.buffer.len() {
            return Err(DecoderError::CacheOverflow {
                requested,
                capacity: self.buffer.len(),
            });
        }

        if self.start + requested > self.buffer.len() {
            self.buffer
                .copy_within(self.start..self.start + self.length, 0);
            self.start = 0;
        }

        let end = self.start + self.length;
        self.buffer[end..end + data.len()].copy_from_slice(data);
        self.length = requested;
        Ok(())
    }

    /// Drop up to `count` bytes from the front, returning how many were removed
    pub fn consume(&mut self, count: usize) -> usize {
        if self.locked {
            debug_assert!(false, "Consuming from a locked frame cache");
            return 0;
        }

        let count = count.min(self.length);
        self.length -= count;
        if self.length == 0 {
            self.start = 0;
        } else {
            self.start += count;
        }
        count
    }

    /// Return all pending bytes and lock the cache until the next [`clear`](Self::clear)
    pub fn flush(&mut self) -> &[u8] {
        self.locked = true;
        self.bytes()
    }

    /// Empty the cache and release the lock
    pub fn clear(&mut self) {
        self.start = 0;
        self.length = 0;
        self.locked = false;
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::for_dlt()
    }
}
