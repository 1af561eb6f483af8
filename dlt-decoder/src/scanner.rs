//! Frame start detection
//!
//! Storage files and serial links prefix every frame with a 4 byte marker, raw
//! network captures have none. Scanners report where the next frame starts and
//! how many bytes in front of it can be dropped.

/// Outcome of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    /// A frame starts at offset `skip`
    pub found: bool,
    /// Bytes that can be discarded. When nothing was found this keeps a
    /// possible partial marker at the end of the buffer.
    pub skip: usize,
}

impl ScanResult {
    pub fn found(skip: usize) -> Self {
        Self { found: true, skip }
    }

    pub fn missing(skip: usize) -> Self {
        Self { found: false, skip }
    }
}

/// Locates the start of the next frame in a buffer
pub trait FrameScanner {
    fn scan(&self, buffer: &[u8]) -> ScanResult;
}

/// Scans for a fixed marker with no repeated bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerScanner {
    marker: [u8; 4],
}

/// `DLT\x01`, the storage header pattern of DLT files
pub const STORAGE_MARKER: [u8; 4] = *b"DLT\x01";
/// `DLS\x01`, the serial header pattern
pub const SERIAL_MARKER: [u8; 4] = *b"DLS\x01";

impl MarkerScanner {
    pub const fn new(marker: [u8; 4]) -> Self {
        Self { marker }
    }
}

impl FrameScanner for MarkerScanner {
    fn scan(&self, buffer: &[u8]) -> ScanResult {
        let marker = &self.marker;
        let len = marker.len();
        if buffer.len() < len {
            return ScanResult::missing(0);
        }

        // Compare backwards from the last marker byte. The marker has no repeated
        // bytes, so after `matched` equal bytes the next candidate is `matched + 1`
        // bytes further.
        let mut start = 0;
        while start + len <= buffer.len() {
            let mut matched = 0;
            while matched < len && buffer[start + len - 1 - matched] == marker[len - 1 - matched] {
                matched += 1;
            }
            if matched == len {
                return ScanResult::found(start);
            }
            start += matched + 1;
        }

        // Keep a partial marker at the tail, e.g. "xxxxxDLT"
        let mut partial = 0;
        for &byte in &buffer[buffer.len() - (len - 1)..] {
            if byte == marker[partial] {
                partial += 1;
            } else if byte == marker[0] {
                partial = 1;
            } else {
                partial = 0;
            }
        }
        ScanResult::missing(buffer.len() - partial)
    }
}

/// Every position is a frame start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityScanner;

impl FrameScanner for IdentityScanner {
    fn scan(&self, _buffer: &[u8]) -> ScanResult {
        ScanResult::found(0)
    }
}
