//! Transport framing around DLT packets
//!
//! A DLT packet is the standard header plus everything after it. Depending on
//! where the bytes come from, each packet may carry a prefix:
//!
//! - storage files: a 16 byte storage header (`DLT\x01`, time stamp, ECU id)
//! - serial links: the 4 byte `DLS\x01` sync pattern
//! - network captures: nothing

use crate::builder::LineBuilder;
use crate::header::STORAGE_HEADER_SIZE;
use crate::scanner::{
    FrameScanner, IdentityScanner, MarkerScanner, ScanResult, SERIAL_MARKER, STORAGE_MARKER,
};
use crate::types::Timestamp;
use byteorder::{ByteOrder, LittleEndian};
use chrono::Utc;

/// Framing strategy used by the stream decoder
pub trait Transport {
    /// Locate the next frame start, see [`FrameScanner`]
    fn scan(&self, buffer: &[u8]) -> ScanResult;

    /// Bytes between the frame start and the standard header
    fn header_offset(&self) -> usize;

    /// Bytes discarded when a frame at the current position turns out to be invalid
    fn minimum_discard(&self) -> usize;

    /// Parse the `header_offset` bytes in front of the standard header
    ///
    /// Returns `false` if the prefix is not acceptable, in which case the frame
    /// is discarded.
    fn parse_prefix(&self, prefix: &[u8], builder: &mut dyn LineBuilder) -> bool;

    /// Short name for diagnostics
    fn name(&self) -> &'static str;
}

/// DLT files as written by loggers: every packet has a storage header
#[derive(Debug, Clone, Copy)]
pub struct StorageTransport {
    scanner: MarkerScanner,
}

impl StorageTransport {
    pub fn new() -> Self {
        Self {
            scanner: MarkerScanner::new(STORAGE_MARKER),
        }
    }
}

impl Default for StorageTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for StorageTransport {
    fn scan(&self, buffer: &[u8]) -> ScanResult {
        self.scanner.scan(buffer)
    }

    fn header_offset(&self) -> usize {
        STORAGE_HEADER_SIZE
    }

    fn minimum_discard(&self) -> usize {
        STORAGE_MARKER.len()
    }

    fn parse_prefix(&self, prefix: &[u8], builder: &mut dyn LineBuilder) -> bool {
        if prefix.len() < STORAGE_HEADER_SIZE {
            return false;
        }
        let seconds = LittleEndian::read_u32(&prefix[4..8]);
        let microseconds = LittleEndian::read_u32(&prefix[8..12]);
        if microseconds >= 1_000_000 {
            log::trace!(
                "Storage header microseconds {} carried into seconds {}",
                microseconds,
                seconds
            );
        }
        builder.set_timestamp(crate::builder::storage_timestamp(seconds, microseconds));
        builder.set_storage_ecu_id([prefix[12], prefix[13], prefix[14], prefix[15]]);
        true
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Serial links: packets are preceded by the `DLS\x01` pattern
#[derive(Debug, Clone, Copy)]
pub struct SerialTransport {
    scanner: MarkerScanner,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self {
            scanner: MarkerScanner::new(SERIAL_MARKER),
        }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialTransport {
    fn scan(&self, buffer: &[u8]) -> ScanResult {
        self.scanner.scan(buffer)
    }

    fn header_offset(&self) -> usize {
        SERIAL_MARKER.len()
    }

    fn minimum_discard(&self) -> usize {
        SERIAL_MARKER.len()
    }

    fn parse_prefix(&self, _prefix: &[u8], _builder: &mut dyn LineBuilder) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

/// Raw packets back to back, e.g. a TCP stream
///
/// In online mode every record is stamped with the time it was decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkTransport {
    online: bool,
}

impl NetworkTransport {
    pub fn new(online: bool) -> Self {
        Self { online }
    }

    fn receive_time(&self) -> Option<Timestamp> {
        self.online.then(Utc::now)
    }
}

impl Transport for NetworkTransport {
    fn scan(&self, buffer: &[u8]) -> ScanResult {
        IdentityScanner.scan(buffer)
    }

    fn header_offset(&self) -> usize {
        0
    }

    fn minimum_discard(&self) -> usize {
        1
    }

    fn parse_prefix(&self, _prefix: &[u8], builder: &mut dyn LineBuilder) -> bool {
        if let Some(now) = self.receive_time() {
            builder.set_timestamp(now);
        }
        true
    }

    fn name(&self) -> &'static str {
        "network"
    }
}
