//! DLT standard and extended header parsing
//!
//! Layout of the standard header (always big endian):
//!
//! ```text
//! byte 0     header type: UEH(0x01) MSBF(0x02) WEID(0x04) WSID(0x08) WTMS(0x10) VERS(bits 5-7)
//! byte 1     message counter
//! bytes 2-3  length of the frame including this header
//! [4 bytes]  ECU id       (WEID)
//! [4 bytes]  session id   (WSID)
//! [4 bytes]  timestamp    (WTMS, 0.1ms ticks)
//! ```
//!
//! The optional extended header (UEH) follows with message info, number of
//! arguments, application id and context id.

use byteorder::{BigEndian, ByteOrder};

/// Size of the fixed part of the standard header
pub const STANDARD_HEADER_SIZE: usize = 4;
/// Size of the extended header
pub const EXTENDED_HEADER_SIZE: usize = 10;
/// Size of the storage header preceding each frame in a DLT file
pub const STORAGE_HEADER_SIZE: usize = 16;
/// Largest storage header supported by any transport
pub const MAX_STORAGE_HEADER_SIZE: usize = STORAGE_HEADER_SIZE;
/// Largest frame the 16-bit length field can describe
pub const MAX_PACKET_SIZE: usize = u16::MAX as usize;

pub const HTYP_USE_EXTENDED_HEADER: u8 = 0x01;
pub const HTYP_MSB_FIRST: u8 = 0x02;
pub const HTYP_WITH_ECU_ID: u8 = 0x04;
pub const HTYP_WITH_SESSION_ID: u8 = 0x08;
pub const HTYP_WITH_TIMESTAMP: u8 = 0x10;
pub const HTYP_VERSION_MASK: u8 = 0xE0;
pub const HTYP_VERSION_SHIFT: u8 = 5;
/// Only protocol version 1 is supported
pub const HTYP_VERSION_1: u8 = 0x20;

pub const MSIN_VERBOSE: u8 = 0x01;
/// MSTP and MTIN together
pub const MSIN_TYPE_INFO_MASK: u8 = 0xFE;
pub const MSIN_MESSAGE_TYPE_MASK: u8 = 0x0E;
pub const MSIN_MESSAGE_TYPE_CONTROL: u8 = 0x06;

/// Device time stamps count in units of 0.1ms
pub const DEVICE_TIME_RESOLUTION_US: u64 = 100;

/// Why a standard header was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("Packet version {found} found, expected 1")]
    UnsupportedVersion { found: u8 },

    #[error("Packet with length {length} found, expected minimum {minimum}")]
    LengthTooShort { length: usize, minimum: usize },

    #[error("Standard header truncated: {0} bytes available")]
    Truncated(usize),
}

/// The parsed standard header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardHeader {
    pub version: u8,
    pub has_ecu_id: bool,
    pub has_session_id: bool,
    pub has_timestamp: bool,
    pub use_extended_header: bool,
    pub most_significant_byte_first: bool,
    pub message_counter: u8,
    pub declared_length: u16,
}

impl StandardHeader {
    /// Parse the first four bytes of a standard header, without validation
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < STANDARD_HEADER_SIZE {
            return Err(HeaderError::Truncated(buf.len()));
        }
        let htyp = buf[0];
        Ok(StandardHeader {
            version: (htyp & HTYP_VERSION_MASK) >> HTYP_VERSION_SHIFT,
            has_ecu_id: htyp & HTYP_WITH_ECU_ID != 0,
            has_session_id: htyp & HTYP_WITH_SESSION_ID != 0,
            has_timestamp: htyp & HTYP_WITH_TIMESTAMP != 0,
            use_extended_header: htyp & HTYP_USE_EXTENDED_HEADER != 0,
            most_significant_byte_first: htyp & HTYP_MSB_FIRST != 0,
            message_counter: buf[1],
            declared_length: BigEndian::read_u16(&buf[2..4]),
        })
    }

    /// Structural minimum of the declared length for the flags present
    pub fn minimum_length(&self) -> usize {
        let mut length = STANDARD_HEADER_SIZE;
        if self.has_ecu_id {
            length += 4;
        }
        if self.has_session_id {
            length += 4;
        }
        if self.has_timestamp {
            length += 4;
        }
        if self.use_extended_header {
            length += EXTENDED_HEADER_SIZE;
        }
        length
    }
}

/// The parsed extended header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub verbose: bool,
    /// MSTP field (bits 1-3 of the message info)
    pub message_type: u8,
    /// MTIN field (bits 4-7 of the message info)
    pub message_type_info: u8,
    pub number_of_args: u8,
    pub application_id: [u8; 4],
    pub context_id: [u8; 4],
}

impl ExtendedHeader {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < EXTENDED_HEADER_SIZE {
            return None;
        }
        let msin = buf[0];
        Some(ExtendedHeader {
            verbose: msin & MSIN_VERBOSE != 0,
            message_type: (msin & MSIN_MESSAGE_TYPE_MASK) >> 1,
            message_type_info: msin >> 4,
            number_of_args: buf[1],
            application_id: [buf[2], buf[3], buf[4], buf[5]],
            context_id: [buf[6], buf[7], buf[8], buf[9]],
        })
    }

    /// Message info byte without the verbose bit
    pub fn type_info(&self) -> u8 {
        (self.message_type << 1) | (self.message_type_info << 4)
    }

    pub fn is_control(&self) -> bool {
        self.message_type << 1 == MSIN_MESSAGE_TYPE_CONTROL
    }
}

/// Validate a standard header and return the declared frame length
///
/// Checks the protocol version and that the declared length covers every
/// optional field the header type announces. Neither the extended header nor
/// the payload is read.
pub fn validate_standard_header(buf: &[u8]) -> Result<usize, HeaderError> {
    let header = StandardHeader::parse(buf)?;
    if buf[0] & HTYP_VERSION_MASK != HTYP_VERSION_1 {
        return Err(HeaderError::UnsupportedVersion {
            found: header.version,
        });
    }

    let minimum = header.minimum_length();
    let length = header.declared_length as usize;
    if length < minimum {
        return Err(HeaderError::LengthTooShort { length, minimum });
    }
    Ok(length)
}
