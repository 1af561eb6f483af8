//! Payload decoders
//!
//! The stream decoder hands everything after the headers to one of three
//! decoders, chosen from the extended header:
//!
//! - control messages (MSTP = control) go to [`ControlDecoder`]
//! - verbose messages go to [`VerboseDecoder`]
//! - everything else goes to the non-verbose decoder, with
//!   [`NonVerboseByteDecoder`] as the fallback
//!
//! A decoder returns how many payload bytes it understood. The stream decoder
//! compares this against the length declared in the standard header.

mod control;
mod non_verbose;
mod verbose;

pub use control::{service_name, ControlDecoder};
pub use non_verbose::NonVerboseByteDecoder;
pub use verbose::VerboseDecoder;

use crate::builder::LineBuilder;
use crate::types::{DecoderError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Decodes one payload region into the line builder
pub trait PayloadDecoder {
    /// Decode `payload`, returning the number of bytes consumed
    ///
    /// On failure the reason is also stored with
    /// [`LineBuilder::set_error_message`].
    fn decode(&mut self, payload: &[u8], builder: &mut dyn LineBuilder) -> Result<usize>;
}

/// Record a payload error on the builder and return it
pub(crate) fn payload_error<T>(builder: &mut dyn LineBuilder, message: String) -> Result<T> {
    builder.set_error_message(message.clone());
    Err(DecoderError::Payload(message))
}

pub(crate) fn read_u16(buf: &[u8], big_endian: bool) -> u16 {
    if big_endian {
        BigEndian::read_u16(buf)
    } else {
        LittleEndian::read_u16(buf)
    }
}

pub(crate) fn read_u32(buf: &[u8], big_endian: bool) -> u32 {
    if big_endian {
        BigEndian::read_u32(buf)
    } else {
        LittleEndian::read_u32(buf)
    }
}

pub(crate) fn read_u64(buf: &[u8], big_endian: bool) -> u64 {
    if big_endian {
        BigEndian::read_u64(buf)
    } else {
        LittleEndian::read_u64(buf)
    }
}
