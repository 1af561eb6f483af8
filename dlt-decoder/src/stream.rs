//! Streaming frame decoder
//!
//! [`DecodeStream`] accepts arbitrary chunks of a DLT byte stream and returns
//! the records that became complete with each chunk. Bytes of a frame that
//! straddles two chunks are kept in a [`FrameCache`], and a [`PositionMap`]
//! remembers where each pending byte came from so every record reports its
//! offset in the original stream.
//!
//! Corrupted input never produces an error. Bytes that cannot be decoded are
//! reported as [`TraceRecord::Skipped`] and the decoder resynchronizes:
//!
//! - no frame start found: skip up to the next candidate
//! - invalid standard header: skip the transport's minimum discard
//! - payload cannot be decoded: skip the minimum discard and rescan
//!
//! Errors are only returned when an internal resource is exhausted.

use crate::builder::{DltLineBuilder, LineBuilder};
use crate::frame_cache::FrameCache;
use crate::header::{
    validate_standard_header, ExtendedHeader, HeaderError, StandardHeader,
    DEVICE_TIME_RESOLUTION_US, EXTENDED_HEADER_SIZE, STANDARD_HEADER_SIZE,
};
use crate::payload::{ControlDecoder, NonVerboseByteDecoder, PayloadDecoder, VerboseDecoder};
use crate::position_map::PositionMap;
use crate::transport::{NetworkTransport, SerialTransport, StorageTransport, Transport};
use crate::types::{DecoderError, DltType, Result, TraceRecord};
use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Control payloads may be shorter than the declared length by this much
const CONTROL_PADDING_TOLERANCE: usize = 32;

const REASON_SEARCHING: &str = "Searching for next packet";
const REASON_INVALID_HEADER: &str = "Invalid packet standard header";
const REASON_INVALID_PACKET: &str = "Invalid packet";
const REASON_INCOMPLETE: &str = "Incomplete packet at end of stream";
const REASON_END_OF_STREAM: &str = "End of stream";

/// Counters over everything a stream has emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Stream bytes handed to the decoder
    pub bytes: u64,
    /// Decoded lines
    pub lines: u64,
    /// Skipped records
    pub skipped_records: u64,
    /// Bytes covered by skipped records
    pub skipped_bytes: u64,
}

/// Kinds of recoverable problems, each logged at warn level once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Diagnostic {
    InvalidHeader,
    InvalidPrefix,
    VerbosePayload,
    VerboseWithoutPayload,
    NonVerbosePayload,
    NonVerboseFallback,
    ControlPayload,
    IncompletePacket,
    EndOfStream,
}

#[derive(Debug, Default)]
struct Diagnostics {
    reported: HashSet<Diagnostic>,
}

impl Diagnostics {
    fn report(&mut self, kind: Diagnostic, position: i64, message: &dyn fmt::Display) {
        let level = if self.reported.insert(kind) {
            log::Level::Warn
        } else {
            log::Level::Debug
        };
        log::log!(level, "{} (position {})", message, position);
    }
}

/// Why a complete frame was rejected
#[derive(Debug, thiserror::Error)]
enum FrameError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("Invalid prefix header")]
    Prefix,

    #[error("Extended header truncated")]
    ExtendedHeader,

    #[error("Verbose payload cannot be decoded: {0}")]
    Verbose(DecoderError),

    #[error("Verbose payload length {found} found, expected {expected}")]
    VerboseLength { found: usize, expected: usize },

    #[error("Non-verbose payload cannot be decoded: {0}")]
    NonVerbose(DecoderError),

    #[error("Non-verbose payload length {found} found, expected {expected}")]
    NonVerboseLength { found: usize, expected: usize },

    #[error("Control payload cannot be decoded: {0}")]
    Control(DecoderError),

    #[error("Control payload length {found} found, expected {expected}")]
    ControlLength { found: usize, expected: usize },
}

impl FrameError {
    fn diagnostic(&self) -> Diagnostic {
        match self {
            FrameError::Header(_) | FrameError::ExtendedHeader => Diagnostic::InvalidHeader,
            FrameError::Prefix => Diagnostic::InvalidPrefix,
            FrameError::Verbose(_) | FrameError::VerboseLength { .. } => Diagnostic::VerbosePayload,
            FrameError::NonVerbose(_) | FrameError::NonVerboseLength { .. } => {
                Diagnostic::NonVerbosePayload
            }
            FrameError::Control(_) | FrameError::ControlLength { .. } => Diagnostic::ControlPayload,
        }
    }
}

/// Bytes not yet decoded: the cache, followed by the rest of the current buffer
///
/// The cache and the position map are only changed together through
/// [`Pending::consume`] and [`Pending::stash`], so the map always describes
/// exactly the cached bytes plus the unread part of the buffer.
struct Pending<'a> {
    /// `None` while flushing, the flushed bytes are then the buffer
    cache: Option<&'a mut FrameCache>,
    positions: &'a mut PositionMap,
    buffer: &'a [u8],
    offset: usize,
    /// Bytes at the end of the cache that were copied from `buffer`
    borrowed: usize,
}

impl<'a> Pending<'a> {
    fn cached(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.len())
    }

    fn available(&self) -> usize {
        self.cached() + self.buffer.len() - self.offset
    }

    fn position(&self) -> i64 {
        self.positions.current_position()
    }

    /// Contiguous view starting at the first pending byte, at least `length`
    /// bytes long if that much is available
    ///
    /// While the cache holds bytes, the missing part is copied over from the
    /// buffer. Otherwise the buffer is returned without copying.
    fn contiguous(&mut self, length: usize) -> Result<&[u8]> {
        if let Some(cache) = self.cache.as_deref_mut() {
            if !cache.is_empty() {
                if cache.len() < length {
                    let take = (length - cache.len()).min(self.buffer.len() - self.offset);
                    cache.append(&self.buffer[self.offset..self.offset + take])?;
                    self.offset += take;
                    self.borrowed += take;
                }
                return Ok(cache.bytes());
            }
        }
        Ok(&self.buffer[self.offset..])
    }

    /// Drop `count` bytes from the front
    fn consume(&mut self, count: usize) {
        let mut remaining = count;
        if let Some(cache) = self.cache.as_deref_mut() {
            remaining -= cache.consume(remaining);
            self.borrowed = self.borrowed.min(cache.len());
            if self.borrowed > 0 && self.borrowed == cache.len() {
                // Only bytes of the current buffer are left in the cache, continue
                // on the buffer itself
                self.offset -= self.borrowed;
                self.borrowed = 0;
                cache.clear();
            }
        }
        self.offset += remaining;
        self.positions.consume(count);
    }

    /// Move the rest of the buffer into the cache
    fn stash(&mut self) -> Result<()> {
        if let Some(cache) = self.cache.as_deref_mut() {
            cache.append(&self.buffer[self.offset..])?;
            self.offset = self.buffer.len();
        }
        Ok(())
    }
}

/// Everything except the pending bytes: collaborators and the frame state
struct FrameDecoder {
    transport: Box<dyn Transport + Send>,
    builder: Box<dyn LineBuilder + Send>,
    verbose: Box<dyn PayloadDecoder + Send>,
    non_verbose: Box<dyn PayloadDecoder + Send>,
    fallback: NonVerboseByteDecoder,
    control: Box<dyn PayloadDecoder + Send>,

    header_valid: bool,
    /// Prefix plus declared length of the frame whose header was validated
    expected_length: usize,

    diagnostics: Diagnostics,
    stats: StreamStats,
}

impl FrameDecoder {
    fn run(
        &mut self,
        pending: &mut Pending<'_>,
        flushing: bool,
        records: &mut Vec<TraceRecord>,
    ) -> Result<()> {
        let header_offset = self.transport.header_offset();
        let discard = self.transport.minimum_discard();
        let needed = header_offset + STANDARD_HEADER_SIZE;

        while pending.available() > 0 {
            if !self.header_valid {
                if pending.available() < needed {
                    if !flushing {
                        return pending.stash();
                    }
                    let remaining = pending.available();
                    self.diagnostics.report(
                        Diagnostic::EndOfStream,
                        pending.position(),
                        &format_args!("{} bytes left at end of stream", remaining),
                    );
                    self.skip(pending, remaining, REASON_END_OF_STREAM);
                    break;
                }

                let view = pending.contiguous(needed)?;
                let scan = self.transport.scan(view);
                if scan.skip > 0 {
                    self.skip(pending, scan.skip, REASON_SEARCHING);
                    continue;
                }
                if !scan.found {
                    // Scanners only miss without skipping on buffers shorter than
                    // their marker, which the length check above rules out
                    log::trace!("Scanner found nothing in {} bytes", view.len());
                    if !flushing {
                        return pending.stash();
                    }
                    let remaining = pending.available();
                    self.skip(pending, remaining, REASON_END_OF_STREAM);
                    break;
                }

                match validate_standard_header(&view[header_offset..needed]) {
                    Ok(length) => {
                        self.header_valid = true;
                        self.expected_length = header_offset + length;
                    }
                    Err(err) => {
                        self.diagnostics
                            .report(Diagnostic::InvalidHeader, pending.position(), &err);
                        self.skip(pending, discard, REASON_INVALID_HEADER);
                        continue;
                    }
                }
            }

            let expected = self.expected_length;
            if pending.available() < expected {
                if !flushing {
                    return pending.stash();
                }
                self.diagnostics.report(
                    Diagnostic::IncompletePacket,
                    pending.position(),
                    &format_args!(
                        "Packet of {} bytes incomplete, {} bytes left",
                        expected,
                        pending.available()
                    ),
                );
                self.header_valid = false;
                self.skip(pending, discard, REASON_INCOMPLETE);
                continue;
            }

            let position = pending.position();
            let frame = &pending.contiguous(expected)?[..expected];
            let result = self.decode_frame(frame, position);
            self.header_valid = false;
            match result {
                Ok(()) => {
                    self.emit_skipped(records);
                    records.push(self.builder.take_result());
                    self.stats.lines += 1;
                    pending.consume(expected);
                }
                Err(err) => {
                    self.diagnostics.report(err.diagnostic(), position, &err);
                    self.builder.reset();
                    self.skip(pending, discard, REASON_INVALID_PACKET);
                }
            }
        }

        if flushing {
            self.emit_skipped(records);
        }
        Ok(())
    }

    fn skip(&mut self, pending: &mut Pending<'_>, count: usize, reason: &str) {
        let count = count.min(pending.available());
        log::trace!("Skipping {} bytes at {}: {}", count, pending.position(), reason);
        self.builder
            .add_skipped_bytes(pending.position(), count, reason);
        pending.consume(count);
    }

    fn emit_skipped(&mut self, records: &mut Vec<TraceRecord>) {
        if let Some(skipped) = self.builder.take_skipped_result() {
            self.stats.skipped_records += 1;
            self.stats.skipped_bytes += skipped.stream_length() as u64;
            records.push(skipped);
        }
    }

    /// Parse a complete frame into the builder
    fn decode_frame(&mut self, frame: &[u8], position: i64) -> std::result::Result<(), FrameError> {
        let builder = self.builder.as_mut();
        builder.reset();
        builder.set_position(position);
        builder.set_length(frame.len());

        let header_offset = self.transport.header_offset();
        if !self.transport.parse_prefix(&frame[..header_offset], builder) {
            return Err(FrameError::Prefix);
        }

        let packet = &frame[header_offset..];
        let header = StandardHeader::parse(packet)?;
        builder.set_big_endian(header.most_significant_byte_first);
        builder.set_count(header.message_counter);

        let mut offset = STANDARD_HEADER_SIZE;
        if header.has_ecu_id {
            builder.set_ecu_id(read_id(&packet[offset..offset + 4]));
            offset += 4;
        }
        if header.has_session_id {
            builder.set_session_id(BigEndian::read_u32(&packet[offset..offset + 4]));
            offset += 4;
        }
        if header.has_timestamp {
            let ticks = BigEndian::read_u32(&packet[offset..offset + 4]) as u64;
            builder.set_device_timestamp(Duration::from_micros(ticks * DEVICE_TIME_RESOLUTION_US));
            offset += 4;
        }

        if header.use_extended_header {
            let extended =
                ExtendedHeader::parse(&packet[offset..]).ok_or(FrameError::ExtendedHeader)?;
            builder.set_verbose(extended.verbose);
            builder.set_message_type(DltType::from_message_info(extended.type_info()));
            builder.set_number_of_args(extended.number_of_args);
            builder.set_application_id(extended.application_id);
            builder.set_context_id(extended.context_id);
            offset += EXTENDED_HEADER_SIZE;

            // Control messages only exist with an extended header
            if extended.is_control() {
                let payload = &packet[offset..];
                return match self.control.decode(payload, builder) {
                    Err(err) => Err(FrameError::Control(err)),
                    Ok(found)
                        if found > payload.len()
                            || payload.len() - found > CONTROL_PADDING_TOLERANCE =>
                    {
                        Err(FrameError::ControlLength {
                            found,
                            expected: payload.len(),
                        })
                    }
                    Ok(_) => Ok(()),
                };
            }
        }

        let payload = &packet[offset..];
        if builder.verbose() {
            if payload.is_empty() && builder.number_of_args() > 0 {
                // Some loggers emit verbose messages announcing arguments without
                // sending any; accepted with no arguments
                self.diagnostics.report(
                    Diagnostic::VerboseWithoutPayload,
                    position,
                    &format_args!(
                        "Verbose message with {} arguments has no payload",
                        builder.number_of_args()
                    ),
                );
                return Ok(());
            }
            return match self.verbose.decode(payload, builder) {
                Ok(found) if found == payload.len() => Ok(()),
                Ok(found) => Err(FrameError::VerboseLength {
                    found,
                    expected: payload.len(),
                }),
                Err(err) => Err(FrameError::Verbose(err)),
            };
        }

        let failure = match self.non_verbose.decode(payload, builder) {
            Ok(found) if found == payload.len() => return Ok(()),
            Ok(found) => FrameError::NonVerboseLength {
                found,
                expected: payload.len(),
            },
            Err(err) => FrameError::NonVerbose(err),
        };

        builder.reset_arguments();
        match self.fallback.decode(payload, builder) {
            Ok(found) if found == payload.len() => {
                self.diagnostics.report(
                    Diagnostic::NonVerboseFallback,
                    position,
                    &format_args!("{}, decoded as raw bytes", failure),
                );
                Ok(())
            }
            _ => Err(failure),
        }
    }
}

fn read_id(buf: &[u8]) -> [u8; 4] {
    [buf[0], buf[1], buf[2], buf[3]]
}

/// Streaming DLT decoder for one byte stream
///
/// ```
/// use dlt_decoder::DecodeStream;
///
/// let mut stream = DecodeStream::network(false);
/// // A non-verbose frame: header, length 8, message id 1
/// let records = stream.decode(&[0x20, 0x00, 0x00, 0x08, 1, 0, 0, 0], 0).unwrap();
/// assert_eq!(records.len(), 1);
/// assert!(stream.flush().unwrap().is_empty());
/// ```
pub struct DecodeStream {
    cache: FrameCache,
    positions: PositionMap,
    frames: FrameDecoder,
}

impl DecodeStream {
    /// Create a decoder for the given transport with the default collaborators
    pub fn new<T: Transport + Send + 'static>(transport: T) -> Self {
        Self::with_transport(Box::new(transport))
    }

    pub fn with_transport(transport: Box<dyn Transport + Send>) -> Self {
        Self {
            cache: FrameCache::for_dlt(),
            positions: PositionMap::new(),
            frames: FrameDecoder {
                transport,
                builder: Box::new(DltLineBuilder::new()),
                verbose: Box::new(VerboseDecoder::new()),
                non_verbose: Box::new(NonVerboseByteDecoder::new()),
                fallback: NonVerboseByteDecoder::new(),
                control: Box::new(ControlDecoder::new()),
                header_valid: false,
                expected_length: 0,
                diagnostics: Diagnostics::default(),
                stats: StreamStats::default(),
            },
        }
    }

    /// Decoder for DLT files with storage headers
    pub fn storage() -> Self {
        Self::new(StorageTransport::new())
    }

    /// Decoder for serial captures with `DLS\x01` sync patterns
    pub fn serial() -> Self {
        Self::new(SerialTransport::new())
    }

    /// Decoder for raw packets; `online` stamps records with the decode time
    pub fn network(online: bool) -> Self {
        Self::new(NetworkTransport::new(online))
    }

    /// Replace the verbose payload decoder
    pub fn with_verbose_decoder<D: PayloadDecoder + Send + 'static>(mut self, decoder: D) -> Self {
        self.frames.verbose = Box::new(decoder);
        self
    }

    /// Replace the non-verbose payload decoder
    ///
    /// Messages it cannot decode are still emitted, decoded as raw bytes.
    pub fn with_non_verbose_decoder<D: PayloadDecoder + Send + 'static>(
        mut self,
        decoder: D,
    ) -> Self {
        self.frames.non_verbose = Box::new(decoder);
        self
    }

    /// Replace the control payload decoder
    pub fn with_control_decoder<D: PayloadDecoder + Send + 'static>(mut self, decoder: D) -> Self {
        self.frames.control = Box::new(decoder);
        self
    }

    /// Decode the next chunk of the stream
    ///
    /// `position` is the stream offset of `buffer[0]`. Returns the records
    /// completed by this chunk; a frame that continues past the end of the chunk
    /// is kept until the next call.
    pub fn decode(&mut self, buffer: &[u8], position: i64) -> Result<Vec<TraceRecord>> {
        let mut records = Vec::new();
        if buffer.is_empty() {
            return Ok(records);
        }

        self.positions.append(position, buffer.len())?;
        self.frames.stats.bytes += buffer.len() as u64;

        let mut pending = Pending {
            cache: Some(&mut self.cache),
            positions: &mut self.positions,
            buffer,
            offset: 0,
            borrowed: 0,
        };
        self.frames.run(&mut pending, false, &mut records)?;
        Ok(records)
    }

    /// Decode whatever is still cached as if the stream ended here
    ///
    /// Incomplete frames at the end are reported as skipped bytes. The decoder is
    /// empty afterwards and can be reused.
    pub fn flush(&mut self) -> Result<Vec<TraceRecord>> {
        let mut records = Vec::new();
        let data = self.cache.flush();
        let mut pending = Pending {
            cache: None,
            positions: &mut self.positions,
            buffer: data,
            offset: 0,
            borrowed: 0,
        };
        let result = self.frames.run(&mut pending, true, &mut records);

        self.cache.clear();
        self.positions.clear();
        self.frames.header_valid = false;
        result.map(|()| records)
    }

    /// Counters over all records emitted so far
    pub fn stats(&self) -> StreamStats {
        self.frames.stats
    }

    /// Bytes waiting for the rest of their frame
    pub fn cached_bytes(&self) -> usize {
        self.cache.len()
    }

    /// Stream offset of the first byte not yet emitted
    pub fn position(&self) -> i64 {
        self.positions.current_position()
    }
}

impl fmt::Debug for DecodeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeStream")
            .field("transport", &self.frames.transport.name())
            .field("cached", &self.cache.len())
            .field("position", &self.positions.current_position())
            .field("header_valid", &self.frames.header_valid)
            .field("stats", &self.frames.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DltArg, Payload};

    /// Network frame: standard header with UEH, extended header, verbose string
    fn verbose_frame(text: &str) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x0000_0200u32.to_le_bytes());
        payload.extend_from_slice(&((text.len() + 1) as u16).to_le_bytes());
        payload.extend_from_slice(text.as_bytes());
        payload.push(0);

        let length = 4 + 10 + payload.len();
        let mut frame = vec![0x21, 0x00];
        frame.extend_from_slice(&(length as u16).to_be_bytes());
        frame.extend_from_slice(&[0x41, 0x01]);
        frame.extend_from_slice(b"APP1CTX1");
        frame.extend_from_slice(&payload);
        frame
    }

    fn non_verbose_frame(message_id: u32, data: &[u8]) -> Vec<u8> {
        let length = 4 + 4 + data.len();
        let mut frame = vec![0x20, 0x00];
        frame.extend_from_slice(&(length as u16).to_be_bytes());
        frame.extend_from_slice(&message_id.to_le_bytes());
        frame.extend_from_slice(data);
        frame
    }

    fn decode_all(stream: &mut DecodeStream, data: &[u8], chunk: usize) -> Vec<TraceRecord> {
        let mut records = Vec::new();
        for (i, part) in data.chunks(chunk).enumerate() {
            records.extend(stream.decode(part, (i * chunk) as i64).unwrap());
        }
        records.extend(stream.flush().unwrap());
        records
    }

    #[test]
    fn test_single_frame() {
        let frame = verbose_frame("hello");
        let mut stream = DecodeStream::network(false);
        let records = stream.decode(&frame, 0).unwrap();
        assert_eq!(records.len(), 1);

        let line = records[0].as_line().unwrap();
        assert_eq!(line.position, 0);
        assert_eq!(line.length, frame.len());
        assert_eq!(line.application_id.as_deref(), Some("APP1"));
        assert_eq!(line.message_type, Some(DltType::LogInfo));
        assert_eq!(
            line.payload,
            Payload::Verbose(vec![DltArg::String("hello".to_string())])
        );
        assert!(stream.flush().unwrap().is_empty());
    }

    #[test]
    fn test_frame_split_over_chunks() {
        let frame = verbose_frame("split me");
        let mut stream = DecodeStream::network(false);
        assert!(stream.decode(&frame[..3], 0).unwrap().is_empty());
        assert!(stream.decode(&frame[3..10], 3).unwrap().is_empty());
        assert_eq!(stream.cached_bytes(), 10);

        let records = stream.decode(&frame[10..], 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].position(), 0);
        assert_eq!(stream.cached_bytes(), 0);
    }

    #[test]
    fn test_worked_example_split_at_fifteen() {
        let first = non_verbose_frame(1, &[0u8; 12]);
        assert_eq!(first.len(), 20);
        // 4 + 10 + (4 + 2 + 10) = 30
        let second = verbose_frame("abcdefghi");
        assert_eq!(second.len(), 30);

        let mut data = first.clone();
        data.extend_from_slice(&[0x00, 0x00, 0x00]);
        data.extend_from_slice(&second);

        let mut stream = DecodeStream::network(false);
        let mut records = stream.decode(&data[..15], 0).unwrap();
        records.extend(stream.decode(&data[15..], 15).unwrap());
        records.extend(stream.flush().unwrap());

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].position(), 0);
        assert!(!records[0].is_skipped());
        let skipped = records[1].as_skipped().unwrap();
        assert_eq!((skipped.position, skipped.bytes), (20, 3));
        assert_eq!(records[2].position(), 23);
        assert!(!records[2].is_skipped());
    }

    #[test]
    fn test_length_below_minimum_discards() {
        // UEH set but declared length 4, minimum is 14
        let mut data = vec![0x21, 0x00, 0x00, 0x04];
        data.extend(non_verbose_frame(5, &[]));

        let mut stream = DecodeStream::network(false);
        let records = decode_all(&mut stream, &data, data.len());
        assert_eq!(records.len(), 2);
        let skipped = records[0].as_skipped().unwrap();
        assert_eq!((skipped.position, skipped.bytes), (0, 4));
        assert_eq!(skipped.reason, "Invalid packet standard header");
        assert_eq!(records[1].position(), 4);
    }

    #[test]
    fn test_chunking_invariance() {
        let mut data = Vec::new();
        data.extend(verbose_frame("one"));
        data.extend_from_slice(&[0xFF, 0x13]);
        data.extend(non_verbose_frame(2, &[1, 2, 3]));
        data.extend(verbose_frame("three"));
        data.extend_from_slice(&[0x21, 0x00]);

        let reference = decode_all(&mut DecodeStream::network(false), &data, data.len());
        for chunk in 1..data.len() {
            let records = decode_all(&mut DecodeStream::network(false), &data, chunk);
            assert_eq!(records, reference, "chunk size {}", chunk);
        }

        let accounted: usize = reference.iter().map(|r| r.stream_length()).sum();
        assert_eq!(accounted, data.len());
    }

    #[test]
    fn test_flush_reports_incomplete_frame() {
        let frame = verbose_frame("truncated");
        let mut stream = DecodeStream::network(false);
        assert!(stream.decode(&frame[..12], 100).unwrap().is_empty());

        let records = stream.flush().unwrap();
        assert_eq!(records.len(), 1);
        let skipped = records[0].as_skipped().unwrap();
        assert_eq!(skipped.position, 100);
        assert_eq!(skipped.bytes, 12);
        assert_eq!(skipped.reason, "Incomplete packet at end of stream");
        assert_eq!(stream.cached_bytes(), 0);
    }

    #[test]
    fn test_verbose_without_payload_is_accepted() {
        // Verbose, 2 arguments, no payload bytes
        let mut frame = vec![0x21, 0x00, 0x00, 0x0E, 0x41, 0x02];
        frame.extend_from_slice(b"APP1CTX1");

        let mut stream = DecodeStream::network(false);
        let records = stream.decode(&frame, 0).unwrap();
        assert_eq!(records.len(), 1);
        let line = records[0].as_line().unwrap();
        assert_eq!(line.number_of_args, 2);
        assert_eq!(line.payload, Payload::Verbose(vec![]));
    }

    #[test]
    fn test_verbose_length_mismatch_rejected() {
        let mut frame = verbose_frame("abc");
        // One trailing byte the arguments do not cover
        frame.push(0xEE);
        let length = frame.len() as u16;
        frame[2..4].copy_from_slice(&length.to_be_bytes());

        let mut stream = DecodeStream::network(false);
        let records = decode_all(&mut stream, &frame, frame.len());
        assert!(records.iter().all(|r| r.is_skipped()));
        assert_eq!(records[0].as_skipped().unwrap().reason, "Invalid packet");
        let accounted: usize = records.iter().map(|r| r.stream_length()).sum();
        assert_eq!(accounted, frame.len());
    }

    #[test]
    fn test_control_padding_tolerance() {
        let control = |padding: usize| {
            // get_default_log_level response: service id, status, level
            let mut payload = vec![0x04, 0x00, 0x00, 0x00, 0x00, 0x04];
            payload.extend(std::iter::repeat(0).take(padding));
            let length = 4 + 10 + payload.len();
            let mut frame = vec![0x21, 0x00];
            frame.extend_from_slice(&(length as u16).to_be_bytes());
            frame.extend_from_slice(&[0x26, 0x00]);
            frame.extend_from_slice(b"DA1\0DC1\0");
            frame.extend_from_slice(&payload);
            frame
        };

        let frame = control(32);
        let records = DecodeStream::network(false).decode(&frame, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0].as_line().unwrap().payload,
            Payload::Control(_)
        ));

        let frame = control(33);
        let records = decode_all(&mut DecodeStream::network(false), &frame, frame.len());
        assert!(records.iter().all(|r| r.is_skipped()));
    }

    #[test]
    fn test_stats() {
        let mut data = verbose_frame("a");
        data.push(0x00);
        data.extend(verbose_frame("b"));

        let mut stream = DecodeStream::network(false);
        decode_all(&mut stream, &data, 7);
        let stats = stream.stats();
        assert_eq!(stats.bytes, data.len() as u64);
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.skipped_records, 1);
        assert_eq!(stats.skipped_bytes, 1);
    }

    #[test]
    fn test_line_numbers_shared_with_skipped() {
        let mut data = verbose_frame("a");
        data.push(0x00);
        data.extend(verbose_frame("b"));

        let records = decode_all(&mut DecodeStream::network(false), &data, data.len());
        let lines: Vec<u64> = records.iter().map(|r| r.line()).collect();
        assert_eq!(lines, vec![0, 1, 2]);
    }
}
